use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, StorageKind};
use crate::db::{create_pool, MemoryProductGateway, MySqlProductGateway, ProductGateway};
use crate::error::{GatewayError, StartupError};
use crate::routes::{panic_response, ApiRouter};

/// How long in-flight connections get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Builds the configured gateway and proves the store answers before anything is served.
pub async fn connect_gateway(config: &Config) -> Result<Arc<dyn ProductGateway>, StartupError> {
    match config.storage {
        StorageKind::MySql => {
            tracing::info!(
                "Connecting to database {} at {}:{}...",
                config.database.name,
                config.database.host,
                config.database.port
            );
            let pool = create_pool(&config.database)
                .await
                .map_err(GatewayError::from)?;
            let gateway = MySqlProductGateway::new(pool);
            gateway.ping().await?;
            tracing::info!(
                "Database connection established (pool size {})",
                config.database.pool_size
            );
            Ok(Arc::new(gateway))
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage, products are lost on exit");
            Ok(Arc::new(MemoryProductGateway::new()))
        }
    }
}

/// Connects, binds and serves until Ctrl-C.
pub async fn run(config: Config) -> Result<(), StartupError> {
    let gateway = connect_gateway(&config).await?;
    let router = ApiRouter::new(gateway, config.validation_mode);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|_| StartupError::Address(config.server_addr()))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    tracing::info!("Listening on {}", addr);

    serve(listener, router, shutdown_signal()).await;
    Ok(())
}

/// Accepts HTTP/1.1 connections until `shutdown` resolves, then drains them.
pub async fn serve<F>(listener: TcpListener, router: ApiRouter, shutdown: F)
where
    F: Future<Output = ()>,
{
    // CORS layer for the mobile client
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any)
        .expose_headers(Any);

    let service = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CatchPanicLayer::custom(panic_response))
        .service(router);

    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let conn = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service.clone()));
                let conn = graceful.watch(conn);

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        tracing::debug!("Connection from {} ended with error: {}", remote, e);
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, draining connections");
                break;
            }
        }
    }

    drop(listener);

    tokio::select! {
        _ = graceful.shutdown() => tracing::info!("All connections closed"),
        _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
            tracing::warn!("Timed out waiting for connections to close");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
