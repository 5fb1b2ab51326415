use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use serde_json::{Map, Value};
use tower::Service;

use crate::db::ProductGateway;
use crate::error::{AppError, AppResult};
use crate::models::{MessageResponse, ValidationMode, SUGGESTED_CATEGORIES};
use crate::response::{json_response, JsonResponse};
use crate::services::health_service::ServingStatus;
use crate::services::{HealthService, ProductsService};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Largest request body accepted on create and update.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Products,
    /// `None` when the path segment is not an integer; such an id matches no row.
    Product(Option<i64>),
    Categories,
    Health,
}

impl Route {
    fn allow(self) -> &'static str {
        match self {
            Route::Products => "GET, POST",
            Route::Product(_) => "GET, PUT, DELETE",
            Route::Categories | Route::Health => "GET",
        }
    }
}

/// Trailing slashes are ignored, as the mobile client has always relied on.
fn match_route(path: &str) -> Option<Route> {
    let mut segments = path.trim_end_matches('/').split('/').skip(1);
    match (segments.next(), segments.next(), segments.next()) {
        (Some("productos"), None, _) => Some(Route::Products),
        (Some("productos"), Some(id), None) => Some(Route::Product(id.parse().ok())),
        (Some("categorias"), None, _) => Some(Route::Categories),
        (Some("health"), None, _) => Some(Route::Health),
        _ => None,
    }
}

/// Routes `/productos`, `/categorias` and `/health` onto the services.
#[derive(Clone)]
pub struct ApiRouter {
    products: ProductsService,
    health: HealthService,
}

impl ApiRouter {
    pub fn new(gateway: Arc<dyn ProductGateway>, validation_mode: ValidationMode) -> Self {
        Self {
            products: ProductsService::new(gateway.clone(), validation_mode),
            health: HealthService::new(gateway),
        }
    }

    /// Answers a request. Every failure is already turned into a JSON response.
    pub async fn handle<B>(&self, req: Request<B>) -> JsonResponse
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        match self.dispatch(req).await {
            Ok(response) => response,
            Err(err) => err.into(),
        }
    }

    async fn dispatch<B>(&self, req: Request<B>) -> AppResult<JsonResponse>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let route = match_route(req.uri().path())
            .ok_or_else(|| AppError::RouteNotFound(req.uri().path().to_string()))?;
        let method = req.method().clone();

        let response = match (route, &method) {
            (Route::Products, &Method::GET) => {
                json_response(StatusCode::OK, &self.products.list_products().await?)
            }
            (Route::Products, &Method::POST) => {
                let payload = read_json_object(req).await?;
                json_response(
                    StatusCode::CREATED,
                    &self.products.create_product(&payload).await?,
                )
            }
            (Route::Product(id), &Method::GET) => {
                json_response(StatusCode::OK, &self.products.get_product(id).await?)
            }
            (Route::Product(id), &Method::PUT) => {
                let payload = read_json_object(req).await?;
                json_response(
                    StatusCode::OK,
                    &self.products.update_product(id, &payload).await?,
                )
            }
            (Route::Product(id), &Method::DELETE) => {
                json_response(StatusCode::OK, &self.products.delete_product(id).await?)
            }
            (Route::Categories, &Method::GET) => json_response(StatusCode::OK, SUGGESTED_CATEGORIES),
            (Route::Health, &Method::GET) => {
                let health = self.health.check().await;
                let status = match health.status {
                    ServingStatus::Ok => StatusCode::OK,
                    ServingStatus::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                };
                json_response(status, &health)
            }
            (route, _) => {
                return Err(AppError::MethodNotAllowed {
                    method: method.clone(),
                    allow: route.allow(),
                })
            }
        };

        Ok(response)
    }
}

impl<B> Service<Request<B>> for ApiRouter
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = JsonResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.handle(req).await) })
    }
}

fn is_json_content_type<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Reads the body as a JSON object.
///
/// A non-JSON content type, an empty body, or a non-object root all yield an
/// empty map, which validation then reports field by field.
async fn read_json_object<B>(req: Request<B>) -> AppResult<Map<String, Value>>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    if !is_json_content_type(&req) {
        return Ok(Map::new());
    }

    let bytes = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                AppError::PayloadTooLarge {
                    limit: MAX_BODY_BYTES,
                }
            } else {
                AppError::MalformedBody(e.to_string())
            }
        })?
        .to_bytes();

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(AppError::MalformedBody(e.to_string())),
    }
}

/// Response for a handler that panicked. The panic payload is only logged.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> JsonResponse {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!("Request handler panicked: {}", detail);

    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &MessageResponse::new("Error interno del servidor."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::header::{ALLOW, RETRY_AFTER};
    use http_body_util::Full;
    use serde_json::json;

    use crate::db::MemoryProductGateway;
    use crate::error::GatewayError;
    use crate::models::{Product, ProductInput};

    fn router() -> ApiRouter {
        ApiRouter::new(Arc::new(MemoryProductGateway::new()), ValidationMode::Compat)
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Full<Bytes>> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(body.to_string())))
                .unwrap(),
            None => builder.body(Full::new(Bytes::new())).unwrap(),
        }
    }

    async fn send(router: &ApiRouter, req: Request<Full<Bytes>>) -> (StatusCode, Value) {
        let response = router.handle(req).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn mouse() -> Value {
        json!({
            "nombre": "Mouse",
            "descripcion": "USB mouse",
            "precio": 9.99,
            "estado": true,
            "categoria": "Electrónica",
            "url_fotografia": "http://x/y.jpg"
        })
    }

    #[test]
    fn test_match_route() {
        assert_eq!(match_route("/productos"), Some(Route::Products));
        assert_eq!(match_route("/productos/"), Some(Route::Products));
        assert_eq!(match_route("/productos/12"), Some(Route::Product(Some(12))));
        assert_eq!(match_route("/productos/12/"), Some(Route::Product(Some(12))));
        assert_eq!(match_route("/productos/abc"), Some(Route::Product(None)));
        assert_eq!(match_route("/categorias"), Some(Route::Categories));
        assert_eq!(match_route("/health"), Some(Route::Health));
        assert_eq!(match_route("/productos/1/fotos"), None);
        assert_eq!(match_route("/"), None);
        assert_eq!(match_route("/usuarios"), None);
    }

    #[tokio::test]
    async fn test_create_then_get_mouse() {
        let router = router();
        let (status, body) = send(&router, request(Method::POST, "/productos", Some(mouse()))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Producto creado exitosamente.");
        let id = body["id"].as_i64().unwrap();

        let (status, body) = send(&router, request(Method::GET, &format!("/productos/{}", id), None)).await;
        assert_eq!(status, StatusCode::OK);
        let mut expected = mouse();
        expected["id"] = json!(id);
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn test_list_starts_empty() {
        let (status, body) = send(&router(), request(Method::GET, "/productos", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_list_after_creates_and_deletes() {
        let router = router();
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut product = mouse();
            product["nombre"] = json!(format!("Mouse {}", i));
            let (_, body) = send(&router, request(Method::POST, "/productos", Some(product))).await;
            ids.push(body["id"].as_i64().unwrap());
        }
        for id in &ids[..2] {
            let (status, _) = send(&router, request(Method::DELETE, &format!("/productos/{}", id), None)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(&router, request(Method::GET, "/productos", None)).await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<Product> = serde_json::from_value(body).unwrap();
        assert_eq!(listed.len(), 3);
        let names: Vec<&str> = listed.iter().map(|p| p.nombre.as_str()).collect();
        assert_eq!(names, vec!["Mouse 2", "Mouse 3", "Mouse 4"]);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_404() {
        let (status, body) = send(&router(), request(Method::DELETE, "/productos/99999", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"message": "Producto no encontrado."}));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_404() {
        let router = router();
        let (status, body) = send(&router, request(Method::GET, "/productos/99999", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Producto no encontrado.");

        let (status, body) = send(&router, request(Method::PUT, "/productos/99999", Some(mouse()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Producto no encontrado o no se pudo actualizar.");

        let (status, _) = send(&router, request(Method::GET, "/productos/abc", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let router = router();
        let (_, body) = send(&router, request(Method::POST, "/productos", Some(mouse()))).await;
        let uri = format!("/productos/{}", body["id"]);

        let (status, body) = send(&router, request(Method::DELETE, &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Producto eliminado exitosamente."}));

        let (status, _) = send(&router, request(Method::DELETE, &uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let router = router();
        let (_, body) = send(&router, request(Method::POST, "/productos", Some(mouse()))).await;
        let uri = format!("/productos/{}", body["id"]);
        let mut changed = mouse();
        changed["precio"] = json!(14.25);
        changed["estado"] = json!(false);

        for _ in 0..2 {
            let (status, body) = send(&router, request(Method::PUT, &uri, Some(changed.clone()))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"message": "Producto actualizado exitosamente."}));
        }

        let (_, stored) = send(&router, request(Method::GET, &uri, None)).await;
        assert_eq!(stored["precio"], json!(14.25));
        assert_eq!(stored["estado"], json!(false));
    }

    #[tokio::test]
    async fn test_create_with_estado_false() {
        let mut product = mouse();
        product["estado"] = json!(false);
        let (status, _) = send(&router(), request(Method::POST, "/productos", Some(product))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Known defect kept for client compatibility: precio 0 is treated as missing.
    #[tokio::test]
    async fn test_create_with_zero_precio_is_rejected() {
        let mut product = mouse();
        product["precio"] = json!(0);
        let (status, body) = send(&router(), request(Method::POST, "/productos", Some(product))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Todos los campos son requeridos (nombre, descripcion, precio, estado, categoria, url_fotografia)."
        );
    }

    #[tokio::test]
    async fn test_update_missing_fields_is_400_even_for_unknown_id() {
        let mut product = mouse();
        product.as_object_mut().unwrap().remove("categoria");
        let (status, body) = send(&router(), request(Method::PUT, "/productos/99999", Some(product))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Todos los campos son requeridos para actualizar.");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/productos")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(b"{\"nombre\": ")))
            .unwrap();
        let (status, body) = send(&router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cuerpo JSON inválido.");
    }

    #[tokio::test]
    async fn test_non_json_content_type_reads_as_empty() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/productos")
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from(mouse().to_string())))
            .unwrap();
        let (status, body) = send(&router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Todos los campos son requeridos (nombre, descripcion, precio, estado, categoria, url_fotografia)."
        );
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let mut product = mouse();
        product["descripcion"] = json!("x".repeat(MAX_BODY_BYTES));
        let (status, body) = send(&router(), request(Method::POST, "/productos", Some(product))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["message"], "Cuerpo de la solicitud demasiado grande.");
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let router = router();
        let (status, body) = send(&router, request(Method::GET, "/usuarios", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Ruta no encontrada.");

        let response = router.handle(request(Method::PATCH, "/productos/1", None)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET, PUT, DELETE");
    }

    #[tokio::test]
    async fn test_categories_and_health() {
        let router = router();
        let (status, body) = send(&router, request(Method::GET, "/categorias", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0], "Electrónica");
        assert_eq!(body.as_array().unwrap().len(), SUGGESTED_CATEGORIES.len());

        let (status, body) = send(&router, request(Method::GET, "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    /// Gateway whose store is always failing.
    struct BrokenGateway {
        exhausted: bool,
    }

    impl BrokenGateway {
        fn error(&self) -> GatewayError {
            if self.exhausted {
                GatewayError::PoolExhausted
            } else {
                GatewayError::Storage("connection reset by peer".into())
            }
        }
    }

    #[async_trait]
    impl ProductGateway for BrokenGateway {
        async fn list_all(&self) -> Result<Vec<Product>, GatewayError> {
            Err(self.error())
        }
        async fn get_by_id(&self, _id: i64) -> Result<Option<Product>, GatewayError> {
            Err(self.error())
        }
        async fn insert(&self, _product: &ProductInput) -> Result<i64, GatewayError> {
            Err(self.error())
        }
        async fn update_by_id(&self, _id: i64, _product: &ProductInput) -> Result<u64, GatewayError> {
            Err(self.error())
        }
        async fn delete_by_id(&self, _id: i64) -> Result<u64, GatewayError> {
            Err(self.error())
        }
        async fn ping(&self) -> Result<(), GatewayError> {
            Err(self.error())
        }
    }

    #[tokio::test]
    async fn test_storage_failures_are_generic_500() {
        let router = ApiRouter::new(Arc::new(BrokenGateway { exhausted: false }), ValidationMode::Compat);
        let cases = [
            (request(Method::GET, "/productos", None), "Error interno del servidor al obtener productos."),
            (request(Method::GET, "/productos/1", None), "Error interno del servidor al obtener producto."),
            (request(Method::POST, "/productos", Some(mouse())), "Error interno del servidor al crear producto."),
            (request(Method::PUT, "/productos/1", Some(mouse())), "Error interno del servidor al actualizar producto."),
            (request(Method::DELETE, "/productos/1", None), "Error interno del servidor al eliminar producto."),
        ];
        for (req, message) in cases {
            let (status, body) = send(&router, req).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, json!({ "message": message }));
        }

        let (status, body) = send(&router, request(Method::GET, "/health", None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({"status": "unavailable"}));
    }

    #[tokio::test]
    async fn test_pool_exhaustion_is_503() {
        let router = ApiRouter::new(Arc::new(BrokenGateway { exhausted: true }), ValidationMode::Compat);
        let response = router.handle(request(Method::GET, "/productos", None)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "1");
    }

    #[tokio::test]
    async fn test_panic_response_is_generic() {
        let response = panic_response(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"message": "Error interno del servidor."}));
    }
}
