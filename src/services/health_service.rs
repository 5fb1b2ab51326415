use std::sync::Arc;

use serde::Serialize;

use crate::db::ProductGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingStatus {
    Ok,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResponse {
    pub status: ServingStatus,
}

#[derive(Clone)]
pub struct HealthService {
    gateway: Arc<dyn ProductGateway>,
}

impl HealthService {
    pub fn new(gateway: Arc<dyn ProductGateway>) -> Self {
        Self { gateway }
    }

    /// Serving only while the store answers a ping.
    pub async fn check(&self) -> HealthCheckResponse {
        let status = match self.gateway.ping().await {
            Ok(()) => ServingStatus::Ok,
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                ServingStatus::Unavailable
            }
        };
        HealthCheckResponse { status }
    }
}
