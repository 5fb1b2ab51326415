pub mod health_service;
pub mod products_service;

pub use health_service::HealthService;
pub use products_service::ProductsService;
