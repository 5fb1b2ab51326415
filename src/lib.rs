pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod response;
pub mod routes;
pub mod server;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
