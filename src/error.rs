use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use thiserror::Error;

use crate::config::ConfigError;
use crate::models::MessageResponse;
use crate::response::{json_response, JsonResponse};

/// Failures raised by a product gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Timed out waiting for a database connection")]
    PoolExhausted,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => GatewayError::PoolExhausted,
            other => GatewayError::Database(other),
        }
    }
}

/// Outcome of a request that did not succeed. Every variant becomes a JSON response.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input {fields:?}: {message}")]
    Validation {
        message: &'static str,
        fields: Vec<&'static str>,
    },

    #[error("Malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("No route for {0}")]
    RouteNotFound(String),

    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: Method, allow: &'static str },

    #[error("{message} ({source})")]
    Storage {
        message: &'static str,
        #[source]
        source: GatewayError,
    },
}

pub const POOL_EXHAUSTED_MESSAGE: &str =
    "Servicio temporalmente no disponible, intente nuevamente.";

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) | AppError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Storage {
                source: GatewayError::PoolExhausted,
                ..
            } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the client. Storage causes never leave the server.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::Validation { message, .. } => *message,
            AppError::MalformedBody(_) => "Cuerpo JSON inválido.",
            AppError::PayloadTooLarge { .. } => "Cuerpo de la solicitud demasiado grande.",
            AppError::NotFound(message) => *message,
            AppError::RouteNotFound(_) => "Ruta no encontrada.",
            AppError::MethodNotAllowed { .. } => "Método no permitido.",
            AppError::Storage {
                source: GatewayError::PoolExhausted,
                ..
            } => POOL_EXHAUSTED_MESSAGE,
            AppError::Storage { message, .. } => *message,
        }
    }
}

impl From<AppError> for JsonResponse {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::Storage { message, source } => {
                tracing::error!(error = %source, "{}", message);
            }
            AppError::Validation { fields, .. } => {
                tracing::warn!(?fields, "Rejected product payload");
            }
            other => tracing::debug!("{}", other),
        }

        let mut response = json_response(
            err.status_code(),
            &MessageResponse::new(err.public_message()),
        );

        match &err {
            AppError::MethodNotAllowed { allow, .. } => {
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static(*allow));
            }
            AppError::Storage {
                source: GatewayError::PoolExhausted,
                ..
            } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            }
            _ => {}
        }

        response
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures that keep the server from starting. All of them are fatal.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database unavailable: {0}")]
    Database(#[from] GatewayError),

    #[error("Invalid listen address {0}")]
    Address(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
