use std::sync::Arc;

use serde_json::{Map, Value};

use crate::db::ProductGateway;
use crate::error::{AppError, AppResult};
use crate::models::{
    validate_product, CreatedResponse, MessageResponse, Product, ValidationMode,
};

pub const CREATED_MESSAGE: &str = "Producto creado exitosamente.";
pub const UPDATED_MESSAGE: &str = "Producto actualizado exitosamente.";
pub const DELETED_MESSAGE: &str = "Producto eliminado exitosamente.";
pub const NOT_FOUND_MESSAGE: &str = "Producto no encontrado.";
pub const UPDATE_NOT_FOUND_MESSAGE: &str = "Producto no encontrado o no se pudo actualizar.";
pub const CREATE_FIELDS_REQUIRED: &str = "Todos los campos son requeridos (nombre, descripcion, precio, estado, categoria, url_fotografia).";
pub const UPDATE_FIELDS_REQUIRED: &str = "Todos los campos son requeridos para actualizar.";

const LIST_FAILED: &str = "Error interno del servidor al obtener productos.";
const GET_FAILED: &str = "Error interno del servidor al obtener producto.";
const CREATE_FAILED: &str = "Error interno del servidor al crear producto.";
const UPDATE_FAILED: &str = "Error interno del servidor al actualizar producto.";
const DELETE_FAILED: &str = "Error interno del servidor al eliminar producto.";

/// The five product operations, independent of HTTP framing.
#[derive(Clone)]
pub struct ProductsService {
    gateway: Arc<dyn ProductGateway>,
    validation_mode: ValidationMode,
}

impl ProductsService {
    pub fn new(gateway: Arc<dyn ProductGateway>, validation_mode: ValidationMode) -> Self {
        Self {
            gateway,
            validation_mode,
        }
    }

    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        self.gateway
            .list_all()
            .await
            .map_err(|source| AppError::Storage {
                message: LIST_FAILED,
                source,
            })
    }

    pub async fn get_product(&self, id: Option<i64>) -> AppResult<Product> {
        let Some(id) = id else {
            return Err(AppError::NotFound(NOT_FOUND_MESSAGE));
        };

        let product = self
            .gateway
            .get_by_id(id)
            .await
            .map_err(|source| AppError::Storage {
                message: GET_FAILED,
                source,
            })?;

        product.ok_or(AppError::NotFound(NOT_FOUND_MESSAGE))
    }

    pub async fn create_product(&self, payload: &Map<String, Value>) -> AppResult<CreatedResponse> {
        let input = validate_product(payload, self.validation_mode).map_err(|fields| {
            AppError::Validation {
                message: CREATE_FIELDS_REQUIRED,
                fields,
            }
        })?;

        let id = self
            .gateway
            .insert(&input)
            .await
            .map_err(|source| AppError::Storage {
                message: CREATE_FAILED,
                source,
            })?;

        tracing::info!(id, "Product created");
        Ok(CreatedResponse {
            id,
            message: CREATED_MESSAGE.to_string(),
        })
    }

    /// Full replace. The body is checked before the id is looked up.
    pub async fn update_product(
        &self,
        id: Option<i64>,
        payload: &Map<String, Value>,
    ) -> AppResult<MessageResponse> {
        let input = validate_product(payload, self.validation_mode).map_err(|fields| {
            AppError::Validation {
                message: UPDATE_FIELDS_REQUIRED,
                fields,
            }
        })?;

        let Some(id) = id else {
            return Err(AppError::NotFound(UPDATE_NOT_FOUND_MESSAGE));
        };

        let affected = self
            .gateway
            .update_by_id(id, &input)
            .await
            .map_err(|source| AppError::Storage {
                message: UPDATE_FAILED,
                source,
            })?;

        if affected == 0 {
            return Err(AppError::NotFound(UPDATE_NOT_FOUND_MESSAGE));
        }
        tracing::info!(id, "Product updated");
        Ok(MessageResponse::new(UPDATED_MESSAGE))
    }

    pub async fn delete_product(&self, id: Option<i64>) -> AppResult<MessageResponse> {
        let Some(id) = id else {
            return Err(AppError::NotFound(NOT_FOUND_MESSAGE));
        };

        let affected = self
            .gateway
            .delete_by_id(id)
            .await
            .map_err(|source| AppError::Storage {
                message: DELETE_FAILED,
                source,
            })?;

        if affected == 0 {
            return Err(AppError::NotFound(NOT_FOUND_MESSAGE));
        }
        tracing::info!(id, "Product deleted");
        Ok(MessageResponse::new(DELETED_MESSAGE))
    }
}
