use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::error::GatewayError;
use crate::models::{Product, ProductInput, ProductRow};

/// Storage seam for the `productos` table.
///
/// Every method runs exactly one statement, auto-committed, never retried.
/// `update_by_id` and `delete_by_id` report how many rows matched the id (0 or 1).
#[async_trait]
pub trait ProductGateway: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Product>, GatewayError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>, GatewayError>;

    /// Persists a new row and returns the id assigned by the store.
    async fn insert(&self, product: &ProductInput) -> Result<i64, GatewayError>;

    async fn update_by_id(&self, id: i64, product: &ProductInput) -> Result<u64, GatewayError>;

    async fn delete_by_id(&self, id: i64) -> Result<u64, GatewayError>;

    /// Round-trips a trivial query to prove the store is reachable.
    async fn ping(&self) -> Result<(), GatewayError>;
}

// DECIMAL and TINYINT columns are cast so they decode straight into f64/i64.
const SELECT_PRODUCT: &str = "SELECT CAST(id AS SIGNED) AS id, nombre, descripcion, \
     CAST(precio AS DOUBLE) AS precio, CAST(estado AS SIGNED) AS estado, \
     categoria, url_fotografia \
     FROM productos";

#[derive(Clone)]
pub struct MySqlProductGateway {
    pool: MySqlPool,
}

impl MySqlProductGateway {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl ProductGateway for MySqlProductGateway {
    async fn list_all(&self) -> Result<Vec<Product>, GatewayError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!("{} ORDER BY id", SELECT_PRODUCT))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>, GatewayError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_PRODUCT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    async fn insert(&self, product: &ProductInput) -> Result<i64, GatewayError> {
        let result = sqlx::query(
            "INSERT INTO productos (nombre, descripcion, precio, estado, categoria, url_fotografia) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.nombre)
        .bind(&product.descripcion)
        .bind(product.precio)
        .bind(product.estado)
        .bind(&product.categoria)
        .bind(&product.url_fotografia)
        .execute(&self.pool)
        .await?;

        i64::try_from(result.last_insert_id()).map_err(|_| {
            GatewayError::Storage(format!(
                "insert id {} does not fit in i64",
                result.last_insert_id()
            ))
        })
    }

    async fn update_by_id(&self, id: i64, product: &ProductInput) -> Result<u64, GatewayError> {
        // The MySQL driver negotiates CLIENT_FOUND_ROWS, so an unchanged row still counts.
        let result = sqlx::query(
            "UPDATE productos SET nombre = ?, descripcion = ?, precio = ?, estado = ?, \
             categoria = ?, url_fotografia = ? WHERE id = ?",
        )
        .bind(&product.nombre)
        .bind(&product.descripcion)
        .bind(product.precio)
        .bind(product.estado)
        .bind(&product.categoria)
        .bind(&product.url_fotografia)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_by_id(&self, id: i64) -> Result<u64, GatewayError> {
        let result = sqlx::query("DELETE FROM productos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        let solution: i64 = sqlx::query_scalar("SELECT CAST(1 + 1 AS SIGNED) AS solution")
            .fetch_one(&self.pool)
            .await?;

        if solution != 2 {
            return Err(GatewayError::Storage(format!(
                "unexpected ping result: {}",
                solution
            )));
        }
        Ok(())
    }
}
