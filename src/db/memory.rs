use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::ProductGateway;
use crate::error::GatewayError;
use crate::models::{Product, ProductInput};

#[derive(Debug)]
struct Table {
    rows: BTreeMap<i64, Product>,
    next_id: i64,
}

/// In-process `productos` table. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct MemoryProductGateway {
    table: RwLock<Table>,
}

impl MemoryProductGateway {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for MemoryProductGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductGateway for MemoryProductGateway {
    async fn list_all(&self) -> Result<Vec<Product>, GatewayError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>, GatewayError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn insert(&self, product: &ProductInput) -> Result<i64, GatewayError> {
        let mut table = self.table.write().await;
        let id = table.next_id;
        table.next_id += 1;
        table
            .rows
            .insert(id, Product::from_input(id, product.clone()));
        Ok(id)
    }

    async fn update_by_id(&self, id: i64, product: &ProductInput) -> Result<u64, GatewayError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(row) => {
                *row = Product::from_input(id, product.clone());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_by_id(&self, id: i64) -> Result<u64, GatewayError> {
        let removed = self.table.write().await.rows.remove(&id);
        Ok(u64::from(removed.is_some()))
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
