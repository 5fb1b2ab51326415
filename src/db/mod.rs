pub mod memory;
pub mod pool;
pub mod products;

pub use memory::MemoryProductGateway;
pub use pool::create_pool;
pub use products::{MySqlProductGateway, ProductGateway};
