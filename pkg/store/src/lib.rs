pub mod document;
pub mod endpoints;
pub mod engine;
pub mod error;
pub mod pool;
pub mod routing;
pub mod shard;

pub use document::{FieldPath, Value};
pub use endpoints::Endpoints;
pub use engine::{IndexEngine, InMemoryEngine};
pub use error::{EngineError, StoreError};
pub use pool::{retry_with_reopen, Checkout, DatabasePool};
pub use shard::ShardHandle;
