//! Pipeline run persistence.
//!
//! The orchestrator writes every state transition through [`RunStore`]
//! before the next stage starts. Two implementations are provided:
//! - [`RedisRunStore`]: one JSON document per run
//! - [`MemoryRunStore`]: process-local, for tests and local runs

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryRunStore;
pub use redis_store::{RedisRunStore, StoreConfig};
pub use store::RunStore;
