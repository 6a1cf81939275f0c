//! Resource pools and the scheduler loop bounding concurrent LLM, database,
//! worker, and external-API work (spec.md §4.5).

pub mod error;
pub mod manager;
pub mod pool;
pub mod pools;
pub mod scheduler;

pub use error::{ResourceError, Result};
pub use manager::{ResourceManager, ResourceManagerConfig};
pub use pool::{ResourceGuard, ResourcePool};
pub use pools::{DatabasePool, ExternalApiPool, LlmPool, WorkerPool};
pub use scheduler::Scheduler;
