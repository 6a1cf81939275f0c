pub mod database;
pub mod external_api;
pub mod llm;
pub mod worker;

pub use database::DatabasePool;
pub use external_api::ExternalApiPool;
pub use llm::LlmPool;
pub use worker::WorkerPool;
