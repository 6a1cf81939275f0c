use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use taskflow_core::ResourceKind;

use crate::error::Result;
use crate::pool::{ResourceGuard, ResourcePool};
use crate::pools::{DatabasePool, ExternalApiPool, LlmPool, WorkerPool};

/// Tunables for each of the four pools (spec.md §4.5). Defaults mirror the
/// original's documented fallbacks.
#[derive(Debug, Clone)]
pub struct ResourceManagerConfig {
    pub llm_max_concurrent: usize,
    pub llm_rate_limit: usize,
    pub llm_window: Duration,
    pub database_max_connections: usize,
    pub worker_max_workers: usize,
    pub worker_task_timeout: Duration,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            llm_max_concurrent: 10,
            llm_rate_limit: 60,
            llm_window: Duration::from_secs(60),
            database_max_connections: 20,
            worker_max_workers: 8,
            worker_task_timeout: Duration::from_secs(120),
        }
    }
}

/// Composes the four resource pools behind a single facade keyed by
/// [`ResourceKind`] (spec.md §4.5). Grounded in
/// `examples/original_source/src/taskflow/scheduler/resource.py`'s
/// `ResourceManager`, which dispatches acquire/release across named pools.
pub struct ResourceManager {
    llm: Arc<LlmPool>,
    database: Arc<DatabasePool>,
    worker: Arc<WorkerPool>,
    external_api: Arc<ExternalApiPool>,
}

impl ResourceManager {
    pub fn new(config: ResourceManagerConfig) -> Self {
        Self {
            llm: Arc::new(LlmPool::new(config.llm_max_concurrent, config.llm_rate_limit, config.llm_window)),
            database: Arc::new(DatabasePool::new(config.database_max_connections)),
            worker: Arc::new(WorkerPool::new(config.worker_max_workers, config.worker_task_timeout)),
            external_api: Arc::new(ExternalApiPool::new()),
        }
    }

    fn pool_for(&self, kind: ResourceKind) -> Arc<dyn ResourcePool> {
        match kind {
            ResourceKind::Llm => self.llm.clone() as Arc<dyn ResourcePool>,
            ResourceKind::Database => self.database.clone() as Arc<dyn ResourcePool>,
            ResourceKind::Worker => self.worker.clone() as Arc<dyn ResourcePool>,
            ResourceKind::ExternalApi => self.external_api.clone() as Arc<dyn ResourcePool>,
        }
    }

    /// Acquires a resource of `kind`, returning an RAII guard that releases
    /// it automatically (spec.md §4.5/§9).
    pub async fn acquire(&self, kind: ResourceKind, priority: u8, timeout: Duration) -> Result<ResourceGuard> {
        let pool = self.pool_for(kind);
        let handle = pool.acquire(1, priority, timeout).await?;
        Ok(ResourceGuard::new(pool, handle))
    }

    /// Acquires admission for a named external API, lazily creating its
    /// rate limiter on first use.
    pub async fn acquire_api(&self, api_name: &str, priority: u8, timeout: Duration) -> Result<ResourceGuard> {
        let handle = self.external_api.acquire_for(api_name, priority, timeout).await?;
        Ok(ResourceGuard::new(self.external_api.clone(), handle))
    }

    pub fn llm(&self) -> &Arc<LlmPool> {
        &self.llm
    }

    pub fn database(&self) -> &Arc<DatabasePool> {
        &self.database
    }

    pub fn worker(&self) -> &Arc<WorkerPool> {
        &self.worker
    }

    pub fn external_api(&self) -> &Arc<ExternalApiPool> {
        &self.external_api
    }

    pub fn status_for(&self, kind: ResourceKind) -> Value {
        self.pool_for(kind).status()
    }

    pub fn status(&self) -> Value {
        json!({
            "llm": self.llm.status(),
            "database": self.database.status(),
            "worker": self.worker.status(),
            "external_api": self.external_api.status(),
        })
    }

    /// Runs one reaper sweep across the pools that accumulate state needing
    /// periodic cleanup (spec.md §4.5); called from [`crate::scheduler`].
    pub async fn reap(&self) -> Result<()> {
        let timed_out = self.worker.reap_timed_out().await;
        let reaped_conns = self.database.reap_idle(Duration::from_secs(300)).await;
        if timed_out > 0 || reaped_conns > 0 {
            tracing::debug!(timed_out, reaped_conns, "resource manager reaper sweep");
        }
        Ok(())
    }
}
