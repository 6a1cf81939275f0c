use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Common contract every resource pool exposes (spec.md §4.5).
#[async_trait]
pub trait ResourcePool: Send + Sync {
    async fn acquire(&self, amount: u32, priority: u8, timeout: Duration) -> Result<String>;
    async fn release(&self, handle: &str);
    fn status(&self) -> Value;
}

/// An RAII guard releasing its resource handle on drop, the Rust analogue
/// of the original's `with_resource` async-context-manager convenience
/// (`examples/original_source/src/taskflow/scheduler/resource.py`).
///
/// Because `release` is async and `Drop` is not, the guard spawns the
/// release as a detached task rather than blocking drop; callers that need
/// to observe release completion should call [`ResourceGuard::release`]
/// explicitly instead of relying on drop.
pub struct ResourceGuard {
    pool: std::sync::Arc<dyn ResourcePool>,
    handle: Option<String>,
}

impl ResourceGuard {
    pub fn new(pool: std::sync::Arc<dyn ResourcePool>, handle: String) -> Self {
        Self { pool, handle: Some(handle) }
    }

    pub fn handle(&self) -> &str {
        self.handle.as_deref().unwrap_or_default()
    }

    pub async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(&handle).await;
        }
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                pool.release(&handle).await;
            });
        }
    }
}
