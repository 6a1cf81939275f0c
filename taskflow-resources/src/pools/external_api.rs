use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::pool::ResourcePool;
use crate::pools::llm::LlmPool;

/// Default rate limit applied to an API name with no explicit configuration,
/// mirroring `APIResourcePool`'s documented 60-calls/60s fallback in
/// `examples/original_source/src/taskflow/scheduler/pools/api_pool.py`.
const DEFAULT_CALLS: usize = 60;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_CONCURRENCY: usize = 5;

/// Per-name rate limiting for outbound third-party API calls (spec.md
/// §4.5), grounded in `api_pool.py`'s `APIResourcePool`: each API name gets
/// its own lazily created limiter the first time it's used. The underlying
/// three-tier priority ladder is shared with [`LlmPool`] since `api_pool.py`
/// is the source both pools implement the ladder from (see `DESIGN.md`).
pub struct ExternalApiPool {
    configured: HashMap<String, (usize, Duration, usize)>,
    limiters: Mutex<HashMap<String, LlmPool>>,
}

impl ExternalApiPool {
    pub fn new() -> Self {
        Self { configured: HashMap::new(), limiters: Mutex::new(HashMap::new()) }
    }

    /// Registers an explicit `(calls, window, concurrency)` limit for a
    /// named API, overriding the default fallback.
    pub fn configure(mut self, api_name: impl Into<String>, calls: usize, window: Duration, concurrency: usize) -> Self {
        self.configured.insert(api_name.into(), (calls, window, concurrency));
        self
    }

    async fn limiter_for<'a>(&'a self, api_name: &str, limiters: &'a mut HashMap<String, LlmPool>) {
        if limiters.contains_key(api_name) {
            return;
        }
        let (calls, window, concurrency) = self
            .configured
            .get(api_name)
            .copied()
            .unwrap_or((DEFAULT_CALLS, DEFAULT_WINDOW, DEFAULT_CONCURRENCY));
        info!(api_name, calls, concurrency, "creating rate limiter for external API");
        limiters.insert(api_name.to_string(), LlmPool::new(concurrency, calls, window));
    }

    /// Acquires admission for `api_name`, creating its limiter on first use.
    pub async fn acquire_for(&self, api_name: &str, priority: u8, timeout: Duration) -> Result<String> {
        let mut limiters = self.limiters.lock().await;
        self.limiter_for(api_name, &mut limiters).await;
        let limiter = limiters.get(api_name).expect("just inserted");
        let handle = limiter.acquire(1, priority, timeout).await?;
        Ok(format!("{api_name}:{handle}"))
    }

    pub async fn release_for(&self, handle: &str) {
        let Some((api_name, inner)) = handle.split_once(':') else { return };
        let limiters = self.limiters.lock().await;
        if let Some(limiter) = limiters.get(api_name) {
            limiter.release(inner).await;
        }
    }
}

impl Default for ExternalApiPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourcePool for ExternalApiPool {
    async fn acquire(&self, _amount: u32, priority: u8, timeout: Duration) -> Result<String> {
        self.acquire_for("default", priority, timeout).await
    }

    async fn release(&self, handle: &str) {
        self.release_for(handle).await;
    }

    fn status(&self) -> Value {
        let configured: Vec<&String> = self.configured.keys().collect();
        json!({
            "type": "external_api",
            "configured_apis": configured,
            "default_calls": DEFAULT_CALLS,
            "default_window_secs": DEFAULT_WINDOW.as_secs(),
            "default_concurrency": DEFAULT_CONCURRENCY,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distinct_api_names_get_independent_limiters() {
        let pool = ExternalApiPool::new().configure("search", 1, Duration::from_secs(60), 1);
        let a = pool.acquire_for("search", 10, Duration::from_millis(50)).await.unwrap();
        let b = pool.acquire_for("weather", 10, Duration::from_millis(50)).await;
        assert!(b.is_ok(), "a different api name should not be limited by 'search'");
        pool.release_for(&a).await;
    }
}
