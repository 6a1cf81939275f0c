use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{ResourceError, Result};
use crate::pool::ResourcePool;

#[derive(Debug, Default, Serialize)]
struct UsageStats {
    total_requests: u64,
    failed_requests: u64,
    timeouts: u64,
    total_response_time_ms: u64,
}

impl UsageStats {
    fn avg_response_time_ms(&self) -> f64 {
        let completed = self.total_requests.saturating_sub(self.timeouts);
        if completed == 0 {
            0.0
        } else {
            self.total_response_time_ms as f64 / completed as f64
        }
    }
}

/// Bounded-concurrency, sliding-window-rate-limited LLM call admission
/// (spec.md §4.5). Grounded in
/// `examples/original_source/src/taskflow/scheduler/pools/llm_pool.py`'s
/// deque + semaphore + usage-stats mechanism, but the three-tier priority
/// ladder follows spec.md's explicit wording rather than the Python
/// original's two-tier behavior (see `DESIGN.md`).
pub struct LlmPool {
    max_concurrent: usize,
    rate_limit: usize,
    window: Duration,
    semaphore: Semaphore,
    request_times: Mutex<VecDeque<Instant>>,
    stats: Mutex<UsageStats>,
    next_request_id: AtomicU64,
}

impl LlmPool {
    pub fn new(max_concurrent: usize, rate_limit: usize, window: Duration) -> Self {
        info!(max_concurrent, rate_limit, window_secs = window.as_secs(), "LLM pool initialized");
        Self {
            max_concurrent,
            rate_limit,
            window,
            semaphore: Semaphore::new(max_concurrent),
            request_times: Mutex::new(VecDeque::with_capacity(rate_limit)),
            stats: Mutex::new(UsageStats::default()),
            next_request_id: AtomicU64::new(0),
        }
    }

    async fn admit_by_rate_limit(&self, priority: u8) -> Result<()> {
        let mut times = self.request_times.lock().await;
        if times.len() < self.rate_limit {
            times.push_back(Instant::now());
            return Ok(());
        }

        let oldest = *times.front().expect("rate_limit > 0");
        let elapsed = oldest.elapsed();
        if elapsed >= self.window {
            times.pop_front();
            times.push_back(Instant::now());
            return Ok(());
        }

        let wait = self.window - elapsed;
        drop(times);

        if priority >= 80 {
            info!(priority, "high-priority request breaks through the rate limit");
            let mut times = self.request_times.lock().await;
            times.pop_front();
            times.push_back(Instant::now());
            Ok(())
        } else if priority >= 50 {
            debug!(priority, wait_ms = wait.as_millis(), "mid-priority request sleeps for rate limit tail");
            tokio::time::sleep(wait).await;
            let mut times = self.request_times.lock().await;
            if !times.is_empty() {
                times.pop_front();
            }
            times.push_back(Instant::now());
            Ok(())
        } else if wait <= Duration::from_secs(5) {
            debug!(priority, wait_ms = wait.as_millis(), "low-priority request waits out a short rate-limit tail");
            tokio::time::sleep(wait).await;
            let mut times = self.request_times.lock().await;
            if !times.is_empty() {
                times.pop_front();
            }
            times.push_back(Instant::now());
            Ok(())
        } else {
            warn!(priority, wait_ms = wait.as_millis(), "low-priority request refused: rate-limit wait exceeds 5s");
            Err(ResourceError::Unavailable("llm rate limit exceeded".to_string()))
        }
    }

    pub async fn record_completion(&self, success: bool, response_time: Duration) {
        let mut stats = self.stats.lock().await;
        if !success {
            stats.failed_requests += 1;
        }
        stats.total_response_time_ms += response_time.as_millis() as u64;
    }
}

#[async_trait]
impl ResourcePool for LlmPool {
    async fn acquire(&self, _amount: u32, priority: u8, timeout: Duration) -> Result<String> {
        self.admit_by_rate_limit(priority).await?;

        match tokio::time::timeout(timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
                let mut stats = self.stats.lock().await;
                stats.total_requests += 1;
                Ok(format!("llm-{request_id}"))
            }
            Ok(Err(_closed)) => Err(ResourceError::Unavailable("llm pool closed".to_string())),
            Err(_elapsed) => {
                let mut stats = self.stats.lock().await;
                stats.timeouts += 1;
                Err(ResourceError::Timeout(format!("llm acquire timed out after {timeout:?}")))
            }
        }
    }

    async fn release(&self, _handle: &str) {
        self.semaphore.add_permits(1);
    }

    fn status(&self) -> Value {
        let (stats, avg_ms) = match self.stats.try_lock() {
            Ok(s) => (json!(*s), s.avg_response_time_ms()),
            Err(_) => (json!({}), 0.0),
        };
        json!({
            "type": "llm",
            "max_concurrent": self.max_concurrent,
            "available": self.semaphore.available_permits(),
            "rate_limit": self.rate_limit,
            "window_secs": self.window.as_secs(),
            "usage_stats": stats,
            "avg_response_time_ms": avg_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_at_low_priority_times_out_within_window() {
        let pool = LlmPool::new(1, 1, Duration::from_secs(60));
        let first = pool.acquire(1, 10, Duration::from_millis(50)).await.unwrap();
        let second = pool.acquire(1, 10, Duration::from_millis(50)).await;
        assert!(second.is_err());
        pool.release(&first).await;
    }

    #[tokio::test]
    async fn high_priority_breaks_through_rate_limit() {
        let pool = LlmPool::new(2, 1, Duration::from_secs(60));
        let first = pool.acquire(1, 10, Duration::from_millis(100)).await.unwrap();
        let second = pool.acquire(1, 90, Duration::from_millis(100)).await;
        assert!(second.is_ok());
        pool.release(&first).await;
    }
}
