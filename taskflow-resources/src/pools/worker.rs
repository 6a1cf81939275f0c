use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ResourceError, Result};
use crate::pool::ResourcePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskStatus {
    Running,
    Completed,
    Failed,
    TimedOut,
}

struct WorkerTask {
    status: TaskStatus,
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
    handle: Option<JoinHandle<()>>,
}

/// Bounded concurrent task execution (spec.md §4.5), grounded in
/// `examples/original_source/src/taskflow/scheduler/pools/worker_pool.py`'s
/// `ThreadPoolExecutor` + semaphore + timeout-reaper design.
///
/// The reaper marks a task failed once it runs past `task_timeout` but never
/// cancels the underlying `tokio::task::JoinHandle` — matching the
/// original's `_check_timeout_tasks`, which flags timed-out work without
/// ever calling into thread cancellation.
pub struct WorkerPool {
    max_workers: usize,
    task_timeout: Duration,
    semaphore: Arc<Semaphore>,
    tasks: Arc<Mutex<HashMap<String, WorkerTask>>>,
    next_id: Mutex<u64>,
}

impl WorkerPool {
    pub fn new(max_workers: usize, task_timeout: Duration) -> Self {
        Self {
            max_workers,
            task_timeout,
            semaphore: Arc::new(Semaphore::new(max_workers)),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: Mutex::new(0),
        }
    }

    /// Submits `work` for background execution, returning the task id
    /// immediately. `work` must report its own success/failure by returning
    /// `Ok`/`Err`; this pool only tracks completion, never the payload.
    pub async fn submit<F>(&self, work: F) -> Result<String>
    where
        F: std::future::Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        let permit = self.semaphore.clone().acquire_owned().await.map_err(|_| {
            ResourceError::Unavailable("worker pool closed".to_string())
        })?;

        let mut next_id = self.next_id.lock().await;
        let id = format!("worker-{}", *next_id);
        *next_id += 1;
        drop(next_id);

        let task_id = id.clone();
        let now = Instant::now();

        {
            let mut tasks = self.tasks.lock().await;
            tasks.insert(
                id.clone(),
                WorkerTask {
                    status: TaskStatus::Running,
                    started_at: Some(now),
                    completed_at: None,
                    handle: None,
                },
            );
        }

        let tasks_for_wrapper = self.tasks.clone();
        let handle = tokio::spawn(async move {
            let result = work.await;
            let _permit = permit;
            let mut tasks = tasks_for_wrapper.lock().await;
            if let Some(task) = tasks.get_mut(&task_id) {
                task.completed_at = Some(Instant::now());
                task.status = match result {
                    Ok(()) => TaskStatus::Completed,
                    Err(ref message) => {
                        warn!(task_id = %task_id, error = %message, "worker task failed");
                        TaskStatus::Failed
                    }
                };
            }
        });

        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.get_mut(&id) {
            task.handle = Some(handle);
        }
        Ok(id)
    }

    /// Polls a task's outcome. `Some(true)` succeeded, `Some(false)` failed
    /// or timed out, `None` still running.
    pub async fn task_result(&self, task_id: &str) -> Option<bool> {
        let tasks = self.tasks.lock().await;
        tasks.get(task_id).and_then(|t| match t.status {
            TaskStatus::Completed => Some(true),
            TaskStatus::Failed | TaskStatus::TimedOut => Some(false),
            TaskStatus::Running => None,
        })
    }

    /// Reaper sweep: marks tasks failed once they exceed `task_timeout`
    /// without aborting their `JoinHandle` (spec.md §4.5's described
    /// behavior, matching the Python original's `_check_timeout_tasks`).
    pub async fn reap_timed_out(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        let mut reaped = 0;
        for task in tasks.values_mut() {
            if task.status != TaskStatus::Running {
                continue;
            }
            let running_for = task.started_at.map(|s| s.elapsed()).unwrap_or(Duration::ZERO);
            if running_for > self.task_timeout {
                let still_running = task.handle.as_ref().is_some_and(|h| !h.is_finished());
                debug!(
                    running_secs = running_for.as_secs(),
                    still_running,
                    "marking worker task timed out without cancelling it"
                );
                task.status = TaskStatus::TimedOut;
                task.completed_at = Some(Instant::now());
                reaped += 1;
            }
        }
        reaped
    }
}

#[async_trait]
impl ResourcePool for WorkerPool {
    async fn acquire(&self, _amount: u32, priority: u8, timeout: Duration) -> Result<String> {
        let available = self.semaphore.available_permits();
        if available == 0 && priority < 50 {
            return Err(ResourceError::Unavailable("worker pool saturated".to_string()));
        }
        match tokio::time::timeout(timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                Ok("worker-slot".to_string())
            }
            Ok(Err(_)) => Err(ResourceError::Unavailable("worker pool closed".to_string())),
            Err(_) => Err(ResourceError::Timeout(format!("worker acquire timed out after {timeout:?}"))),
        }
    }

    async fn release(&self, _handle: &str) {
        self.semaphore.add_permits(1);
    }

    fn status(&self) -> Value {
        json!({
            "type": "worker",
            "max_workers": self.max_workers,
            "available": self.semaphore.available_permits(),
            "task_timeout_secs": self.task_timeout.as_secs(),
        })
    }
}
