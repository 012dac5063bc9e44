//! Lifecycle of the daemon's background services.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Time a service gets to finish after cancellation.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawns named services and stops them through one cancellation tree.
///
/// Each service receives a child token of [`TaskManager::global_token`];
/// `shutdown_all` cancels the root and waits for every service to drain.
pub struct TaskManager {
    tasks: HashMap<String, JoinHandle<Result<()>>>,
    global_token: CancellationToken,
    drain_timeout: Duration,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::with_drain_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        Self {
            tasks: HashMap::new(),
            global_token: CancellationToken::new(),
            drain_timeout,
        }
    }

    /// Root token; cancelling it stops every service.
    pub fn global_token(&self) -> &CancellationToken {
        &self.global_token
    }

    /// Spawns `task_fn` under `name` with its own child cancellation token.
    pub async fn spawn_task<F, Fut>(&mut self, name: String, task_fn: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        if self.tasks.contains_key(&name) {
            anyhow::bail!("Task '{}' is already running", name);
        }

        let token = self.global_token.child_token();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            info!("Starting task: {}", task_name);
            let result = task_fn(token).await;
            match &result {
                Ok(()) => info!("Task '{}' completed", task_name),
                Err(e) => error!("Task '{}' failed: {}", task_name, e),
            }
            result
        });

        self.tasks.insert(name.clone(), handle);
        info!("Task '{}' spawned", name);
        Ok(())
    }

    /// Cancels every service and waits for each to finish.
    ///
    /// Returns the first failure, after all services were awaited.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        info!("Stopping all {} tasks", self.tasks.len());
        self.global_token.cancel();

        let mut first_error = None;
        for (name, handle) in self.tasks.drain() {
            let outcome = match tokio::time::timeout(self.drain_timeout, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(anyhow!("Task '{}' panicked: {}", name, e)),
                Err(_) => Err(anyhow!("Task '{}' exceeded shutdown timeout", name)),
            };
            if let Err(e) = outcome {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(error) => Err(error).context("One or more tasks failed during shutdown"),
            None => {
                info!("All tasks stopped");
                Ok(())
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
