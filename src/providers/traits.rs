use anyhow::Result;
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// Creates a component asynchronously.
///
/// # Example
///
/// ```no_run
/// use led_dimmerd::providers::traits::AsyncProvider;
///
/// struct GreetingProvider;
///
/// #[async_trait::async_trait]
/// impl AsyncProvider<String> for GreetingProvider {
///     async fn provide(&self) -> anyhow::Result<String> {
///         Ok("hello".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncProvider<T> {
    async fn provide(&self) -> Result<T>;
}

/// A service started through the [`TaskManager`].
///
/// Higher priorities start first. A critical service that fails to start
/// aborts startup; others are skipped with a warning.
///
/// # Example
///
/// ```no_run
/// use led_dimmerd::providers::traits::ServiceProvider;
/// use led_dimmerd::task_manager::TaskManager;
/// use anyhow::Result;
///
/// struct IdleService;
///
/// #[async_trait::async_trait]
/// impl ServiceProvider for IdleService {
///     async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
///         task_manager.spawn_task("idle".to_string(), |token| async move {
///             token.cancelled().await;
///             Ok(())
///         }).await
///     }
///
///     fn name(&self) -> &'static str { "IdleService" }
/// }
/// ```
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Starts the service in TaskManager.
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    /// Returns service name for logging and management.
    fn name(&self) -> &'static str;

    /// Returns startup priority (higher numbers start first).
    fn priority(&self) -> i32 {
        0
    }

    /// Indicates if service is critical for system operation.
    fn is_critical(&self) -> bool {
        false
    }
}
