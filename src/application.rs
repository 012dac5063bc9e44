//! Application entry point and builder pattern implementation.

use crate::{config::ConfigManager, coordinator::SystemCoordinator};
use anyhow::{Result, anyhow};

/// Runs the daemon from initialization to shutdown.
///
/// # Example
///
/// ```no_run
/// use led_dimmerd::application::Application;
/// use led_dimmerd::config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = config::ConfigManager::load(None).await?;
/// let mut app = Application::builder()
///     .with_config_manager(config_manager)
///     .build()
///     .await?;
///
/// app.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    pub coordinator: SystemCoordinator,
    config_manager: ConfigManager,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Initializes state, starts services and blocks in the main loop.
    pub async fn run(&mut self) -> Result<()> {
        self.coordinator
            .initialize(self.config_manager.clone())
            .await?;

        self.coordinator.start_all_services().await?;

        self.coordinator.run_main_loop().await
    }
}

pub struct ApplicationBuilder {
    config_manager: Option<ConfigManager>,
    enable_dbus: bool,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config_manager: None,
            enable_dbus: true,
        }
    }

    pub fn with_config_manager(mut self, config_manager: ConfigManager) -> Self {
        self.config_manager = Some(config_manager);
        self
    }

    /// Runs without registering on the session bus.
    pub fn without_dbus(mut self) -> Self {
        self.enable_dbus = false;
        self
    }

    pub async fn build(self) -> Result<Application> {
        let config_manager = self
            .config_manager
            .ok_or_else(|| anyhow!("Configuration manager is required"))?;

        let mut coordinator = SystemCoordinator::new();
        if !self.enable_dbus {
            coordinator = coordinator.without_dbus();
        }

        Ok(Application {
            coordinator,
            config_manager,
        })
    }
}
