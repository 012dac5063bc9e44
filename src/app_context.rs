//! Shared application state.

use std::sync::Arc;

use anyhow::Result;

use crate::{
    channel_writer::ChannelWriter,
    config::{Config, ConfigManager},
    dimming::DimmingController,
    drivers::SysfsLedWriter,
};

/// State shared by every service of the daemon.
pub struct AppState {
    /// Configuration manager for centralized config handling
    pub config_manager: Arc<ConfigManager>,
    /// The one dimming controller of this process
    pub controller: Arc<DimmingController>,
}

impl AppState {
    /// Builds the state with a sysfs writer for the configured LED.
    pub async fn new(config_manager: ConfigManager) -> Result<Self> {
        let base_path = config_manager.get().await.leds.base_path.clone();
        Self::with_writer(config_manager, Arc::new(SysfsLedWriter::new(base_path))).await
    }

    /// Builds the state around an arbitrary channel writer.
    ///
    /// The controller is configured from the current configuration but not
    /// started.
    pub async fn with_writer(
        config_manager: ConfigManager,
        writer: Arc<dyn ChannelWriter>,
    ) -> Result<Self> {
        let config = config_manager.clone_config().await;
        let controller = build_controller(&config, writer);
        controller
            .configure(config.threshold, config.dim_scaling)
            .await;

        Ok(Self {
            config_manager: Arc::new(config_manager),
            controller: Arc::new(controller),
        })
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config_manager.get().await
    }

    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    /// Feeds threshold and dim scaling of the active configuration to the controller.
    pub async fn apply_tunables(&self) {
        let (threshold, dim_scaling) = {
            let config = self.config().await;
            (config.threshold, config.dim_scaling)
        };
        self.controller.configure(threshold, dim_scaling).await;
    }
}

fn build_controller(config: &Config, writer: Arc<dyn ChannelWriter>) -> DimmingController {
    DimmingController::new(config.leds.colors.clone(), writer)
        .with_write_timeout(config.write_timeout())
}
