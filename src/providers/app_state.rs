//! Application state provider for dependency injection.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    app_context::AppState, channel_writer::ChannelWriter, config::ConfigManager,
    providers::traits::AsyncProvider,
};

/// Builds the shared [`AppState`].
///
/// Uses the sysfs LED writer unless another writer is supplied.
pub struct AppStateProvider {
    config_manager: ConfigManager,
    writer: Option<Arc<dyn ChannelWriter>>,
}

impl AppStateProvider {
    pub const fn new(config_manager: ConfigManager) -> Self {
        Self {
            config_manager,
            writer: None,
        }
    }

    /// Replaces the sysfs writer, e.g. with an in-memory sink.
    pub fn with_writer(mut self, writer: Arc<dyn ChannelWriter>) -> Self {
        self.writer = Some(writer);
        self
    }
}

#[async_trait]
impl AsyncProvider<Arc<AppState>> for AppStateProvider {
    async fn provide(&self) -> Result<Arc<AppState>> {
        let config_manager = self.config_manager.clone();
        let app_state = match &self.writer {
            Some(writer) => AppState::with_writer(config_manager, writer.clone()).await?,
            None => AppState::new(config_manager).await?,
        };
        Ok(Arc::new(app_state))
    }
}
