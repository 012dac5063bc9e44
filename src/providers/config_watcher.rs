use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use notify::{Event, EventHandler, RecursiveMode, Watcher, recommended_watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    event::{Event as AppEvent, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Quiet period after the last file event before the change is analyzed.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches the configuration file and announces changes on the event bus.
///
/// Threshold and dim scaling edits are announced as hot-reloadable; LED
/// layout edits need a restart.
///
/// # Priority and Criticality
///
/// - **Priority**: 6 (medium)
/// - **Critical**: No (optional service)
pub struct ConfigWatcherServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl ConfigWatcherServiceProvider {
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for ConfigWatcherServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_config_watcher_service(state, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ConfigWatcherService"
    }

    fn priority(&self) -> i32 {
        6
    }

    fn is_critical(&self) -> bool {
        false
    }
}

/// Forwards notify callbacks into the async service loop.
#[derive(Debug)]
struct AsyncEventHandler {
    sender: mpsc::UnboundedSender<notify::Result<Event>>,
}

impl EventHandler for AsyncEventHandler {
    fn handle_event(&mut self, event: notify::Result<Event>) {
        if let Err(e) = self.sender.send(event) {
            error!("Failed to send filesystem event to async handler: {}", e);
        }
    }
}

async fn run_config_watcher_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    let config_path = state.config_manager().path().to_path_buf();
    info!("Config watcher started for: {}", config_path.display());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher = recommended_watcher(AsyncEventHandler { sender: event_tx })?;

    // Editors replace files, so watch the directory rather than the file.
    let watch_path = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| config_path.clone());
    watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;
    info!("Watching directory: {}", watch_path.display());

    let debounce = tokio::time::sleep(DEBOUNCE);
    tokio::pin!(debounce);
    let mut has_pending_event = false;

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Config watcher service cancelled");
                break;
            }

            event_result = event_rx.recv() => {
                match event_result {
                    Some(Ok(event)) => {
                        let affects_config = event
                            .paths
                            .iter()
                            .any(|path| path.file_name() == config_path.file_name());
                        let is_relevant = event.kind.is_modify() || event.kind.is_create();

                        if affects_config && is_relevant {
                            debug!("Config file event {:?}, scheduling analysis", event.kind);
                            has_pending_event = true;
                            debounce.as_mut().reset(tokio::time::Instant::now() + DEBOUNCE);
                        }
                    }
                    Some(Err(e)) => warn!("Filesystem watcher error: {}", e),
                    None => {
                        warn!("Filesystem event channel closed, exiting");
                        break;
                    }
                }
            }

            () = &mut debounce, if has_pending_event => {
                has_pending_event = false;
                announce_changes(&state, &event_bus).await;
            }
        }
    }

    if let Err(e) = watcher.unwatch(&watch_path) {
        warn!("Failed to unwatch path during cleanup: {}", e);
    }

    info!("Config watcher service stopped");
    Ok(())
}

async fn announce_changes(state: &AppState, event_bus: &EventBus) {
    match state.config_manager().analyze_config_changes().await {
        Ok(Some(change_type)) => {
            info!("Configuration change detected: {:?}", change_type);
            if let Err(e) = event_bus.publish(AppEvent::ConfigChangeDetected(change_type)) {
                error!("Failed to publish config change event: {}", e);
            }
        }
        Ok(None) => debug!("Configuration file touched without relevant changes"),
        Err(e) => error!("Ignoring unreadable configuration: {:#}", e),
    }
}
