//! System coordinator for managing service lifecycle and dependency injection.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    app_context::AppState,
    config::ConfigManager,
    event::{ConfigChangeType, Event, EventBus},
    providers::{
        AppStateProvider, AsyncProvider, ConfigWatcherServiceProvider, DBusServiceProvider,
        DimmingServiceProvider, ServiceProvider,
    },
    task_manager::TaskManager,
};

/// Owns the services of the daemon and drives the main event loop.
///
/// Critical services must start; non-critical ones may fail with a warning.
/// Shutdown stops the dimming controller before cancelling services, so no
/// channel write happens once shutdown has begun.
pub struct SystemCoordinator {
    task_manager: TaskManager,
    event_bus: EventBus,
    shared_state: Option<Arc<AppState>>,
    service_providers: Vec<Box<dyn ServiceProvider>>,
    enable_dbus: bool,
}

impl Default for SystemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCoordinator {
    pub fn new() -> Self {
        Self {
            task_manager: TaskManager::new(),
            event_bus: EventBus::new(),
            shared_state: None,
            service_providers: Vec::new(),
            enable_dbus: true,
        }
    }

    /// Skips the D-Bus service, leaving the event bus as the only input.
    pub fn without_dbus(mut self) -> Self {
        self.enable_dbus = false;
        self
    }

    /// Builds the shared state from `config_manager` and registers services.
    pub async fn initialize(&mut self, config_manager: ConfigManager) -> Result<()> {
        self.initialize_with(AppStateProvider::new(config_manager))
            .await
    }

    /// Like [`initialize`](Self::initialize) with a custom state provider.
    pub async fn initialize_with(&mut self, provider: AppStateProvider) -> Result<()> {
        info!("Initializing SystemCoordinator...");

        let state = provider
            .provide()
            .await
            .context("Failed to initialize application state")?;
        self.shared_state = Some(state.clone());

        self.register_service_providers(state)
            .await
            .context("Failed to register service providers")?;

        info!("SystemCoordinator initialization completed");
        Ok(())
    }

    async fn register_service_providers(&mut self, state: Arc<AppState>) -> Result<()> {
        let mut providers: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(DimmingServiceProvider::new(
                state.clone(),
                self.event_bus.clone(),
            )),
            Box::new(ConfigWatcherServiceProvider::new(
                state.clone(),
                self.event_bus.clone(),
            )),
        ];

        if self.enable_dbus {
            match DBusServiceProvider::new(state.clone(), self.event_bus.clone()).await {
                Ok(provider) => providers.push(Box::new(provider)),
                Err(e) => warn!("{:#}, skipping D-Bus service", e),
            }
        }

        providers.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        self.service_providers = providers;

        info!(
            "Registered {} service providers in priority order",
            self.service_providers.len()
        );
        Ok(())
    }

    /// Starts all registered services in priority order.
    pub async fn start_all_services(&mut self) -> Result<()> {
        info!(
            "Starting {} services in priority order...",
            self.service_providers.len()
        );

        for provider in &self.service_providers {
            match provider.start(&mut self.task_manager).await {
                Ok(()) => info!(
                    "Service '{}' started (priority: {}, critical: {})",
                    provider.name(),
                    provider.priority(),
                    provider.is_critical()
                ),
                Err(e) if provider.is_critical() => {
                    return Err(e).with_context(|| {
                        format!("Critical service '{}' failed to start", provider.name())
                    });
                }
                Err(e) => warn!(
                    "Non-critical service '{}' failed to start: {}",
                    provider.name(),
                    e
                ),
            }
        }

        info!("All critical services started successfully");
        Ok(())
    }

    /// Runs until Ctrl+C or a shutdown request, then shuts down gracefully.
    pub async fn run_main_loop(&mut self) -> Result<()> {
        let mut event_rx = self.event_bus.subscribe();
        info!("Starting main event loop");

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    info!("Received Ctrl+C, initiating graceful shutdown...");
                    break;
                }

                event = event_rx.recv() => {
                    if !self.handle_event(event).await? {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        info!("Main event loop terminated");
        Ok(())
    }

    /// Handles one bus event. Returns `false` when the loop should end.
    async fn handle_event(&mut self, event_result: Result<Event, RecvError>) -> Result<bool> {
        match event_result {
            Ok(Event::ConfigChangeDetected(change_type)) => {
                self.handle_config_change(change_type)
                    .await
                    .context("Failed to handle config change")?;
            }
            Ok(Event::SystemShutdown) => {
                info!("Processing SystemShutdown event");
                return Ok(false);
            }
            Ok(Event::ScalingChanged(scaling)) => info!("LED scaling now {scaling}%"),
            Ok(Event::Sensor(reading)) => debug!("Sensor reading: {reading:?}"),
            Err(RecvError::Closed) => bail!("Event bus channel closed unexpectedly"),
            Err(RecvError::Lagged(n)) => warn!("Event bus lagged by {n} messages"),
        }
        Ok(true)
    }

    async fn handle_config_change(&self, change_type: ConfigChangeType) -> Result<()> {
        match change_type {
            ConfigChangeType::HotReload => self.handle_hot_reload().await,
            ConfigChangeType::ColdRestart {
                changed_sections,
                tunables_changed,
            } => {
                warn!("Configuration changes in {changed_sections:?} require a restart");
                warn!("Restart the daemon to apply them: sudo systemctl restart led_dimmerd");
                if tunables_changed {
                    self.handle_tunables_reload().await?;
                }
                Ok(())
            }
        }
    }

    /// Applies threshold and dim scaling while the rest waits for a restart.
    async fn handle_tunables_reload(&self) -> Result<()> {
        let Some(state) = &self.shared_state else {
            warn!("Cannot reload config: system state not initialized");
            return Ok(());
        };

        state
            .config_manager()
            .reload_tunables()
            .await
            .context("Failed to reload threshold and dim scaling")?;
        state.apply_tunables().await;

        info!("Threshold and dim scaling reloaded");
        Ok(())
    }

    /// Reloads the configuration and hands threshold and dim scaling to the controller.
    async fn handle_hot_reload(&self) -> Result<()> {
        let Some(state) = &self.shared_state else {
            warn!("Cannot reload config: system state not initialized");
            return Ok(());
        };

        state
            .config_manager()
            .reload()
            .await
            .context("Failed to reload configuration")?;
        state.apply_tunables().await;

        info!("Hot configuration reload completed successfully");
        Ok(())
    }

    async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");

        if let Some(state) = &self.shared_state {
            state.controller.stop().await;
        }

        if let Err(e) = self.task_manager.shutdown_all().await {
            log::error!("Error during task shutdown: {:#}", e);
        }

        info!("Shutdown complete");
    }

    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn shared_state(&self) -> Option<&Arc<AppState>> {
        self.shared_state.as_ref()
    }

    pub fn running_services(&self) -> Vec<&'static str> {
        self.service_providers.iter().map(|p| p.name()).collect()
    }
}
