//! D-Bus interface of the daemon.
//!
//! Sensor collaborators push readings through `ReportLight`/`ReportProximity`;
//! the settings side calls `Configure`.

use std::sync::Arc;

use log::{error, info};
use zbus::{fdo, interface, object_server::SignalEmitter};

use crate::{
    app_context::AppState,
    event::{Event, EventBus},
    sensors::SensorReading,
};

pub const SERVICE_NAME: &str = "io.github.led_dimmerd";
pub const OBJECT_PATH: &str = "/io/github/led_dimmerd";

pub struct DBusInterface {
    state: Arc<AppState>,
    event_bus: EventBus,
    version: String,
}

impl DBusInterface {
    pub fn new(state: Arc<AppState>, version: String, event_bus: EventBus) -> Self {
        Self {
            state,
            event_bus,
            version,
        }
    }

    fn publish(&self, event: Event) -> fdo::Result<()> {
        self.event_bus.publish(event).map_err(|e| {
            error!("Failed to publish event: {e}");
            fdo::Error::Failed(format!("event not delivered: {e}"))
        })
    }
}

#[interface(name = "io.github.led_dimmerd1")]
impl DBusInterface {
    #[zbus(signal)]
    async fn stopped(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    async fn stop(&self, #[zbus(signal_emitter)] emitter: SignalEmitter<'_>) -> fdo::Result<()> {
        info!("Stop requested over D-Bus");
        emitter.stopped().await?;
        self.publish(Event::SystemShutdown)
    }

    async fn report_light(&self, value: f64) -> fdo::Result<()> {
        self.publish(Event::Sensor(SensorReading::light(value as f32)))
    }

    async fn report_proximity(&self, value: f64) -> fdo::Result<()> {
        self.publish(Event::Sensor(SensorReading::proximity(value as f32)))
    }

    async fn configure(&self, threshold: i32, dim_scaling: i32) {
        self.state.controller.configure(threshold, dim_scaling).await;
    }

    #[zbus(property)]
    async fn version(&self) -> String {
        self.version.clone()
    }

    #[zbus(property)]
    async fn current_scaling(&self) -> u8 {
        self.state.controller.current_scaling().await.get()
    }

    #[zbus(property)]
    async fn threshold(&self) -> i32 {
        self.state.controller.snapshot().await.threshold
    }

    #[zbus(property)]
    async fn dim_scaling(&self) -> u8 {
        self.state.controller.snapshot().await.dim_scaling.get()
    }

    #[zbus(property)]
    async fn running(&self) -> bool {
        self.state.controller.snapshot().await.is_running()
    }
}
