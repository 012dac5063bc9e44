use anyhow::Result;
use async_trait::async_trait;
use log::{error, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    dimming::{DimmingController, LightOutcome},
    event::{Event, EventBus},
    providers::traits::ServiceProvider,
    sensors::{SensorEventSource, SensorKind, SensorReading, SensorSubscription},
    task_manager::TaskManager,
};

/// Feeds sensor readings from the event bus to the dimming controller.
///
/// Readings are handled one at a time in arrival order, so one apply attempt
/// always finishes before the next reading is looked at.
///
/// # Priority and Criticality
///
/// - **Priority**: 10 (highest)
/// - **Critical**: Yes (the daemon has no purpose without it)
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use led_dimmerd::providers::DimmingServiceProvider;
/// use led_dimmerd::event::EventBus;
/// use led_dimmerd::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let event_bus = EventBus::new();
/// let provider = DimmingServiceProvider::new(state, event_bus);
/// # Ok(())
/// # }
/// ```
pub struct DimmingServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl DimmingServiceProvider {
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for DimmingServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let controller = self.state.controller.clone();
        let event_bus = self.event_bus.clone();
        // Subscribe before spawning so no reading published after start() is missed.
        let readings = self.event_bus.subscribe_readings();

        controller.start().await;

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_dimming_service(controller, event_bus, readings, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DimmingService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}

async fn run_dimming_service(
    controller: Arc<DimmingController>,
    event_bus: EventBus,
    mut readings: SensorSubscription,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;

            () = cancel_token.cancelled() => {
                info!("Dimming service cancelled");
                break;
            }
            reading = readings.next() => {
                let Some(reading) = reading else {
                    info!("Event bus closed, dimming service exiting");
                    break;
                };
                handle_reading(&controller, &event_bus, reading).await;
            }
        }
    }

    controller.stop().await;
    Ok(())
}

async fn handle_reading(controller: &DimmingController, event_bus: &EventBus, reading: SensorReading) {
    match reading.kind {
        SensorKind::Proximity => controller.on_proximity_event(reading.value).await,
        SensorKind::Light => {
            if let LightOutcome::Applied(scaling) = controller.on_light_event(reading.value).await {
                if let Err(e) = event_bus.publish(Event::ScalingChanged(scaling)) {
                    error!("Failed to publish scaling change: {e}");
                }
            }
        }
    }
}
