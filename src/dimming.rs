//! Ambient-light driven dimming of LED channels.
//!
//! [`DimmingController`] owns the applied scaling, the last sensor readings and
//! the configured threshold/dim values. Every operation takes the same lock, so
//! a configuration change or `stop()` never lands in the middle of an apply
//! attempt.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{sync::Mutex, task::JoinHandle, time::timeout};

use crate::{
    channel::Channel,
    channel_writer::ChannelWriter,
    error::{DimmingError, WriteError},
    scaling::{DEFAULT_THRESHOLD, ScalingPercent, Threshold},
};

/// Default bound on a single channel write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Lifecycle of a controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
}

/// Mutable state of one controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    /// Scaling every channel agreed on after the last successful apply.
    pub current_scaling: ScalingPercent,
    pub light_value: f32,
    /// Recorded for observers; not part of the scaling decision.
    pub proximity_value: f32,
    pub threshold: Threshold,
    pub dim_scaling: ScalingPercent,
    pub lifecycle: Lifecycle,
}

impl ControllerState {
    /// Scaling wanted for the current light reading.
    pub fn desired_scaling(&self) -> ScalingPercent {
        if self.light_value < self.threshold as f32 {
            self.dim_scaling
        } else {
            ScalingPercent::BRIGHT
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            current_scaling: ScalingPercent::BRIGHT,
            light_value: f32::INFINITY,
            proximity_value: f32::INFINITY,
            threshold: DEFAULT_THRESHOLD,
            dim_scaling: ScalingPercent::DEFAULT_DIM,
            lifecycle: Lifecycle::Stopped,
        }
    }
}

/// Result of handling one light reading.
#[derive(Debug)]
pub enum LightOutcome {
    /// The controller is stopped; nothing changed.
    Ignored,
    /// The desired scaling is already applied; no writes were issued.
    Unchanged(ScalingPercent),
    /// Every channel accepted the new scaling.
    Applied(ScalingPercent),
    /// A channel write failed; the applied scaling stays as it was.
    Failed(DimmingError),
}

/// Brightness-scaling controller for a fixed set of LED channels.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use led_dimmerd::{channel::Channel, dimming::DimmingController};
/// use led_dimmerd::drivers::SysfsLedWriter;
///
/// # async fn example() {
/// let controller = DimmingController::new(
///     Channel::rgb(),
///     Arc::new(SysfsLedWriter::default()),
/// );
/// controller.configure(10, 40).await;
/// controller.start().await;
/// controller.on_light_event(5.0).await;
/// controller.stop().await;
/// # }
/// ```
pub struct DimmingController {
    state: Mutex<ControllerState>,
    /// Writes that outlived the timeout and are still running.
    abandoned: Mutex<Vec<JoinHandle<Result<(), WriteError>>>>,
    channels: Vec<Channel>,
    writer: Arc<dyn ChannelWriter>,
    write_timeout: Duration,
}

impl DimmingController {
    /// Creates a stopped controller writing `channels` in the given order.
    pub fn new(channels: Vec<Channel>, writer: Arc<dyn ChannelWriter>) -> Self {
        Self {
            state: Mutex::new(ControllerState::default()),
            abandoned: Mutex::new(Vec::new()),
            channels,
            writer,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Sets the bound after which a hanging write counts as failed.
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> ControllerState {
        *self.state.lock().await
    }

    pub async fn current_scaling(&self) -> ScalingPercent {
        self.state.lock().await.current_scaling
    }

    /// Stores a new threshold and, when it lies within `3..=100`, a new dim scaling.
    ///
    /// Rejected dim values are logged and leave the previous value in place.
    /// Channels are not touched.
    pub async fn configure(&self, threshold: Threshold, dim_scaling: i32) {
        let mut state = self.state.lock().await;
        state.threshold = threshold;
        match ScalingPercent::dim(dim_scaling) {
            Ok(dim) => state.dim_scaling = dim,
            Err(e) => warn!("{e}; keeping dim scaling {}", state.dim_scaling),
        }
        info!(
            "Configured threshold={} dim_scaling={}",
            state.threshold, state.dim_scaling
        );
    }

    /// Starts accepting sensor events from a full-brightness baseline.
    ///
    /// Starting a running controller changes nothing.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.is_running() {
            debug!("Dimming controller already running");
            return;
        }
        state.current_scaling = ScalingPercent::BRIGHT;
        state.lifecycle = Lifecycle::Running;
        info!("Dimming controller started");
    }

    /// Stops accepting sensor events.
    ///
    /// Waits for an in-flight apply attempt and for writes that already
    /// timed out; once this returns no further channel writes happen.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if state.is_running() {
            state.lifecycle = Lifecycle::Stopped;
            info!("Dimming controller stopped");
        }
        self.join_abandoned().await;
    }

    /// Records a proximity reading. Proximity does not affect the scaling.
    pub async fn on_proximity_event(&self, value: f32) {
        let mut state = self.state.lock().await;
        if state.is_running() {
            state.proximity_value = value;
        }
    }

    /// Records a light reading and applies the resulting scaling if it changed.
    pub async fn on_light_event(&self, value: f32) -> LightOutcome {
        let mut state = self.state.lock().await;
        if !state.is_running() {
            return LightOutcome::Ignored;
        }

        state.light_value = value;
        let desired = state.desired_scaling();
        if desired == state.current_scaling {
            debug!("Light {value}: scaling {desired} already applied");
            return LightOutcome::Unchanged(desired);
        }

        match self.apply(desired).await {
            Ok(()) => {
                info!(
                    "Light {value}: scaling {} -> {desired}",
                    state.current_scaling
                );
                state.current_scaling = desired;
                LightOutcome::Applied(desired)
            }
            Err(e) => {
                error!("Light {value}: could not apply scaling {desired}: {e}");
                LightOutcome::Failed(e)
            }
        }
    }

    /// Writes `value` to every channel in order, stopping at the first failure.
    ///
    /// Channels written before a failure keep the new value.
    async fn apply(&self, value: ScalingPercent) -> Result<(), DimmingError> {
        for channel in &self.channels {
            self.write_channel(channel, value)
                .await
                .map_err(|source| DimmingError::ChannelWriteFailed {
                    channel: channel.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Runs one write with the timeout bound.
    ///
    /// A timed-out write cannot be interrupted. Its handle is kept and joined
    /// before the next write starts, so writes never overlap.
    async fn write_channel(&self, channel: &Channel, value: ScalingPercent) -> Result<(), WriteError> {
        self.join_abandoned().await;

        let writer = Arc::clone(&self.writer);
        let target = channel.clone();
        let mut job = tokio::task::spawn_blocking(move || writer.write(&target, value));

        match timeout(self.write_timeout, &mut job).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(WriteError::Worker(e.to_string())),
            Err(_) => {
                self.abandoned.lock().await.push(job);
                Err(WriteError::Timeout(self.write_timeout))
            }
        }
    }

    async fn join_abandoned(&self) {
        let pending = std::mem::take(&mut *self.abandoned.lock().await);
        for job in pending {
            match job.await {
                Ok(Ok(())) => warn!("Timed-out channel write completed late"),
                Ok(Err(e)) => warn!("Timed-out channel write failed late: {e}"),
                Err(e) => warn!("Timed-out channel write worker failed: {e}"),
            }
        }
    }
}

impl std::fmt::Debug for DimmingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DimmingController")
            .field("channels", &self.channels)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_writer::{MockChannelWriter, testing::RecordingWriter};
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn pct(value: i32) -> ScalingPercent {
        ScalingPercent::new(value).unwrap()
    }

    fn controller_with(writer: Arc<RecordingWriter>) -> DimmingController {
        DimmingController::new(Channel::rgb(), writer)
    }

    async fn running_controller(
        threshold: Threshold,
        dim: i32,
    ) -> (DimmingController, Arc<RecordingWriter>) {
        let writer = Arc::new(RecordingWriter::new());
        let controller = controller_with(writer.clone());
        controller.configure(threshold, dim).await;
        controller.start().await;
        (controller, writer)
    }

    #[tokio::test]
    async fn new_controller_starts_stopped_at_full_brightness() {
        let controller = controller_with(Arc::new(RecordingWriter::new()));
        let state = controller.snapshot().await;

        assert_eq!(state.lifecycle, Lifecycle::Stopped);
        assert_eq!(state.current_scaling, ScalingPercent::BRIGHT);
        assert_eq!(state.threshold, 0);
        assert_eq!(state.dim_scaling, pct(50));
        assert!(state.light_value.is_infinite());
        assert!(state.proximity_value.is_infinite());
    }

    #[tokio::test]
    async fn configure_rejects_out_of_range_dim_scaling() {
        let controller = controller_with(Arc::new(RecordingWriter::new()));

        controller.configure(0, 50).await;
        controller.configure(0, 2).await;

        let state = controller.snapshot().await;
        assert_eq!(state.dim_scaling, pct(50));
        assert_eq!(state.threshold, 0);
    }

    #[tokio::test]
    async fn configure_always_updates_threshold() {
        let controller = controller_with(Arc::new(RecordingWriter::new()));

        controller.configure(-7, 500).await;

        let state = controller.snapshot().await;
        assert_eq!(state.threshold, -7);
        assert_eq!(state.dim_scaling, pct(50));
    }

    #[tokio::test]
    async fn configure_accepts_only_three_to_hundred() {
        for (dim, expected) in [
            (0, 50),
            (1, 50),
            (2, 50),
            (3, 3),
            (50, 50),
            (100, 100),
            (101, 50),
            (200, 50),
        ] {
            let writer = Arc::new(RecordingWriter::new());
            let controller = controller_with(writer.clone());
            controller.configure(5, dim).await;

            assert_eq!(controller.snapshot().await.dim_scaling, pct(expected), "dim {dim}");
            assert_eq!(writer.write_count(), 0);
        }
    }

    #[tokio::test]
    async fn reference_scenario() {
        let (controller, writer) = running_controller(10, 40).await;

        assert!(matches!(
            controller.on_light_event(15.0).await,
            LightOutcome::Unchanged(s) if s == ScalingPercent::BRIGHT
        ));
        assert_eq!(writer.write_count(), 0);

        assert!(matches!(
            controller.on_light_event(5.0).await,
            LightOutcome::Applied(s) if s == pct(40)
        ));
        assert_eq!(
            writer.writes(),
            vec![
                (Channel::from("red"), 40),
                (Channel::from("green"), 40),
                (Channel::from("blue"), 40),
            ]
        );
        assert_eq!(controller.current_scaling().await, pct(40));

        assert!(matches!(
            controller.on_light_event(4.0).await,
            LightOutcome::Unchanged(_)
        ));
        assert_eq!(writer.write_count(), 3);

        writer.fail_channel("green");
        assert!(matches!(
            controller.on_light_event(20.0).await,
            LightOutcome::Failed(DimmingError::ChannelWriteFailed { ref channel, .. })
                if channel.name() == "green"
        ));
        assert_eq!(controller.current_scaling().await, pct(40));
    }

    #[tokio::test]
    async fn failed_attempt_is_retried_by_next_differing_event() {
        let (controller, writer) = running_controller(10, 40).await;
        writer.fail_channel("red");

        assert!(matches!(
            controller.on_light_event(1.0).await,
            LightOutcome::Failed(_)
        ));
        assert_eq!(controller.current_scaling().await, ScalingPercent::BRIGHT);

        writer.heal();
        assert!(matches!(
            controller.on_light_event(2.0).await,
            LightOutcome::Applied(s) if s == pct(40)
        ));
        assert_eq!(controller.current_scaling().await, pct(40));
    }

    #[tokio::test]
    async fn apply_stops_at_first_failing_channel() {
        let mut writer = MockChannelWriter::new();
        let mut seq = Sequence::new();
        writer
            .expect_write()
            .withf(|channel, value| channel.name() == "red" && value.get() == 40)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        writer
            .expect_write()
            .withf(|channel, value| channel.name() == "green" && value.get() == 40)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(WriteError::Unavailable("busy".to_string())));
        writer
            .expect_write()
            .withf(|channel, _| channel.name() == "blue")
            .never();

        let controller = DimmingController::new(Channel::rgb(), Arc::new(writer));
        controller.configure(10, 40).await;
        controller.start().await;

        let outcome = controller.on_light_event(0.0).await;

        assert!(matches!(
            outcome,
            LightOutcome::Failed(DimmingError::ChannelWriteFailed {
                source: WriteError::Unavailable(_),
                ..
            })
        ));
        assert_eq!(controller.current_scaling().await, ScalingPercent::BRIGHT);
    }

    #[tokio::test]
    async fn hanging_write_times_out_as_failure() {
        let writer = Arc::new(RecordingWriter::new());
        writer.set_delay(Duration::from_millis(200));
        let controller =
            controller_with(writer.clone()).with_write_timeout(Duration::from_millis(20));
        controller.configure(10, 40).await;
        controller.start().await;

        let outcome = controller.on_light_event(0.0).await;

        assert!(matches!(
            outcome,
            LightOutcome::Failed(DimmingError::ChannelWriteFailed {
                source: WriteError::Timeout(_),
                ..
            })
        ));
        assert_eq!(controller.current_scaling().await, ScalingPercent::BRIGHT);
    }

    #[tokio::test]
    async fn stop_joins_timed_out_write() {
        let writer = Arc::new(RecordingWriter::new());
        writer.set_delay(Duration::from_millis(150));
        let controller =
            controller_with(writer.clone()).with_write_timeout(Duration::from_millis(20));
        controller.configure(10, 40).await;
        controller.start().await;

        assert!(matches!(
            controller.on_light_event(1.0).await,
            LightOutcome::Failed(DimmingError::ChannelWriteFailed {
                source: WriteError::Timeout(_),
                ..
            })
        ));

        controller.stop().await;
        let writes_at_stop = writer.write_count();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(writes_at_stop, 1);
        assert_eq!(writer.write_count(), writes_at_stop);
    }

    #[tokio::test]
    async fn next_apply_waits_for_timed_out_write() {
        let writer = Arc::new(RecordingWriter::new());
        writer.set_delay(Duration::from_millis(150));
        let controller =
            controller_with(writer.clone()).with_write_timeout(Duration::from_millis(20));
        controller.configure(10, 40).await;
        controller.start().await;

        assert!(matches!(
            controller.on_light_event(1.0).await,
            LightOutcome::Failed(_)
        ));
        writer.set_delay(Duration::ZERO);

        assert!(matches!(
            controller.on_light_event(2.0).await,
            LightOutcome::Applied(s) if s == pct(40)
        ));
        assert_eq!(
            writer.writes(),
            vec![
                (Channel::from("red"), 40),
                (Channel::from("red"), 40),
                (Channel::from("green"), 40),
                (Channel::from("blue"), 40),
            ]
        );
    }

    #[tokio::test]
    async fn proximity_is_recorded_without_writes() {
        let (controller, writer) = running_controller(10, 40).await;

        controller.on_proximity_event(0.0).await;

        let state = controller.snapshot().await;
        assert_eq!(state.proximity_value, 0.0);
        assert_eq!(state.current_scaling, ScalingPercent::BRIGHT);
        assert_eq!(writer.write_count(), 0);
    }

    #[tokio::test]
    async fn events_while_stopped_are_discarded() {
        let writer = Arc::new(RecordingWriter::new());
        let controller = controller_with(writer.clone());
        controller.configure(10, 40).await;

        assert!(matches!(
            controller.on_light_event(1.0).await,
            LightOutcome::Ignored
        ));
        controller.on_proximity_event(1.0).await;

        let state = controller.snapshot().await;
        assert!(state.light_value.is_infinite());
        assert!(state.proximity_value.is_infinite());
        assert_eq!(writer.write_count(), 0);
    }

    #[tokio::test]
    async fn events_after_stop_never_write() {
        let (controller, writer) = running_controller(10, 40).await;
        controller.on_light_event(1.0).await;
        assert_eq!(writer.write_count(), 3);

        controller.stop().await;
        assert!(matches!(
            controller.on_light_event(50.0).await,
            LightOutcome::Ignored
        ));

        assert_eq!(writer.write_count(), 3);
        assert_eq!(controller.current_scaling().await, pct(40));
    }

    #[tokio::test]
    async fn start_resets_to_bright_only_from_stopped() {
        let (controller, _writer) = running_controller(10, 40).await;
        controller.on_light_event(1.0).await;

        controller.start().await;
        assert_eq!(controller.current_scaling().await, pct(40));

        controller.stop().await;
        controller.start().await;
        assert_eq!(controller.current_scaling().await, ScalingPercent::BRIGHT);
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_apply() {
        let writer = Arc::new(RecordingWriter::new());
        writer.set_delay(Duration::from_millis(30));
        let controller = Arc::new(controller_with(writer.clone()));
        controller.configure(10, 40).await;
        controller.start().await;

        let in_flight = tokio::spawn({
            let controller = controller.clone();
            async move { controller.on_light_event(1.0).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        controller.stop().await;
        let writes_at_stop = writer.write_count();

        assert!(matches!(in_flight.await.unwrap(), LightOutcome::Applied(_)));
        assert_eq!(writes_at_stop, 3);
        assert!(matches!(
            controller.on_light_event(50.0).await,
            LightOutcome::Ignored
        ));
        assert_eq!(writer.write_count(), 3);
    }

    #[tokio::test]
    async fn configure_waits_for_in_flight_apply() {
        let writer = Arc::new(RecordingWriter::new());
        writer.set_delay(Duration::from_millis(30));
        let controller = Arc::new(controller_with(writer.clone()));
        controller.configure(10, 40).await;
        controller.start().await;

        let in_flight = tokio::spawn({
            let controller = controller.clone();
            async move { controller.on_light_event(1.0).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        controller.configure(10, 60).await;

        assert!(matches!(
            in_flight.await.unwrap(),
            LightOutcome::Applied(s) if s == pct(40)
        ));
        assert!(writer.writes().iter().all(|(_, value)| *value == 40));
        assert_eq!(controller.snapshot().await.dim_scaling, pct(60));
    }

    #[tokio::test]
    async fn new_dim_value_applies_on_next_light_event() {
        let (controller, writer) = running_controller(10, 40).await;
        controller.on_light_event(1.0).await;

        controller.configure(10, 60).await;
        assert_eq!(writer.write_count(), 3);

        assert!(matches!(
            controller.on_light_event(1.0).await,
            LightOutcome::Applied(s) if s == pct(60)
        ));
        assert_eq!(writer.write_count(), 6);
    }

    fn light_values() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(0.0f32..20.0, 1..40)
    }

    proptest! {
        #[test]
        fn writes_only_when_desired_scaling_changes(values in light_values()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let (controller, writer) = running_controller(10, 40).await;
                let mut applied = ScalingPercent::BRIGHT;
                let mut expected_writes = 0;

                for value in values {
                    let desired = if value < 10.0 { pct(40) } else { ScalingPercent::BRIGHT };
                    if desired != applied {
                        expected_writes += 3;
                        applied = desired;
                    }
                    controller.on_light_event(value).await;
                    prop_assert_eq!(writer.write_count(), expected_writes);
                    prop_assert_eq!(controller.current_scaling().await, applied);
                }
                Ok(())
            })?;
        }
    }
}
