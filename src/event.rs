//! Event-driven communication between services.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use crate::{scaling::ScalingPercent, sensors::SensorReading};

/// Type of configuration change detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeType {
    /// Threshold or dim scaling changed; applied to the running controller.
    HotReload,
    /// LED layout or write bound changed; needs a daemon restart.
    ColdRestart {
        /// Names of the changed sections
        changed_sections: Vec<String>,
        /// Threshold or dim scaling changed too and can still be applied live.
        tunables_changed: bool,
    },
}

/// Application events.
///
/// Sensor readings travel through the bus in publication order, which is the
/// order the dimming service hands them to the controller.
#[derive(Debug, Clone)]
pub enum Event {
    ConfigChangeDetected(ConfigChangeType),
    SystemShutdown,
    Sensor(SensorReading),
    /// All channels now run at the given scaling.
    ScalingChanged(ScalingPercent),
}

/// Publish-subscribe bus shared by all services.
///
/// # Example
///
/// ```no_run
/// use led_dimmerd::event::{Event, EventBus};
/// use led_dimmerd::sensors::SensorReading;
///
/// let event_bus = EventBus::new();
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus.publish(Event::Sensor(SensorReading::light(12.5)))?;
///
/// // In async context:
/// // let event = subscriber.recv().await;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    /// Lossless queues for sensor readings, one per reading subscriber.
    sensor_sinks: Arc<Mutex<Vec<mpsc::UnboundedSender<SensorReading>>>>,
}

impl EventBus {
    /// Creates a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new EventBus buffering up to `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sensor_sinks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Sensor readings also go to every reading queue. Returns an error if
    /// nobody received the event.
    pub fn publish(&self, event: Event) -> Result<()> {
        let mut queued = false;
        if let Event::Sensor(reading) = &event {
            let mut sinks = self.lock_sensor_sinks();
            sinks.retain(|sink| sink.send(*reading).is_ok());
            queued = !sinks.is_empty();
        }

        match self.sender.send(event) {
            Ok(_) => Ok(()),
            Err(_) if queued => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a lossless queue of the sensor readings published from now on.
    pub(crate) fn sensor_queue(&self) -> mpsc::UnboundedReceiver<SensorReading> {
        let (sink, queue) = mpsc::unbounded_channel();
        self.lock_sensor_sinks().push(sink);
        queue
    }

    // A poisoned lock only means a publisher panicked; the list is intact.
    fn lock_sensor_sinks(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<SensorReading>>> {
        self.sensor_sinks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates a new subscriber to receive events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, sleep};

    #[test]
    fn clones_share_one_channel() {
        let event_bus1 = EventBus::new();
        let event_bus2 = event_bus1.clone();

        let _receiver1 = event_bus1.subscribe();
        let _receiver2 = event_bus2.subscribe();

        assert_eq!(event_bus1.sender.receiver_count(), 2);
        assert_eq!(event_bus2.sender.receiver_count(), 2);
    }

    #[tokio::test]
    async fn publish_without_subscribers_returns_error() {
        let event_bus = EventBus::new();

        let result = event_bus.publish(Event::ConfigChangeDetected(ConfigChangeType::HotReload));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn sensor_readings_keep_publication_order() {
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        for value in [15.0, 5.0, 4.0, 20.0] {
            event_bus
                .publish(Event::Sensor(SensorReading::light(value)))
                .unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..4 {
            match receiver.recv().await.unwrap() {
                Event::Sensor(reading) => received.push(reading.value),
                other => panic!("Expected sensor event, got {other:?}"),
            }
        }
        assert_eq!(received, vec![15.0, 5.0, 4.0, 20.0]);
    }

    #[tokio::test]
    async fn late_subscriber_doesnt_receive_old_events() {
        let event_bus = EventBus::new();
        let _early = event_bus.subscribe();
        event_bus.publish(Event::SystemShutdown).unwrap();

        let mut late = event_bus.subscribe();
        event_bus
            .publish(Event::ScalingChanged(ScalingPercent::BRIGHT))
            .unwrap();

        match late.recv().await.unwrap() {
            Event::ScalingChanged(scaling) => assert!(scaling.is_bright()),
            other => panic!("Late subscriber got an old event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn event_bus_works_across_async_tasks() {
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();
        let publisher_bus = event_bus.clone();

        let publisher_handle = tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            publisher_bus.publish(Event::SystemShutdown).unwrap();
        });

        let receiver_handle = tokio::spawn(async move { receiver.recv().await.unwrap() });

        publisher_handle.await.unwrap();
        assert!(matches!(
            receiver_handle.await.unwrap(),
            Event::SystemShutdown
        ));
    }
}
