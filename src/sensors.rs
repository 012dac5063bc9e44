//! Sensor readings and the push-style source that delivers them.

use tokio::sync::mpsc;

use crate::event::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Light,
    Proximity,
}

/// One value reported by the ambient-light or proximity sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub kind: SensorKind,
    pub value: f32,
}

impl SensorReading {
    pub const fn light(value: f32) -> Self {
        Self {
            kind: SensorKind::Light,
            value,
        }
    }

    pub const fn proximity(value: f32) -> Self {
        Self {
            kind: SensorKind::Proximity,
            value,
        }
    }
}

/// Capability of delivering sensor readings to a subscriber.
pub trait SensorEventSource {
    /// Subscribes to readings published from now on, in arrival order.
    fn subscribe_readings(&self) -> SensorSubscription;
}

/// Queue of sensor readings published on the [`EventBus`].
///
/// Unlike a plain bus subscription it never drops readings when the consumer
/// falls behind; every reading is delivered once, in publication order.
pub struct SensorSubscription {
    receiver: mpsc::UnboundedReceiver<SensorReading>,
}

impl SensorSubscription {
    /// Waits for the next reading. Returns `None` once the bus is dropped.
    ///
    /// Cancel safe: dropping the future loses no reading.
    pub async fn next(&mut self) -> Option<SensorReading> {
        self.receiver.recv().await
    }
}

impl SensorEventSource for EventBus {
    fn subscribe_readings(&self) -> SensorSubscription {
        SensorSubscription {
            receiver: self.sensor_queue(),
        }
    }
}
