//! Channel writer abstraction consumed by the dimming controller.

use crate::{channel::Channel, error::WriteError, scaling::ScalingPercent};

/// Per-channel sink for scaling values.
///
/// Calls are blocking: the controller waits on each write in turn. A call
/// either persists `value` for `channel` completely or fails without any
/// persisted effect for that channel.
///
/// # Example
///
/// ```no_run
/// use led_dimmerd::{channel::Channel, channel_writer::ChannelWriter};
/// use led_dimmerd::{error::WriteError, scaling::ScalingPercent};
///
/// struct NullWriter;
///
/// impl ChannelWriter for NullWriter {
///     fn write(&self, _channel: &Channel, _value: ScalingPercent) -> Result<(), WriteError> {
///         Ok(())
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ChannelWriter: Send + Sync {
    /// Writes `value` to `channel`.
    fn write(&self, channel: &Channel, value: ScalingPercent) -> Result<(), WriteError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory writers shared by the crate's tests.

    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Records every write and fails on demand.
    #[derive(Debug, Default)]
    pub struct RecordingWriter {
        writes: Mutex<Vec<(Channel, u8)>>,
        failing: Mutex<HashSet<String>>,
        delay: Mutex<Option<Duration>>,
    }

    impl RecordingWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_channel(&self, name: &str) {
            self.failing.lock().unwrap().insert(name.to_string());
        }

        pub fn heal(&self) {
            self.failing.lock().unwrap().clear();
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }

        /// Successful and attempted writes, in call order.
        pub fn writes(&self) -> Vec<(Channel, u8)> {
            self.writes.lock().unwrap().clone()
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    impl ChannelWriter for RecordingWriter {
        fn write(&self, channel: &Channel, value: ScalingPercent) -> Result<(), WriteError> {
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            self.writes
                .lock()
                .unwrap()
                .push((channel.clone(), value.get()));
            if self.failing.lock().unwrap().contains(channel.name()) {
                return Err(WriteError::Unavailable(format!("{channel} is failing")));
            }
            Ok(())
        }
    }
}
