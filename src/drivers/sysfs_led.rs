use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    channel::Channel, channel_writer::ChannelWriter, error::WriteError, scaling::ScalingPercent,
};

/// Default LED class directory.
pub const DEFAULT_BASE_PATH: &str = "/sys/class/leds";

/// Attribute holding the duty-cycle scaling of one LED.
pub const SCALING_ATTRIBUTE: &str = "duty_pcts_scaling";

/// Writes scaling values to `<base>/led:rgb_<color>/duty_pcts_scaling`.
///
/// # Example
///
/// ```no_run
/// use led_dimmerd::{channel::Channel, channel_writer::ChannelWriter};
/// use led_dimmerd::{drivers::SysfsLedWriter, scaling::ScalingPercent};
///
/// let writer = SysfsLedWriter::new("/sys/class/leds");
/// writer.write(&Channel::from("red"), ScalingPercent::BRIGHT)?;
/// # Ok::<(), led_dimmerd::error::WriteError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SysfsLedWriter {
    base_path: PathBuf,
}

impl SysfsLedWriter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Attribute path for `channel`.
    pub fn path_for(&self, channel: &Channel) -> PathBuf {
        self.base_path
            .join(format!("led:rgb_{}", channel.name()))
            .join(SCALING_ATTRIBUTE)
    }
}

impl Default for SysfsLedWriter {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PATH)
    }
}

impl ChannelWriter for SysfsLedWriter {
    fn write(&self, channel: &Channel, value: ScalingPercent) -> Result<(), WriteError> {
        let path = self.path_for(channel);
        debug!("Writing {value} to {}", path.display());

        // Not truncated on open: a failed write must leave the old value.
        // The handle is dropped on every exit path.
        let text = value.to_string();
        let mut file = OpenOptions::new().write(true).open(&path)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;

        // A shorter value leaves a tail in regular files; sysfs ignores the length.
        let len = text.len() as u64;
        if file.metadata()?.len() > len {
            file.set_len(len)?;
        }
        Ok(())
    }
}
