//! Concrete channel writers.

pub mod sysfs_led;

pub use sysfs_led::SysfsLedWriter;
