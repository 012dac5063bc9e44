//! Duty-cycle scaling values applied to LED channels.

use std::fmt;

use crate::error::DimmingError;

/// Light level below which dimming activates.
pub type Threshold = i32;

/// Default light threshold when none is configured.
pub const DEFAULT_THRESHOLD: Threshold = 0;

/// Percentage of the full duty cycle, always within `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScalingPercent(u8);

impl ScalingPercent {
    /// Full brightness. Writing it leaves the LEDs untouched.
    pub const BRIGHT: Self = Self(100);

    /// Dim value used until configuration says otherwise.
    pub const DEFAULT_DIM: Self = Self(50);

    /// Smallest value accepted as a dim scaling.
    pub const MIN_DIM: i32 = 3;

    /// Largest value accepted as a dim scaling.
    pub const MAX_DIM: i32 = 100;

    /// Builds a scaling from any value within `1..=100`.
    pub fn new(value: i32) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| (1..=100).contains(v))
            .map(Self)
    }

    /// Validates a configured dim scaling.
    ///
    /// Only `3..=100` is accepted. Anything else yields
    /// [`DimmingError::ConfigRejected`] and the caller keeps its previous value.
    pub fn dim(value: i32) -> Result<Self, DimmingError> {
        if (Self::MIN_DIM..=Self::MAX_DIM).contains(&value) {
            Self::new(value).ok_or(DimmingError::ConfigRejected(value))
        } else {
            Err(DimmingError::ConfigRejected(value))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_bright(self) -> bool {
        self.0 == Self::BRIGHT.0
    }
}

impl Default for ScalingPercent {
    fn default() -> Self {
        Self::BRIGHT
    }
}

impl fmt::Display for ScalingPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ScalingPercent> for u8 {
    fn from(value: ScalingPercent) -> Self {
        value.0
    }
}
