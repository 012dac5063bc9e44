//! Output channel identities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Colors of the reference RGB indicator, in write order.
pub const RGB_COLORS: [&str; 3] = ["red", "green", "blue"];

/// One independently addressable output of the LED, named by its color.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The `red`, `green`, `blue` channel set.
    pub fn rgb() -> Vec<Self> {
        RGB_COLORS.iter().copied().map(Self::new).collect()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rgb_set_has_stable_order() {
        let names: Vec<_> = Channel::rgb().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["red", "green", "blue"]);
    }

    #[test]
    fn channel_deserializes_from_plain_string() {
        let channels: Vec<Channel> = serde_yaml::from_str("[red, amber]").unwrap();
        assert_eq!(channels, vec![Channel::from("red"), Channel::from("amber")]);
    }
}
