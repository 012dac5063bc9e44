//! Error types for the dimming core.
//!
//! Service plumbing uses `anyhow`; these typed errors are what the controller
//! and channel writers exchange.

use std::time::Duration;

use thiserror::Error;

use crate::channel::Channel;

/// Failure of a single channel write.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The underlying sink could not be opened or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The write did not finish within the configured bound.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// The blocking worker running the write panicked or was cancelled.
    #[error("write worker failed: {0}")]
    Worker(String),

    /// The sink refused the value.
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

/// Errors produced by the dimming controller.
#[derive(Error, Debug)]
pub enum DimmingError {
    /// A dim scaling outside `3..=100` was offered and ignored.
    #[error("dim scaling {0} rejected: accepted range is 3..=100")]
    ConfigRejected(i32),

    /// One channel write of an apply attempt failed.
    #[error("failed to write channel {channel}: {source}")]
    ChannelWriteFailed {
        channel: Channel,
        #[source]
        source: WriteError,
    },
}
