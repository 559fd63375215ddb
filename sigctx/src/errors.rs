//! Error types for sigctx.
//!
//! Composition only fails while it is being set up. Once `compose` has
//! returned, the watcher has no error path: reaching the terminate limit is
//! reported through the logger and the watcher's exit reason.

use thiserror::Error;

use crate::signals::Signal;

/// The main error type for sigctx operations.
#[derive(Debug, Error)]
pub enum SigctxError {
    /// `compose` was called outside of a tokio runtime.
    #[error("no tokio runtime is active; compose must be called from within a runtime")]
    NoRuntime,

    /// The composer configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The signal source cannot watch this signal on this platform.
    #[error("signal {0} is not supported on this platform")]
    UnsupportedSignal(Signal),

    /// A signal name could not be parsed.
    #[error("unknown signal name: {0:?}")]
    UnknownSignal(String),

    /// Registering with the OS signal driver failed.
    #[error("failed to subscribe to {signal}: {source}")]
    Subscribe {
        /// The signal being registered.
        signal: Signal,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl SigctxError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if the error was raised by the signal layer.
    #[must_use]
    pub const fn is_signal_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSignal(_) | Self::UnknownSignal(_) | Self::Subscribe { .. }
        )
    }
}

/// Result type for sigctx operations.
pub type Result<T> = std::result::Result<T, SigctxError>;
