//! Shutdown narration.
//!
//! The composer reports signal receipt through a [`Logger`]. The default
//! [`TracingLogger`] forwards each line to `tracing`; tests use
//! [`CollectingLogger`] to look at what was said.

use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn, Level};

/// Receives human-readable shutdown narration.
#[cfg_attr(test, mockall::automock)]
pub trait Logger: Send + Sync {
    /// Prints one formatted message.
    fn print(&self, message: &str);
}

/// A logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn print(&self, _message: &str) {
        // Intentionally empty - discards all messages
    }
}

/// A logger that emits each message as a `tracing` event.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    /// The log level to use.
    level: Level,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl TracingLogger {
    /// Creates a new tracing logger with the specified level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Returns the level messages are emitted at.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }
}

impl Logger for TracingLogger {
    fn print(&self, message: &str) {
        match self.level {
            Level::TRACE => trace!(target: "sigctx", "{}", message),
            Level::DEBUG => debug!(target: "sigctx", "{}", message),
            Level::WARN => warn!(target: "sigctx", "{}", message),
            Level::ERROR => error!(target: "sigctx", "{}", message),
            _ => info!(target: "sigctx", "{}", message),
        }
    }
}

/// A collecting logger for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingLogger {
    lines: RwLock<Vec<String>>,
}

impl CollectingLogger {
    /// Creates a new collecting logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().clone()
    }

    /// Returns the number of collected lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }

    /// Returns how many lines end with `suffix`.
    #[must_use]
    pub fn count_ending_with(&self, suffix: &str) -> usize {
        self.lines
            .read()
            .iter()
            .filter(|line| line.ends_with(suffix))
            .count()
    }

    /// Clears all collected lines.
    pub fn clear(&self) {
        self.lines.write().clear();
    }
}

impl Logger for CollectingLogger {
    fn print(&self, message: &str) {
        self.lines.write().push(message.to_string());
    }
}

/// Installs a global `tracing` subscriber that honours `RUST_LOG`.
///
/// Defaults to `info` when `RUST_LOG` is unset. Does nothing if a global
/// subscriber is already installed.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
