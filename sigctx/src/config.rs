//! Composer configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SigctxError};

/// Default number of received signals after which the watcher gives up.
pub const DEFAULT_TERMINATE_LIMIT: usize = 1024;

/// Configuration for a [`Composer`](crate::composer::Composer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Signal count at which the watcher stops treating signals as requests
    /// for cooperative shutdown, logs an abort line and exits.
    #[serde(default = "default_terminate_limit")]
    pub terminate_limit: usize,
}

const fn default_terminate_limit() -> usize {
    DEFAULT_TERMINATE_LIMIT
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            terminate_limit: default_terminate_limit(),
        }
    }
}

impl ComposerConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the terminate limit.
    #[must_use]
    pub const fn with_terminate_limit(mut self, limit: usize) -> Self {
        self.terminate_limit = limit;
        self
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.terminate_limit == 0 {
            return Err(SigctxError::invalid_config(
                "terminate_limit must be at least 1",
            ));
        }
        Ok(())
    }
}
