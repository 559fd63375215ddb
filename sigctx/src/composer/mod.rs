//! Signal-aware context composition.
//!
//! [`Composer::compose`] derives a child of a parent [`Context`] that is
//! cancelled by whichever comes first:
//! - the parent becoming done
//! - the returned [`CancelHandle`] being invoked
//! - the process receiving one of the watched signals
//!
//! A background task per composition links these together. After the first
//! signal it keeps counting: the first one asks for a graceful shutdown,
//! later ones are acknowledged, and once the terminate limit is reached the
//! watcher logs an abort line and stops. The watcher never kills the process
//! itself. With [`OsSignalSource`], once no watcher is left for a signal its
//! default action applies again, so a further signal ends the process as
//! usual.

mod watcher;

pub use watcher::WatchExit;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ComposerConfig;
use crate::context::{Canceller, Context};
use crate::errors::{Result, SigctxError};
use crate::logging::{Logger, TracingLogger};
use crate::signals::{OsSignalSource, Signal, SignalSource};
use watcher::{Shared, Watcher};

/// Builds signal-aware child contexts.
///
/// Holds the collaborators every composition uses: configuration, the
/// narration logger and the signal source.
#[derive(Clone)]
pub struct Composer {
    config: ComposerConfig,
    logger: Arc<dyn Logger>,
    source: Arc<dyn SignalSource>,
}

impl Default for Composer {
    fn default() -> Self {
        Self {
            config: ComposerConfig::default(),
            logger: Arc::new(TracingLogger::default()),
            source: Arc::new(OsSignalSource::new()),
        }
    }
}

impl Composer {
    /// Creates a composer with the default logger, OS signals and config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ComposerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the terminate limit.
    #[must_use]
    pub fn with_terminate_limit(mut self, limit: usize) -> Self {
        self.config = self.config.with_terminate_limit(limit);
        self
    }

    /// Sets the narration logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Sets the signal source.
    #[must_use]
    pub fn with_signal_source(mut self, source: Arc<dyn SignalSource>) -> Self {
        self.source = source;
        self
    }

    /// Derives a child of `parent` that is also cancelled by `signals`.
    ///
    /// Returns immediately. The signal subscription is installed before this
    /// returns and is released when the watcher exits. An empty `signals`
    /// slice is allowed; only the parent and the handle can then cancel.
    ///
    /// Fails if no tokio runtime is active, the configuration is invalid, or
    /// the signal source rejects the subscription. Nothing is left behind on
    /// failure.
    pub fn compose(&self, parent: &Context, signals: &[Signal]) -> Result<(Context, CancelHandle)> {
        self.config.validate()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SigctxError::NoRuntime)?;
        let subscription = self.source.subscribe(signals)?;

        let (derived, canceller) = parent.child();
        let shared = Arc::new(Shared::default());

        let watcher = Watcher {
            parent: parent.clone(),
            derived: derived.clone(),
            canceller: canceller.clone(),
            shared: Arc::clone(&shared),
            logger: Arc::clone(&self.logger),
            terminate_limit: self.config.terminate_limit,
        };

        debug!(
            ?signals,
            terminate_limit = self.config.terminate_limit,
            "composed signal-aware context"
        );
        let task = runtime.spawn(watcher.run(subscription));

        Ok((
            derived,
            CancelHandle {
                canceller,
                shared,
                task: Arc::new(Mutex::new(Some(task))),
            },
        ))
    }
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Cancels a composed context and releases its watcher.
///
/// Clones share state. Calling [`cancel`](Self::cancel) any number of times
/// from any number of threads is fine.
#[derive(Clone)]
pub struct CancelHandle {
    canceller: Canceller,
    shared: Arc<Shared>,
    task: Arc<Mutex<Option<JoinHandle<WatchExit>>>>,
}

impl CancelHandle {
    /// Cancels the derived context and stops its watcher.
    pub fn cancel(&self) {
        self.shared.record_cancel();
        self.canceller.cancel();
        self.shared.release();
    }

    /// Returns how many times `cancel` has been called across all clones.
    #[must_use]
    pub fn cancel_calls(&self) -> usize {
        self.shared.cancel_calls()
    }

    /// Returns whether the watcher is still running.
    ///
    /// Returns false once [`join`](Self::join) has taken the watcher.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Waits for the watcher to exit and returns why it did.
    ///
    /// Only the first call across all clones gets the exit reason; later
    /// calls return `None`. A watcher that panicked or was aborted is logged
    /// and also yields `None`.
    pub async fn join(&self) -> Option<WatchExit> {
        let task = self.task.lock().take()?;
        match task.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                warn!("Signal watcher did not finish: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancel_calls", &self.cancel_calls())
            .field("watching", &self.is_watching())
            .finish()
    }
}

/// Derives a child of `parent` that is also cancelled by `signals`, using
/// [`Composer::default`].
pub fn with_cancel(parent: &Context, signals: &[Signal]) -> Result<(Context, CancelHandle)> {
    Composer::default().compose(parent, signals)
}
