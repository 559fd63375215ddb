//! Signal source backed by tokio's process signal driver.
//!
//! tokio never uninstalls its handler once a signal has been listened for.
//! On unix each signal also gets a fallback that runs the signal's default
//! action whenever no `OsSignalSource` subscription is watching it, so a
//! process whose watchers have all exited can still be interrupted or
//! terminated the usual way.

use async_trait::async_trait;
use tracing::debug;

use super::{dedup, Signal, SignalSource, SignalSubscription};
use crate::errors::Result;

/// Delivers real process signals.
///
/// Each subscription owns its own tokio listeners, so independent
/// compositions never steal signals from one another. Dropping the
/// subscription drops the listeners; once the last subscription for a signal
/// is gone, the signal's default action applies again (unix only).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignalSource;

impl OsSignalSource {
    /// Creates a new OS signal source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
mod imp {
    use parking_lot::{const_mutex, Mutex};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::signal::unix::{signal, SignalKind};

    use super::Signal;
    use crate::errors::{Result, SigctxError};

    pub(super) type Listener = tokio::signal::unix::Signal;

    /// Per-signal bookkeeping for restoring the default action.
    struct Slot {
        live: usize,
        /// Registered with signal-hook on first use; true means "no watcher,
        /// run the default action".
        unwatched: Option<Arc<AtomicBool>>,
    }

    const EMPTY: Slot = Slot {
        live: 0,
        unwatched: None,
    };

    static SLOTS: Mutex<[Slot; 6]> = const_mutex([EMPTY; 6]);

    const fn index(sig: Signal) -> usize {
        match sig {
            Signal::Interrupt => 0,
            Signal::Terminate => 1,
            Signal::Hangup => 2,
            Signal::Quit => 3,
            Signal::User1 => 4,
            Signal::User2 => 5,
        }
    }

    const fn signum(sig: Signal) -> i32 {
        use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2};
        match sig {
            Signal::Interrupt => SIGINT,
            Signal::Terminate => SIGTERM,
            Signal::Hangup => SIGHUP,
            Signal::Quit => SIGQUIT,
            Signal::User1 => SIGUSR1,
            Signal::User2 => SIGUSR2,
        }
    }

    fn kind(sig: Signal) -> SignalKind {
        match sig {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Terminate => SignalKind::terminate(),
            Signal::Hangup => SignalKind::hangup(),
            Signal::Quit => SignalKind::quit(),
            Signal::User1 => SignalKind::user_defined1(),
            Signal::User2 => SignalKind::user_defined2(),
        }
    }

    pub(super) fn listen(sig: Signal) -> Result<Listener> {
        let listener =
            signal(kind(sig)).map_err(|source| SigctxError::Subscribe { signal: sig, source })?;

        let mut slots = SLOTS.lock();
        let slot = &mut slots[index(sig)];
        if slot.unwatched.is_none() {
            let unwatched = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register_conditional_default(signum(sig), Arc::clone(&unwatched))
                .map_err(|source| SigctxError::Subscribe { signal: sig, source })?;
            slot.unwatched = Some(unwatched);
        }
        slot.live += 1;
        if let Some(unwatched) = &slot.unwatched {
            unwatched.store(false, Ordering::SeqCst);
        }
        Ok(listener)
    }

    pub(super) fn release(sig: Signal) {
        let mut slots = SLOTS.lock();
        let slot = &mut slots[index(sig)];
        slot.live = slot.live.saturating_sub(1);
        if slot.live == 0 {
            if let Some(unwatched) = &slot.unwatched {
                unwatched.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Returns whether the default action currently applies to `sig`.
    #[cfg(test)]
    pub(super) fn default_restored(sig: Signal) -> bool {
        SLOTS.lock()[index(sig)]
            .unwatched
            .as_ref()
            .is_some_and(|unwatched| unwatched.load(Ordering::SeqCst))
    }

    pub(super) async fn recv(listener: &mut Listener) -> Option<()> {
        listener.recv().await
    }
}

#[cfg(not(unix))]
mod imp {
    use tokio::signal::windows::{ctrl_c, CtrlC};

    use super::Signal;
    use crate::errors::{Result, SigctxError};

    pub(super) type Listener = CtrlC;

    pub(super) fn listen(sig: Signal) -> Result<Listener> {
        match sig {
            Signal::Interrupt => {
                ctrl_c().map_err(|source| SigctxError::Subscribe { signal: sig, source })
            }
            other => Err(SigctxError::UnsupportedSignal(other)),
        }
    }

    pub(super) fn release(_sig: Signal) {}

    pub(super) async fn recv(listener: &mut Listener) -> Option<()> {
        listener.recv().await
    }
}

impl SignalSource for OsSignalSource {
    fn subscribe(&self, signals: &[Signal]) -> Result<Box<dyn SignalSubscription>> {
        // Built up one listener at a time so a failure part way releases
        // whatever was already taken.
        let mut subscription = OsSubscription {
            listeners: Vec::with_capacity(signals.len()),
        };
        for sig in dedup(signals) {
            let listener = imp::listen(sig)?;
            subscription.listeners.push((sig, listener));
        }

        debug!(signals = ?signals, "installed OS signal subscription");
        Ok(Box::new(subscription))
    }
}

struct OsSubscription {
    listeners: Vec<(Signal, imp::Listener)>,
}

#[async_trait]
impl SignalSubscription for OsSubscription {
    async fn recv(&mut self) -> Option<Signal> {
        if self.listeners.is_empty() {
            return std::future::pending().await;
        }

        let pending = self.listeners.iter_mut().map(|(sig, listener)| {
            let sig = *sig;
            Box::pin(async move { imp::recv(listener).await.map(|()| sig) })
        });
        let (received, _, _) = futures::future::select_all(pending).await;
        received
    }
}

impl Drop for OsSubscription {
    fn drop(&mut self) {
        let signals: Vec<Signal> = self.listeners.drain(..).map(|(sig, _)| sig).collect();
        for sig in &signals {
            imp::release(*sig);
        }
        debug!(signals = ?signals, "released OS signal subscription");
    }
}
