//! In-process signal source.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use crate::errors::{Result, SigctxError};
use crate::signals::{dedup, Signal, SignalSource, SignalSubscription};

#[derive(Default)]
struct State {
    next_id: u64,
    created: usize,
    subscribers: HashMap<u64, Subscriber>,
    unsupported: HashSet<Signal>,
}

struct Subscriber {
    signals: Vec<Signal>,
    /// `None` once the source has been closed.
    tx: Option<mpsc::UnboundedSender<Signal>>,
}

/// A signal source driven by the test instead of the OS.
///
/// Every [`raise`](Self::raise) is delivered to each live subscription that
/// watches the signal; nothing is coalesced, so tests can count exactly.
/// Dropped subscriptions stop receiving and disappear from
/// [`active_subscriptions`](Self::active_subscriptions).
#[derive(Clone, Default)]
pub struct ManualSignalSource {
    state: Arc<Mutex<State>>,
}

impl ManualSignalSource {
    /// Creates a new manual signal source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `subscribe` reject `signal` as unsupported.
    #[must_use]
    pub fn with_unsupported(self, signal: Signal) -> Self {
        self.state.lock().unsupported.insert(signal);
        self
    }

    /// Delivers `signal` to every live subscription watching it.
    ///
    /// Returns how many subscriptions it was delivered to.
    pub fn raise(&self, signal: Signal) -> usize {
        let state = self.state.lock();
        state
            .subscribers
            .values()
            .filter(|sub| sub.signals.contains(&signal))
            .filter_map(|sub| sub.tx.as_ref())
            .filter(|tx| tx.send(signal).is_ok())
            .count()
    }

    /// Closes every live subscription; their `recv` returns `None`.
    pub fn close(&self) {
        for sub in self.state.lock().subscribers.values_mut() {
            sub.tx = None;
        }
    }

    /// Returns the number of subscriptions that have not been dropped.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Returns the number of subscriptions ever created.
    #[must_use]
    pub fn total_subscriptions(&self) -> usize {
        self.state.lock().created
    }
}

impl std::fmt::Debug for ManualSignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualSignalSource")
            .field("active", &state.subscribers.len())
            .field("created", &state.created)
            .finish()
    }
}

impl SignalSource for ManualSignalSource {
    fn subscribe(&self, signals: &[Signal]) -> Result<Box<dyn SignalSubscription>> {
        let mut state = self.state.lock();
        if let Some(signal) = signals.iter().find(|s| state.unsupported.contains(*s)) {
            return Err(SigctxError::UnsupportedSignal(*signal));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = state.next_id;
        state.next_id += 1;
        state.created += 1;
        state.subscribers.insert(
            id,
            Subscriber {
                signals: dedup(signals),
                tx: Some(tx),
            },
        );

        Ok(Box::new(ManualSubscription {
            id,
            rx,
            state: Arc::downgrade(&self.state),
        }))
    }
}

struct ManualSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Signal>,
    state: Weak<Mutex<State>>,
}

#[async_trait]
impl SignalSubscription for ManualSubscription {
    async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }
}

impl Drop for ManualSubscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().subscribers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_raise_reaches_matching_subscriptions() {
        let source = ManualSignalSource::new();
        let mut int_sub = source.subscribe(&[Signal::Interrupt]).unwrap();
        let _term_sub = source.subscribe(&[Signal::Terminate]).unwrap();

        assert_eq!(source.raise(Signal::Interrupt), 1);
        assert_eq!(int_sub.recv().await, Some(Signal::Interrupt));
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let source = ManualSignalSource::new();
        let sub = source.subscribe(&Signal::shutdown_set()).unwrap();
        assert_eq!(source.active_subscriptions(), 1);

        drop(sub);
        assert_eq!(source.active_subscriptions(), 0);
        assert_eq!(source.total_subscriptions(), 1);
        assert_eq!(source.raise(Signal::Interrupt), 0);
    }

    #[tokio::test]
    async fn test_close_ends_recv() {
        let source = ManualSignalSource::new();
        let mut sub = source.subscribe(&[Signal::Hangup]).unwrap();

        source.close();
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_unsupported_signal_rejected() {
        let source = ManualSignalSource::new().with_unsupported(Signal::Quit);
        let err = source.subscribe(&[Signal::Interrupt, Signal::Quit]).err().unwrap();
        assert!(matches!(err, SigctxError::UnsupportedSignal(Signal::Quit)));
        assert_eq!(source.active_subscriptions(), 0);
    }
}
