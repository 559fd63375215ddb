//! Background watcher for one composition.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

use crate::context::{Canceller, Cause, Context};
use crate::logging::Logger;
use crate::signals::{Signal, SignalSubscription};

/// Why a watcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// The parent context became done.
    ParentDone,
    /// The caller cancelled through the [`CancelHandle`](super::CancelHandle).
    Released {
        /// Cancel calls observed when the watcher stopped.
        cancel_calls: usize,
    },
    /// The terminate limit was reached.
    SignalLimit {
        /// The signal that hit the limit.
        signal: Signal,
        /// Signals received in total.
        count: usize,
    },
}

/// State shared by the cancel handle clones and the watcher.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    cancel_calls: AtomicUsize,
    released: Notify,
}

impl Shared {
    pub(crate) fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn record_cancel(&self) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.released.notify_one();
    }
}

pub(crate) struct Watcher {
    pub(crate) parent: Context,
    pub(crate) derived: Context,
    pub(crate) canceller: Canceller,
    pub(crate) shared: Arc<Shared>,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) terminate_limit: usize,
}

impl Watcher {
    /// Runs until an exit condition, then drops the subscription.
    pub(crate) async fn run(self, mut subscription: Box<dyn SignalSubscription>) -> WatchExit {
        let exit = self.watch(subscription.as_mut()).await;
        drop(subscription);
        debug!(?exit, "signal watcher exited");
        exit
    }

    async fn watch(&self, subscription: &mut dyn SignalSubscription) -> WatchExit {
        let mut received = 0usize;
        let mut source_open = true;

        loop {
            tokio::select! {
                biased;

                () = self.parent.done() => return WatchExit::ParentDone,

                () = self.shared.released.notified() => {
                    return WatchExit::Released {
                        cancel_calls: self.shared.cancel_calls(),
                    };
                }

                // Only reachable before the first signal; afterwards the
                // derived context stays done and the loop keeps counting.
                () = self.derived.done(), if received == 0 => {
                    return match self.shared.cancel_calls() {
                        0 => WatchExit::ParentDone,
                        cancel_calls => WatchExit::Released { cancel_calls },
                    };
                }

                next = subscription.recv(), if source_open => match next {
                    Some(signal) => {
                        received += 1;
                        if let Some(exit) = self.escalate(signal, received) {
                            return exit;
                        }
                    }
                    None => {
                        debug!("signal source closed, watching contexts only");
                        source_open = false;
                    }
                },
            }
        }
    }

    fn escalate(&self, signal: Signal, count: usize) -> Option<WatchExit> {
        self.canceller.cancel_with(Cause::Signal(signal));

        if count == 1 {
            self.logger
                .print(&format!("received {signal}, graceful shutdown"));
            None
        } else if count >= self.terminate_limit {
            self.logger.print(&format!(
                "received {signal}, signals {count} times, aborting"
            ));
            Some(WatchExit::SignalLimit { signal, count })
        } else {
            self.logger.print(&format!("received {signal}"));
            None
        }
    }
}
