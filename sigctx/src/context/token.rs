//! Context tree node and its canceller.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::signals::Signal;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn FnOnce() + Send>;

/// Why a context was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cause {
    /// Cancelled explicitly, or by an ancestor that was.
    #[error("context canceled")]
    Cancelled,
    /// Cancelled because the process received a watched signal.
    #[error("received {0}")]
    Signal(Signal),
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    /// Fast path for `is_done`; `cause` is the source of truth.
    cancelled: AtomicBool,
    /// The first cause wins.
    cause: RwLock<Option<Cause>>,
    done_tx: watch::Sender<bool>,
    parent: Option<Weak<Inner>>,
    children: Mutex<HashMap<u64, Weak<Inner>>>,
    callbacks: Mutex<Vec<CancelCallback>>,
}

impl Inner {
    fn new(parent: Option<Weak<Self>>) -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            cancelled: AtomicBool::new(false),
            cause: RwLock::new(None),
            done_tx,
            parent,
            children: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    fn cause(&self) -> Option<Cause> {
        *self.cause.read()
    }

    fn cancel(&self, cause: Cause) -> bool {
        {
            let mut slot = self.cause.write();
            if slot.is_some() {
                return false;
            }
            *slot = Some(cause);
        }
        self.cancelled.store(true, Ordering::SeqCst);
        self.done_tx.send_replace(true);

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.into_values().filter_map(|weak| weak.upgrade()) {
            child.cancel(cause);
        }

        self.detach();

        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            run_callback(callback);
        }
        true
    }

    fn detach(&self) {
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.children.lock().remove(&self.id);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.detach();
    }
}

fn run_callback(callback: CancelCallback) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

/// A cancellation context.
///
/// Cheap to clone; clones observe the same state. A context can only be
/// cancelled through the [`Canceller`] returned alongside it, or by its
/// parent.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Returns a root context that is never cancelled.
    #[must_use]
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner::new(None)),
        }
    }

    /// Derives a child context.
    ///
    /// The child is done when `self` is done or when the returned canceller
    /// fires. If `self` is already done, the child starts out done with the
    /// same cause.
    #[must_use]
    pub fn child(&self) -> (Self, Canceller) {
        let child = Arc::new(Inner::new(Some(Arc::downgrade(&self.inner))));

        let inherited = {
            let mut children = self.inner.children.lock();
            let cause = self.inner.cause();
            if cause.is_none() {
                children.insert(child.id, Arc::downgrade(&child));
            }
            cause
        };
        if let Some(cause) = inherited {
            child.cancel(cause);
        }

        let canceller = Canceller {
            inner: Arc::clone(&child),
        };
        (Self { inner: child }, canceller)
    }

    /// Waits until the context is done. Returns immediately if it already is.
    pub async fn done(&self) {
        let mut rx = self.inner.done_tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Returns whether the context is done.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns why the context was cancelled, if it was.
    #[must_use]
    pub fn cause(&self) -> Option<Cause> {
        self.inner.cause()
    }

    /// Registers a callback to be invoked once on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately. Panics in
    /// callbacks are logged and suppressed.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callbacks = self.inner.callbacks.lock();
        if self.is_done() {
            drop(callbacks);
            run_callback(Box::new(callback));
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    /// Returns the number of live children registered on this context.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("done", &self.is_done())
            .field("cause", &self.cause())
            .finish()
    }
}

/// Cancels the context it was created with.
#[derive(Clone)]
pub struct Canceller {
    inner: Arc<Inner>,
}

impl Canceller {
    /// Cancels the context. Idempotent.
    pub fn cancel(&self) {
        self.cancel_with(Cause::Cancelled);
    }

    /// Cancels with a specific cause. Returns false if the context was
    /// already cancelled, in which case the original cause is kept.
    pub fn cancel_with(&self, cause: Cause) -> bool {
        self.inner.cancel(cause)
    }
}

impl std::fmt::Debug for Canceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canceller")
            .field("id", &self.inner.id)
            .field("cancelled", &self.inner.cancelled.load(Ordering::SeqCst))
            .finish()
    }
}
