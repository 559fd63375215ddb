//! # sigctx
//!
//! Cancellation contexts that are also cancelled by process signals.
//!
//! sigctx derives a child [`Context`](context::Context) from a parent and
//! links three cancellation sources into it:
//!
//! - **Parent cancellation**: the child is done as soon as the parent is
//! - **Explicit cancel**: the returned [`CancelHandle`](composer::CancelHandle)
//! - **Signals**: the first watched signal asks for a graceful shutdown;
//!   repeated signals are counted and, at the terminate limit, the watcher
//!   logs an abort line and stops watching
//!
//! Work that already honours a context picks up cooperative shutdown without
//! any signal handling of its own.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sigctx::prelude::*;
//!
//! # async fn serve(_ctx: &Context) {}
//! #[tokio::main]
//! async fn main() -> sigctx::errors::Result<()> {
//!     sigctx::logging::init_tracing();
//!
//!     let (ctx, cancel) = with_cancel(&Context::background(), &Signal::shutdown_set())?;
//!     tokio::select! {
//!         () = serve(&ctx) => {}
//!         () = ctx.done() => {}
//!     }
//!     cancel.cancel();
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod composer;
pub mod config;
pub mod context;
pub mod errors;
pub mod logging;
pub mod signals;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::composer::{with_cancel, CancelHandle, Composer, WatchExit};
    pub use crate::config::{ComposerConfig, DEFAULT_TERMINATE_LIMIT};
    pub use crate::context::{Canceller, Cause, Context};
    pub use crate::errors::SigctxError;
    pub use crate::logging::{CollectingLogger, Logger, NoOpLogger, TracingLogger};
    pub use crate::signals::{OsSignalSource, Signal, SignalSource, SignalSubscription};
}
