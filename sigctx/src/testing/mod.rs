//! Testing utilities for code built on sigctx.
//!
//! This module provides:
//! - A manual signal source for injecting fake signals
//! - Subscription accounting for leak checks

mod signals;

pub use signals::ManualSignalSource;
