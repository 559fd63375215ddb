//! Cancellation contexts.
//!
//! A [`Context`] is a node in a cancellation tree. Cancelling a node cancels
//! every live descendant; parents are never affected by their children.

mod token;

pub use token::{CancelCallback, Canceller, Cause, Context};
