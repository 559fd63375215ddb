//! Signal identifiers and the signal source capability.
//!
//! The composer never talks to the OS directly. It asks a [`SignalSource`]
//! for a [`SignalSubscription`] and drops that subscription when it is done
//! with it, which is the only teardown a source needs to honour.

mod os;

pub use os::OsSignalSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, SigctxError};

/// An asynchronous interrupt signal the composer can watch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// `SIGINT`, usually Ctrl-C.
    Interrupt,
    /// `SIGTERM`, the default `kill` signal.
    Terminate,
    /// `SIGHUP`.
    Hangup,
    /// `SIGQUIT`.
    Quit,
    /// `SIGUSR1`.
    User1,
    /// `SIGUSR2`.
    User2,
}

impl Signal {
    /// All signals known to sigctx.
    pub const ALL: [Self; 6] = [
        Self::Interrupt,
        Self::Terminate,
        Self::Hangup,
        Self::Quit,
        Self::User1,
        Self::User2,
    ];

    /// The usual shutdown pair, interrupt and terminate.
    #[must_use]
    pub const fn shutdown_set() -> [Self; 2] {
        [Self::Interrupt, Self::Terminate]
    }

    /// Returns the conventional `SIG*` name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
            Self::Quit => "SIGQUIT",
            Self::User1 => "SIGUSR1",
            Self::User2 => "SIGUSR2",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminated",
            Self::Hangup => "hangup",
            Self::Quit => "quit",
            Self::User1 => "user defined signal 1",
            Self::User2 => "user defined signal 2",
        };
        f.write_str(description)
    }
}

impl FromStr for Signal {
    type Err = SigctxError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
        match bare {
            "INT" | "INTERRUPT" => Ok(Self::Interrupt),
            "TERM" | "TERMINATE" | "TERMINATED" => Ok(Self::Terminate),
            "HUP" | "HANGUP" => Ok(Self::Hangup),
            "QUIT" => Ok(Self::Quit),
            "USR1" | "USER1" => Ok(Self::User1),
            "USR2" | "USER2" => Ok(Self::User2),
            _ => Err(SigctxError::UnknownSignal(s.to_string())),
        }
    }
}

/// A live registration for a set of signals.
///
/// Dropping the subscription unsubscribes it.
#[async_trait]
pub trait SignalSubscription: Send {
    /// Waits for the next watched signal.
    ///
    /// Returns `None` once the source can no longer deliver anything. An
    /// empty subscription never resolves.
    async fn recv(&mut self) -> Option<Signal>;
}

/// Something that can deliver process signals.
pub trait SignalSource: Send + Sync {
    /// Subscribes to `signals`.
    ///
    /// Must be called from within a tokio runtime. Duplicate entries are
    /// treated as one.
    fn subscribe(&self, signals: &[Signal]) -> Result<Box<dyn SignalSubscription>>;
}

/// Removes duplicates while keeping the caller's order.
pub(crate) fn dedup(signals: &[Signal]) -> Vec<Signal> {
    let mut unique = Vec::with_capacity(signals.len());
    for signal in signals {
        if !unique.contains(signal) {
            unique.push(*signal);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_conventional_descriptions() {
        assert_eq!(Signal::Interrupt.to_string(), "interrupt");
        assert_eq!(Signal::Terminate.to_string(), "terminated");
        assert_eq!(Signal::User2.to_string(), "user defined signal 2");
        assert_eq!(Signal::Hangup.name(), "SIGHUP");
    }

    #[test]
    fn test_parse_spellings() {
        assert_eq!("SIGINT".parse::<Signal>().unwrap(), Signal::Interrupt);
        assert_eq!("int".parse::<Signal>().unwrap(), Signal::Interrupt);
        assert_eq!(" sigterm ".parse::<Signal>().unwrap(), Signal::Terminate);
        assert_eq!("usr1".parse::<Signal>().unwrap(), Signal::User1);
        for signal in Signal::ALL {
            assert_eq!(signal.name().parse::<Signal>().unwrap(), signal);
        }
    }

    #[test]
    fn test_parse_unknown() {
        let err = "SIGKILL".parse::<Signal>().unwrap_err();
        assert!(matches!(err, SigctxError::UnknownSignal(ref name) if name == "SIGKILL"));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Signal::Terminate).unwrap();
        assert_eq!(json, "\"terminate\"");
        let back: Signal = serde_json::from_str("\"user1\"").unwrap();
        assert_eq!(back, Signal::User1);
    }

    #[test]
    fn test_dedup_keeps_order() {
        let signals = [Signal::Terminate, Signal::Interrupt, Signal::Terminate];
        assert_eq!(dedup(&signals), vec![Signal::Terminate, Signal::Interrupt]);
    }
}
