//! Console Reporter.
//!
//! Outbound `(severity, message)` notifications. Delivery is best-effort:
//! [`BestEffort`] logs and swallows every delivery failure, so a broken
//! console never aborts a motion operation.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use thiserror::Error;
use tracing::{error, info, warn};
use trak_common::console::{ConsoleMessage, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("Console queue full")]
    QueueFull,

    #[error("Console receiver disconnected")]
    Disconnected,
}

/// Delivery channel to the operator console.
pub trait ConsoleReporter: Send {
    fn send(&self, message: &ConsoleMessage) -> Result<(), ConsoleError>;
}

/// Bounded in-process queue; the receiving side belongs to the
/// notification layer.
#[derive(Debug, Clone)]
pub struct ChannelConsole {
    tx: SyncSender<ConsoleMessage>,
}

impl ChannelConsole {
    pub fn bounded(capacity: usize) -> (Self, Receiver<ConsoleMessage>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self { tx }, rx)
    }
}

impl ConsoleReporter for ChannelConsole {
    fn send(&self, message: &ConsoleMessage) -> Result<(), ConsoleError> {
        self.tx.try_send(message.clone()).map_err(|e| match e {
            TrySendError::Full(_) => ConsoleError::QueueFull,
            TrySendError::Disconnected(_) => ConsoleError::Disconnected,
        })
    }
}

/// Writes console messages to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogConsole;

impl ConsoleReporter for LogConsole {
    fn send(&self, message: &ConsoleMessage) -> Result<(), ConsoleError> {
        match message.severity {
            Severity::Error => error!(console = true, "{}", message.message),
            Severity::Warning => warn!(console = true, "{}", message.message),
            Severity::Info | Severity::Success => {
                info!(console = true, severity = %message.severity, "{}", message.message)
            }
        }
        Ok(())
    }
}

/// Fire-and-forget wrapper around a reporter.
pub struct BestEffort {
    inner: Box<dyn ConsoleReporter>,
}

impl std::fmt::Debug for BestEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestEffort").finish_non_exhaustive()
    }
}

impl BestEffort {
    pub fn new<C: ConsoleReporter + 'static>(inner: C) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    /// Send a message; failures are logged and dropped.
    pub fn notify(&self, severity: Severity, message: impl Into<String>) {
        let message = ConsoleMessage::new(severity, message);
        if let Err(e) = self.inner.send(&message) {
            warn!(%e, severity = %message.severity, "Console delivery failed: {}", message.message);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Severity::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Severity::Error, message);
    }
}

impl Default for BestEffort {
    fn default() -> Self {
        Self::new(LogConsole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delivers_in_order() {
        let (console, rx) = ChannelConsole::bounded(4);
        let reporter = BestEffort::new(console);
        reporter.info("homing");
        reporter.success("homed");

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                ConsoleMessage::new(Severity::Info, "homing"),
                ConsoleMessage::new(Severity::Success, "homed"),
            ]
        );
    }

    #[test]
    fn test_full_queue_is_swallowed() {
        let (console, rx) = ChannelConsole::bounded(1);
        assert_eq!(
            console.send(&ConsoleMessage::new(Severity::Info, "a")),
            Ok(())
        );
        assert_eq!(
            console.send(&ConsoleMessage::new(Severity::Info, "b")),
            Err(ConsoleError::QueueFull)
        );

        let reporter = BestEffort::new(console);
        reporter.error("dropped without panic");
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_disconnected_is_swallowed() {
        let (console, rx) = ChannelConsole::bounded(1);
        drop(rx);
        let reporter = BestEffort::new(console);
        reporter.warning("nobody listening");
    }
}
