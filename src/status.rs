//! Status reporting boundary
//!
//! The controller reports human-readable status lines and state changes
//! through a [`StatusSink`]. The binary renders them on the terminal.

use std::io::Write;

use crate::controller::State;

/// Receives controller status updates
///
/// Called from the controller task; implementations must not block.
pub trait StatusSink: Send + Sync {
    /// A status line for display, e.g. "Listening..."
    fn status_changed(&self, status: &str);

    /// The controller entered `state`
    fn state_changed(&self, _state: State) {}
}

/// Prints status lines to stdout
#[derive(Debug, Default)]
pub struct ConsoleStatus;

impl StatusSink for ConsoleStatus {
    fn status_changed(&self, status: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "● {status}");
        let _ = out.flush();
    }

    fn state_changed(&self, state: State) {
        tracing::debug!(%state, "state changed");
    }
}

