//! Errors surfaced by the session layer and CLI.
//!
//! The protocol state machines never fail; everything here comes from the
//! I/O around them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The retransmission timer fired this many times in a row without the
    /// window advancing.
    #[error("peer unresponsive after {0} consecutive retransmissions")]
    PeerUnresponsive(u32),

    /// The background task is gone (panicked or was aborted).
    #[error("session task terminated unexpectedly")]
    TaskFailed,
}
