//! Error types and handling for Crashpot

use thiserror::Error;

/// Result type alias for Crashpot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crashpot error types
#[derive(Debug, Error)]
pub enum Error {
    /// The peer closed the connection, cleanly or abruptly.
    #[error("peer disconnected")]
    PeerGone,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame that cannot be interpreted: unknown tag or non-zero padding.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Admission refused, the player table is at capacity.
    #[error("player table full")]
    Full,

    #[error("configuration error: {0}")]
    Config(String),

    /// Unrecoverable startup failure (bind/listen). The process terminates.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Error {
    /// Classify a transport error: EOF and reset-class failures mean the
    /// peer is gone, anything else is a real IO fault.
    pub(crate) fn from_transport(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => Error::PeerGone,
            _ => Error::Io(err),
        }
    }
}
