//! Error types for the session engine.

use std::io;

/// Errors surfaced by the session engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The wire has been closed (or was never opened).
    #[error("transport is not connected")]
    NotConnected,

    /// TCP connection to the server failed.
    #[error("connect to {addr} failed: {source}")]
    Connect { addr: String, source: io::Error },

    /// TLS handshake with the server failed.
    #[error("TLS handshake with {addr} failed: {source}")]
    Handshake { addr: String, source: io::Error },

    /// The host is not a valid TLS server name.
    #[error("invalid TLS server name {0:?}")]
    ServerName(String),

    /// A local input line matched no command predicate. Recoverable: the
    /// input loop reports it and keeps running.
    #[error("unrecognized command: {0:?}")]
    UnrecognizedCommand(String),

    /// A reaction was added for an event key that was never registered.
    #[error("event key {0:?} is not registered")]
    UnknownEventKey(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
