//! Error types
//!
//! Module-level errors live next to the code that raises them and are folded
//! into [`Error`] here. Transient conditions (a malformed upstream event, a
//! full listener queue) never surface as errors; they are logged and counted.

use crate::media::AssetError;
use crate::registry::RegistryError;
use crate::wire::EventError;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio asset could not be loaded
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Listener registry operation failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Wire event could not be decoded or encoded
    #[error(transparent)]
    Event(#[from] EventError),

    /// Upstream HTTP or SSE framing violation
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connection attempt did not complete in time
    #[error("connection timed out")]
    Timeout,
}

/// HTTP/SSE transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Source URL could not be parsed
    #[error("invalid source url: {0}")]
    InvalidUrl(String),

    /// Upstream response head was not valid HTTP/1.1
    #[error("malformed HTTP message: {0}")]
    MalformedMessage(String),

    /// Upstream response head exceeded the configured limit
    #[error("HTTP head larger than {0} bytes")]
    HeadTooLarge(usize),

    /// Upstream answered with a non-success status
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    /// Chunked transfer encoding was corrupt
    #[error("invalid chunked encoding: {0}")]
    InvalidChunk(String),
}
