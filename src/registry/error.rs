//! Registry error types
//!
//! Raised at the administrative boundary only. Delivery itself never fails:
//! full queues drop their oldest record and detached listeners discard.

use super::listener::ListenerId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No listener with this id is attached
    #[error("listener not found: {0}")]
    ListenerNotFound(ListenerId),

    /// Requested delay was not an integer number of milliseconds
    #[error("invalid delay {0:?}: expected milliseconds as an integer")]
    InvalidDelay(String),
}
