//! Chunk history and delay resolution
//!
//! [`HistoryBuffer`] keeps a fixed number of recent chunks indexed by the
//! time they arrived. [`resolve`] picks the chunk a listener with a given
//! delay should hear now.

pub mod buffer;
pub mod resolver;

pub use buffer::{BufferStats, HistoryBuffer, HistoryEntry};
pub use resolver::resolve;
