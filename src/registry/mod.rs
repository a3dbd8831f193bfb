//! Listener registry and fan-out
//!
//! Each attached listener owns a bounded drop-oldest queue. The hub pushes
//! delivery records into those queues; the transport drains them.
//!
//! # Architecture
//!
//! ```text
//!                        ListenerRegistry
//!                 ┌──────────────────────────────┐
//!                 │ listeners: HashMap<Id,       │
//!                 │   Listener {                 │
//!                 │     delay_ms: AtomicU32,     │
//!                 │     queue: DeliveryQueue,    │
//!                 │   }                          │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │ snapshot()
//!         ┌──────────────────────┼──────────────────────┐
//!         ▼                      ▼                      ▼
//!   [delay == 0]           [delay > 0]            [delay > 0]
//!   on every chunk         every tick:            every tick:
//!   deliver(newest)        resolve(delay)         resolve(delay)
//!         │                      │                      │
//!         ▼                      ▼                      ▼
//!   Subscription::recv()  Subscription::recv()  Subscription::recv()
//! ```
//!
//! # Zero-Copy Design
//!
//! Records carry the chunk's `Bytes` payload, which is reference counted:
//! every listener shares the allocation made when the chunk was produced.

pub mod config;
pub mod error;
pub mod listener;
pub mod queue;
pub mod record;
pub mod store;

pub use config::{RegistryConfig, MAX_DELAY_MS};
pub use error::RegistryError;
pub use listener::{Listener, ListenerId, Subscription};
pub use queue::{DeliveryQueue, PushOutcome};
pub use record::DeliveryRecord;
pub use store::ListenerRegistry;

/// Parse a delay received at the administrative boundary
///
/// Accepts an optionally signed integer; range clamping happens on attach or
/// set_delay. Anything else is rejected.
pub fn parse_delay_ms(raw: &str) -> Result<i64, RegistryError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| RegistryError::InvalidDelay(raw.to_string()))
}
