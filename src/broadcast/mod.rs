//! Producer side: the looping broadcaster
//!
//! [`LoopBroadcaster`] turns a finite [`AudioAsset`](crate::media::AudioAsset)
//! into an endless, paced chunk sequence published into the producer's
//! [`StreamHub`](crate::hub::StreamHub).

pub mod config;
pub mod looper;

pub use config::BroadcasterConfig;
pub use looper::{LoopBroadcaster, LoopMonitor, LoopStatus};
