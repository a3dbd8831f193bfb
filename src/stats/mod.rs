//! Delivery and link statistics

pub mod metrics;

pub use metrics::{LinkCounters, LinkStats, ListenerStats};
