//! # Event subscribers.
//!
//! ```text
//! units ── publish(Event) ──► Bus ──► Orchestrator listener ──► SubscriberSet::emit
//!                                                               ├──► [queue] ──► LogWriter
//!                                                               └──► [queue] ──► custom
//! ```
//!
//! - [`Subscribe`] trait for custom observers
//! - [`SubscriberSet`] non-blocking fan-out with per-subscriber queues
//! - [`LogWriter`] forwards events to `tracing` (feature `logging`)

#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
