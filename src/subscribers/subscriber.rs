//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for observing an orchestrator's events:
//! log shipping, status pages, test recorders.
//!
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_event()
//!                                    └─► panic caught → EventKind::SubscriberPanicked
//! ```
//!
//! A slow subscriber only fills its own queue; once full, new events are
//! dropped for that subscriber and `SubscriberOverflow` is published.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use seqvisor::{Event, EventKind, Subscribe};
//!
//! struct ExitWatcher;
//!
//! #[async_trait]
//! impl Subscribe for ExitWatcher {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ProcessExited {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "exit-watcher" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of orchestrator events.
///
/// Runs on a dedicated worker with its own bounded queue; events arrive in
/// publish order. Handle errors internally and avoid blocking the executor.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue capacity for this subscriber; clamped to at least 1.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
