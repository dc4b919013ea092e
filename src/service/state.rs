//! # Service lifecycle states.
//!
//! ```text
//! Created ──init──► Initialized ──start──► Started ──► Stopped
//!    │                  │   │                 │
//!    └──────stop────────┼───┼────► Stopped    └──► Failed
//!                       │   └──────────────────────► Failed
//!                       └─stop─► Stopped
//! ```
//!
//! ## Rules
//! - Transitions only move forward; `Stopped` and `Failed` are terminal.
//! - `Failed` is reachable from `Initialized` or `Started` only.
//! - Stopping a terminal unit is a no-op, never an error.

use std::fmt;

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Constructed, not yet configured.
    Created,
    /// Configured by `init`, waiting to be started.
    Initialized,
    /// Doing its work.
    Started,
    /// Finished successfully or stopped on request.
    Stopped,
    /// Finished with a failure cause.
    Failed,
}

impl ServiceState {
    /// `true` for `Stopped` and `Failed`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ServiceState::Stopped | ServiceState::Failed)
    }

    /// `true` while a unit may still be handed to a container.
    #[inline]
    pub fn is_pending(self) -> bool {
        matches!(self, ServiceState::Created | ServiceState::Initialized)
    }

    /// Whether the transition `self → to` is allowed.
    pub fn can_move_to(self, to: ServiceState) -> bool {
        use ServiceState::*;
        matches!(
            (self, to),
            (Created, Initialized)
                | (Created, Stopped)
                | (Initialized, Started)
                | (Initialized, Stopped)
                | (Initialized, Failed)
                | (Started, Stopped)
                | (Started, Failed)
        )
    }

    /// Short stable label (snake_case).
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Created => "created",
            ServiceState::Initialized => "initialized",
            ServiceState::Started => "started",
            ServiceState::Stopped => "stopped",
            ServiceState::Failed => "failed",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceState::*;

    #[test]
    fn transitions_are_monotonic() {
        assert!(Created.can_move_to(Initialized));
        assert!(Initialized.can_move_to(Started));
        assert!(Started.can_move_to(Stopped));
        assert!(!Started.can_move_to(Initialized));
        assert!(!Stopped.can_move_to(Started));
    }

    #[test]
    fn failed_is_terminal_and_not_reachable_from_created() {
        assert!(!Created.can_move_to(Failed));
        assert!(Initialized.can_move_to(Failed));
        assert!(Failed.is_terminal());
        assert!(!Failed.can_move_to(Stopped));
        assert!(!Stopped.can_move_to(Failed));
    }
}
