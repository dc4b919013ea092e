//! # Runtime events emitted by units, containers and the orchestrator.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: unit state transitions (inited, started, stopped, failed)
//! - **Process events**: OS process activity (spawned, output, exited, killed)
//! - **Sequencing events**: container activity (step queued, step starting)
//! - **Runtime events**: shutdown and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, service name,
//! reasons, exit codes and child indexes.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use seqvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ProcessExited)
//!     .with_service("master")
//!     .with_exit_code(137);
//!
//! assert_eq!(ev.kind, EventKind::ProcessExited);
//! assert_eq!(ev.service.as_deref(), Some("master"));
//! assert_eq!(ev.exit_code, Some(137));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::service::ServiceState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `service`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `service`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Runtime events ===
    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    // === Lifecycle events ===
    /// Unit moved Created → Initialized.
    ///
    /// Sets:
    /// - `service`: unit name
    /// - `state`: new state
    ServiceInited,

    /// Unit moved Initialized → Started.
    ///
    /// Sets:
    /// - `service`: unit name
    /// - `state`: new state
    ServiceStarted,

    /// Unit stopped (finished successfully **or** was stopped on request).
    ///
    /// Sets:
    /// - `service`: unit name
    /// - `state`: new state
    ServiceStopped,

    /// Unit failed.
    ///
    /// Sets:
    /// - `service`: unit name
    /// - `state`: new state
    /// - `reason`: failure message
    /// - `exit_code`: when the cause is exit-code-bearing
    ServiceFailed,

    // === Process events ===
    /// OS process created.
    ///
    /// Sets:
    /// - `service`: step name
    /// - `pid`: OS process id (when available)
    /// - `reason`: space-joined command line
    ProcessSpawned,

    /// One line of process output.
    ///
    /// Sets:
    /// - `service`: step name
    /// - `reason`: the output line
    ProcessOutput,

    /// OS process terminated.
    ///
    /// Sets:
    /// - `service`: step name
    /// - `exit_code`: resolved exit code
    ProcessExited,

    /// OS process was killed because its step was stopped.
    ///
    /// Sets:
    /// - `service`: step name
    /// - `pid`: OS process id (when available)
    ProcessKilled,

    // === Sequencing events ===
    /// Child appended to a container.
    ///
    /// Sets:
    /// - `service`: container name
    /// - `reason`: child name
    /// - `index`: child position
    StepQueued,

    /// Container is about to start one of its children.
    ///
    /// Sets:
    /// - `service`: container name
    /// - `reason`: child name
    /// - `index`: child position
    StepStarting,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the unit (or subscriber) the event is about.
    pub service: Option<Arc<str>>,
    /// Human-readable reason (errors, child names, output lines).
    pub reason: Option<Arc<str>>,
    /// Lifecycle state after the transition.
    pub state: Option<ServiceState>,
    /// Process exit code.
    pub exit_code: Option<i32>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Child position inside a container.
    pub index: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            reason: None,
            state: None,
            exit_code: None,
            pid: None,
            index: None,
        }
    }

    /// Attaches a unit name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the state reached.
    #[inline]
    pub fn with_state(mut self, state: ServiceState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches an OS process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a child index.
    #[inline]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
