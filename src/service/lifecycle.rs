//! # Lifecycle: the state machine embedded in every unit.
//!
//! [`Lifecycle`] owns a unit's name, state and failure cause. Steps and
//! containers embed one and drive it; nothing inherits from it.
//!
//! ## Architecture
//! ```text
//! ProcessStep / ActionStep / Group / Sequence
//!        │ enter_*()
//!        ▼
//!   Lifecycle ──► watch::Sender<Status>   (wait() resolves on terminal state)
//!        ├──────► Bus.publish(ServiceInited/Started/Stopped/Failed)
//!        └──────► Listener (owning container's notice channel, terminal only)
//! ```
//!
//! ## Rules
//! - Each transition is applied atomically under the watch channel's lock.
//! - Terminal transitions happen **exactly once**: a unit cannot both stop and fail.
//! - The listener is notified after the new state is visible.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::error::{ExitCodeProvider, FailureCause, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::service::{ServiceState, lock};

/// Snapshot of a unit's state and failure cause.
#[derive(Clone, Debug)]
pub struct Status {
    /// Current state.
    pub state: ServiceState,
    /// Recorded failure cause (set only on `Failed`).
    pub cause: Option<FailureCause>,
}

/// Completion hook installed by a container when it adopts a child.
///
/// Sends the child's index over the container's notice channel.
#[derive(Clone, Debug)]
pub(crate) struct Listener {
    index: usize,
    tx: mpsc::UnboundedSender<usize>,
}

impl Listener {
    pub(crate) fn new(index: usize, tx: mpsc::UnboundedSender<usize>) -> Self {
        Self { index, tx }
    }

    fn notify(&self) {
        // A closed channel means the container already finished.
        let _ = self.tx.send(self.index);
    }
}

/// Lifecycle state machine with failure capture and listener notification.
#[derive(Debug)]
pub struct Lifecycle {
    name: Arc<str>,
    status: watch::Sender<Status>,
    listener: Mutex<Option<Listener>>,
    bus: Bus,
}

impl Lifecycle {
    /// Creates a lifecycle in the `Created` state.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus) -> Self {
        let (status, _rx) = watch::channel(Status {
            state: ServiceState::Created,
            cause: None,
        });
        Self {
            name: name.into(),
            status,
            listener: Mutex::new(None),
            bus,
        }
    }

    /// Unit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bus this unit publishes to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Current state.
    pub fn state(&self) -> ServiceState {
        self.status.borrow().state
    }

    /// Returns `true` if the unit is in `state`.
    pub fn is_in_state(&self, state: ServiceState) -> bool {
        self.state() == state
    }

    /// Recorded failure cause, if the unit failed.
    pub fn failure_cause(&self) -> Option<FailureCause> {
        self.status.borrow().cause.clone()
    }

    /// Current state and cause together.
    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Created → Initialized.
    pub fn enter_initialized(&self) -> Result<(), ServiceError> {
        self.require(ServiceState::Initialized)
    }

    /// Initialized → Started.
    pub fn enter_started(&self) -> Result<(), ServiceError> {
        self.require(ServiceState::Started)
    }

    /// Moves to `Stopped`. Returns `false` if the unit was already terminal.
    pub fn enter_stopped(&self) -> bool {
        self.transition(ServiceState::Stopped, None).is_ok()
    }

    /// Moves to `Failed` recording `cause`. Returns `false` if the transition
    /// was not allowed (already terminal, or never initialized).
    pub fn enter_failed(&self, cause: FailureCause) -> bool {
        match self.transition(ServiceState::Failed, Some(cause)) {
            Ok(()) => true,
            Err(from) => {
                if !from.is_terminal() {
                    warn!(service = %self.name, state = %from, "failure ignored: unit never started");
                }
                false
            }
        }
    }

    /// Waits until the unit reaches `Stopped` or `Failed`.
    pub async fn wait(&self) -> ServiceState {
        let mut rx = self.status.subscribe();
        match rx.wait_for(|s| s.state.is_terminal()).await {
            Ok(status) => status.state,
            Err(_closed) => self.state(),
        }
    }

    /// Installs the owning container's completion hook.
    pub(crate) fn attach(&self, listener: Listener) {
        *lock(&self.listener) = Some(listener);
    }

    fn require(&self, to: ServiceState) -> Result<(), ServiceError> {
        self.transition(to, None)
            .map_err(|from| ServiceError::InvalidTransition {
                service: self.name.to_string(),
                from,
                to,
            })
    }

    /// Applies `to` if allowed from the current state; returns the current
    /// state otherwise.
    fn transition(
        &self,
        to: ServiceState,
        cause: Option<FailureCause>,
    ) -> Result<(), ServiceState> {
        let mut outcome = Ok(());
        self.status.send_if_modified(|status| {
            if !status.state.can_move_to(to) {
                outcome = Err(status.state);
                return false;
            }
            status.state = to;
            if cause.is_some() {
                status.cause = cause;
            }
            true
        });
        if outcome.is_ok() {
            self.announce(to);
        }
        outcome
    }

    fn announce(&self, to: ServiceState) {
        debug!(service = %self.name, state = %to, "transition");

        let kind = match to {
            ServiceState::Created => return,
            ServiceState::Initialized => EventKind::ServiceInited,
            ServiceState::Started => EventKind::ServiceStarted,
            ServiceState::Stopped => EventKind::ServiceStopped,
            ServiceState::Failed => EventKind::ServiceFailed,
        };
        let mut ev = Event::new(kind)
            .with_service(Arc::clone(&self.name))
            .with_state(to);
        if let Some(cause) = self.failure_cause() {
            ev = ev.with_reason(cause.to_string());
            if let Some(code) = cause.exit_code() {
                ev = ev.with_exit_code(code);
            }
        }
        self.bus.publish(ev);

        if to.is_terminal() {
            if let Some(listener) = lock(&self.listener).as_ref() {
                listener.notify();
            }
        }
    }
}

impl ExitCodeProvider for Lifecycle {
    fn exit_code(&self) -> Option<i32> {
        self.failure_cause().and_then(|cause| cause.exit_code())
    }
}
