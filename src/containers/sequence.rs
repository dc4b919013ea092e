//! # Sequence: ordered, auto-advancing container.
//!
//! A [`Sequence`] starts its children one at a time, moving to the next child
//! only after the current one stopped successfully, and halting on the first
//! failure.
//!
//! ## Architecture
//! ```text
//! add(child) ──► children.push ──► attach Listener(index, notices)
//!
//! start() ──► Started ──► spawn drive(inbox) ──► start_next()
//!
//! child terminal ──► notices.send(index) ──► drive() ──► on_child_terminal(index)
//!                                                         └─► start_next():
//!                                                              ├─ active Stopped ─► previous = active, start children[next]
//!                                                              ├─ active Failed  ─► Failed(child cause), stop advancing
//!                                                              ├─ active running ─► wait
//!                                                              └─ next past end  ─► Stopped
//! ```
//!
//! ## Rules
//! - All mutation happens under one mutex: `add`, `start_next`, notice
//!   handling and `stop` are serialized.
//! - At most one child is `Started` at a time; `next` only moves forward.
//! - Once a child fails, no later child is ever started and the sequence
//!   fails with the **same** cause.
//! - An empty sequence stops as soon as it starts.
//! - Adding to a stopped or failed sequence is an error, never a silent no-op.
//! - Stale notices (from children that are no longer active) are ignored.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{FailureCause, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::service::{Container, Lifecycle, Listener, Service, ServiceState, Unit, lock};

/// Ordered children plus the cursor over them.
#[derive(Debug, Default)]
struct Cursor {
    children: Vec<Unit>,
    /// Index of the next child to start.
    next: usize,
    /// Child currently running.
    active: Option<usize>,
    /// Child that most recently finished (or refused to start).
    previous: Option<usize>,
    /// Configuration captured by `init`, applied to late-added children.
    config: Option<Config>,
}

/// Ordered container that runs its children one after another.
#[derive(Debug)]
pub struct Sequence {
    lifecycle: Lifecycle,
    cursor: Mutex<Cursor>,
    notices: mpsc::UnboundedSender<usize>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<usize>>>,
    done: CancellationToken,
}

impl Sequence {
    /// Creates an empty sequence in the `Created` state.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus) -> Self {
        let (notices, inbox) = mpsc::unbounded_channel();
        Self {
            lifecycle: Lifecycle::new(name, bus),
            cursor: Mutex::new(Cursor::default()),
            notices,
            inbox: Mutex::new(Some(inbox)),
            done: CancellationToken::new(),
        }
    }

    /// Creates an empty sequence and returns it as a shared handle.
    pub fn arc(name: impl Into<Arc<str>>, bus: Bus) -> Arc<Self> {
        Arc::new(Self::new(name, bus))
    }

    /// Starts the next child if the sequence is running and idle.
    ///
    /// "Idle" means no active child, or an active child that already reached
    /// a terminal state; its outcome is applied first. When no child is left
    /// the sequence stops.
    pub fn start_next(&self) {
        let mut cursor = lock(&self.cursor);
        self.start_next_locked(&mut cursor);
    }

    /// Calls [`start_next`](Self::start_next) if the sequence is `Started`.
    ///
    /// Returns `false` when the sequence is not running; queued children then
    /// wait for `start()`.
    pub fn maybe_advance_if_running(&self) -> bool {
        if !self.lifecycle.is_in_state(ServiceState::Started) {
            return false;
        }
        self.start_next();
        true
    }

    /// Child currently running.
    pub fn active(&self) -> Option<Unit> {
        let cursor = lock(&self.cursor);
        cursor.active.map(|i| cursor.children[i].clone())
    }

    /// Child that most recently finished.
    pub fn previous(&self) -> Option<Unit> {
        let cursor = lock(&self.cursor);
        cursor.previous.map(|i| cursor.children[i].clone())
    }

    /// Active child if any, otherwise the most recently finished one.
    pub fn current_or_previous(&self) -> Option<Unit> {
        let cursor = lock(&self.cursor);
        cursor
            .active
            .or(cursor.previous)
            .map(|i| cursor.children[i].clone())
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        lock(&self.cursor).children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies the notice of child `index` reaching a terminal state.
    fn on_child_terminal(&self, index: usize) {
        let mut cursor = lock(&self.cursor);
        if cursor.active != Some(index) {
            debug!(service = %self.lifecycle.name(), index, "stale notice");
            return;
        }
        self.start_next_locked(&mut cursor);
    }

    fn start_next_locked(&self, cursor: &mut Cursor) {
        loop {
            if !self.lifecycle.is_in_state(ServiceState::Started) {
                return;
            }

            if let Some(index) = cursor.active {
                let child = &cursor.children[index];
                match child.state() {
                    ServiceState::Stopped => {
                        cursor.previous = Some(index);
                        cursor.active = None;
                    }
                    ServiceState::Failed => {
                        let cause = child.failure_cause().unwrap_or_else(|| {
                            Arc::new(ServiceError::Failed {
                                service: child.name().to_string(),
                                error: "failed without a cause".to_string(),
                            })
                        });
                        cursor.previous = Some(index);
                        cursor.active = None;
                        self.fail(cause);
                        return;
                    }
                    _ => return,
                }
            }

            let Some(child) = cursor.children.get(cursor.next).cloned() else {
                info!(service = %self.lifecycle.name(), steps = cursor.children.len(), "sequence complete");
                self.finish();
                return;
            };
            let index = cursor.next;
            cursor.next += 1;
            cursor.active = Some(index);

            self.lifecycle.bus().publish(
                Event::new(EventKind::StepStarting)
                    .with_service(self.lifecycle.name())
                    .with_reason(child.name())
                    .with_index(index),
            );
            if let Err(err) = child.start() {
                if !child.state().is_terminal() {
                    // Refused outright: the child never ran.
                    cursor.previous = Some(index);
                    cursor.active = None;
                    self.fail(Arc::new(err));
                    return;
                }
                debug!(service = %self.lifecycle.name(), child = child.name(), error = %err, "child failed on start");
            }
            // Children may finish synchronously; loop to settle them.
        }
    }

    fn finish(&self) {
        self.lifecycle.enter_stopped();
        self.done.cancel();
    }

    fn fail(&self, cause: FailureCause) {
        self.lifecycle.enter_failed(cause);
        self.done.cancel();
    }

    /// Consumes child notices until the sequence is terminal.
    async fn drive(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<usize>) {
        loop {
            tokio::select! {
                _ = self.done.cancelled() => break,
                notice = inbox.recv() => match notice {
                    Some(index) => self.on_child_terminal(index),
                    None => break,
                },
            }
        }
    }
}

impl Service for Sequence {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Initializes every `Created` child with `cfg`, then the sequence itself.
    fn init(&self, cfg: &Config) -> Result<(), ServiceError> {
        cfg.validate()?;
        let mut cursor = lock(&self.cursor);
        let state = self.lifecycle.state();
        if state != ServiceState::Created {
            return Err(ServiceError::InvalidTransition {
                service: self.lifecycle.name().to_string(),
                from: state,
                to: ServiceState::Initialized,
            });
        }
        for child in &cursor.children {
            if child.state() == ServiceState::Created {
                child.init(cfg)?;
            }
        }
        cursor.config = Some(cfg.clone());
        self.lifecycle.enter_initialized()
    }

    fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        let mut cursor = lock(&self.cursor);
        self.lifecycle.enter_started()?;

        if let Some(inbox) = lock(&self.inbox).take() {
            tokio::spawn(Arc::clone(self).drive(inbox));
        }
        self.start_next_locked(&mut cursor);
        Ok(())
    }

    /// Stops the active child (killing its process), then the pending ones,
    /// then the sequence itself.
    fn stop(&self) {
        let cursor = lock(&self.cursor);
        if self.lifecycle.state().is_terminal() {
            return;
        }
        if let Some(index) = cursor.active {
            cursor.children[index].stop();
        }
        for child in &cursor.children {
            if !child.state().is_terminal() {
                child.stop();
            }
        }
        self.finish();
    }
}

impl Container for Sequence {
    /// Appends `child` to the ordered list.
    ///
    /// Does not start anything; see [`Sequence::maybe_advance_if_running`].
    ///
    /// ### Errors
    /// - `SequenceTerminated` if the sequence already stopped or failed
    /// - `ChildAlreadyStarted` if `child` is past `Initialized`
    /// - any `init` error of `child` when the sequence is already initialized
    fn add(&self, child: Unit) -> Result<(), ServiceError> {
        let mut cursor = lock(&self.cursor);
        let state = self.lifecycle.state();
        if state.is_terminal() {
            return Err(ServiceError::SequenceTerminated {
                service: self.lifecycle.name().to_string(),
                state,
            });
        }
        if !child.state().is_pending() {
            return Err(ServiceError::ChildAlreadyStarted {
                service: self.lifecycle.name().to_string(),
                child: child.name().to_string(),
            });
        }
        if let Some(cfg) = &cursor.config {
            if child.state() == ServiceState::Created {
                child.init(cfg)?;
            }
        }

        let index = cursor.children.len();
        child
            .lifecycle()
            .attach(Listener::new(index, self.notices.clone()));
        self.lifecycle.bus().publish(
            Event::new(EventKind::StepQueued)
                .with_service(self.lifecycle.name())
                .with_reason(child.name())
                .with_index(index),
        );
        cursor.children.push(child);
        Ok(())
    }

    fn children(&self) -> Vec<Unit> {
        lock(&self.cursor).children.clone()
    }
}
