//! # Units: the tagged variant over every child kind.
//!
//! Containers hold [`Unit`]s rather than trait objects, so code that needs to
//! know *what* a child is (e.g. exit-code resolution looking for a process)
//! pattern-matches instead of downcasting.
//!
//! ```text
//! Unit::Action   ──► ActionStep   (plain control step, async closure)
//! Unit::Process  ──► ProcessStep  (external OS process)
//! Unit::Group    ──► Group        (unordered, searchable namespace)
//! Unit::Sequence ──► Sequence     (ordered, auto-advancing)
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::containers::{Group, Sequence};
use crate::error::{ExitCodeProvider, FailureCause, ServiceError};
use crate::service::{Container, Lifecycle, Service, ServiceState};
use crate::steps::{ActionStep, ProcessStep};

/// A child of a container.
#[derive(Clone, Debug)]
pub enum Unit {
    /// Plain control step.
    Action(Arc<ActionStep>),
    /// External process step.
    Process(Arc<ProcessStep>),
    /// Unordered composite group.
    Group(Arc<Group>),
    /// Nested ordered sequence.
    Sequence(Arc<Sequence>),
}

impl Unit {
    /// Embedded lifecycle of the wrapped unit.
    pub fn lifecycle(&self) -> &Lifecycle {
        match self {
            Unit::Action(s) => s.lifecycle(),
            Unit::Process(s) => s.lifecycle(),
            Unit::Group(s) => s.lifecycle(),
            Unit::Sequence(s) => s.lifecycle(),
        }
    }

    /// Unit name.
    pub fn name(&self) -> &str {
        self.lifecycle().name()
    }

    /// Current state.
    pub fn state(&self) -> ServiceState {
        self.lifecycle().state()
    }

    /// Recorded failure cause.
    pub fn failure_cause(&self) -> Option<FailureCause> {
        self.lifecycle().failure_cause()
    }

    /// Short label for the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Unit::Action(_) => "action",
            Unit::Process(_) => "process",
            Unit::Group(_) => "group",
            Unit::Sequence(_) => "sequence",
        }
    }

    /// Initializes the wrapped unit with `cfg`.
    pub fn init(&self, cfg: &Config) -> Result<(), ServiceError> {
        match self {
            Unit::Action(s) => s.init(cfg),
            Unit::Process(s) => s.init(cfg),
            Unit::Group(s) => s.init(cfg),
            Unit::Sequence(s) => s.init(cfg),
        }
    }

    /// Starts the wrapped unit.
    pub fn start(&self) -> Result<(), ServiceError> {
        match self {
            Unit::Action(s) => s.start(),
            Unit::Process(s) => s.start(),
            Unit::Group(s) => s.start(),
            Unit::Sequence(s) => s.start(),
        }
    }

    /// Stops the wrapped unit.
    pub fn stop(&self) {
        match self {
            Unit::Action(s) => s.stop(),
            Unit::Process(s) => s.stop(),
            Unit::Group(s) => s.stop(),
            Unit::Sequence(s) => s.stop(),
        }
    }

    /// Waits until the unit is terminal.
    pub async fn wait(&self) -> ServiceState {
        self.lifecycle().wait().await
    }

    /// The process step, if this unit is one.
    pub fn as_process(&self) -> Option<&Arc<ProcessStep>> {
        match self {
            Unit::Process(p) => Some(p),
            _ => None,
        }
    }

    /// Direct children, for container variants.
    pub fn children(&self) -> Option<Vec<Unit>> {
        match self {
            Unit::Group(g) => Some(g.children()),
            Unit::Sequence(s) => Some(s.children()),
            Unit::Action(_) | Unit::Process(_) => None,
        }
    }
}

impl ExitCodeProvider for Unit {
    fn exit_code(&self) -> Option<i32> {
        match self {
            Unit::Process(p) => p.exit_code(),
            other => other.lifecycle().exit_code(),
        }
    }
}

impl From<Arc<ActionStep>> for Unit {
    fn from(step: Arc<ActionStep>) -> Self {
        Unit::Action(step)
    }
}

impl From<Arc<ProcessStep>> for Unit {
    fn from(step: Arc<ProcessStep>) -> Self {
        Unit::Process(step)
    }
}

impl From<Arc<Group>> for Unit {
    fn from(group: Arc<Group>) -> Self {
        Unit::Group(group)
    }
}

impl From<Arc<Sequence>> for Unit {
    fn from(seq: Arc<Sequence>) -> Self {
        Unit::Sequence(seq)
    }
}
