//! # Group: unordered composite.
//!
//! A [`Group`] starts all of its children together and finishes when they
//! all have. It is mostly a namespace: exit-code resolution looks one level
//! into a group when searching a sequence for its latest process.
//!
//! ## Rules
//! - Children keep insertion order for lookup and iteration.
//! - The first failed child fails the group (same cause) and the remaining
//!   children are stopped.
//! - The group stops once every child stopped; an empty group stops on start.
//! - Children added while the group runs are started immediately; one that
//!   refuses to start fails the group like a refusal during `start`.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{FailureCause, ServiceError};
use crate::events::Bus;
use crate::service::{Container, Lifecycle, Listener, Service, ServiceState, Unit, lock};

#[derive(Debug, Default)]
struct Members {
    children: Vec<Unit>,
    config: Option<Config>,
}

/// Unordered container running all children concurrently.
#[derive(Debug)]
pub struct Group {
    lifecycle: Lifecycle,
    members: Mutex<Members>,
    notices: mpsc::UnboundedSender<usize>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<usize>>>,
    done: CancellationToken,
}

impl Group {
    /// Creates an empty group in the `Created` state.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus) -> Self {
        let (notices, inbox) = mpsc::unbounded_channel();
        Self {
            lifecycle: Lifecycle::new(name, bus),
            members: Mutex::new(Members::default()),
            notices,
            inbox: Mutex::new(Some(inbox)),
            done: CancellationToken::new(),
        }
    }

    /// Creates an empty group and returns it as a shared handle.
    pub fn arc(name: impl Into<Arc<str>>, bus: Bus) -> Arc<Self> {
        Arc::new(Self::new(name, bus))
    }

    /// Child with the given name.
    pub fn find(&self, name: &str) -> Option<Unit> {
        lock(&self.members)
            .children
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        lock(&self.members).children.len()
    }

    /// Returns `true` if the group has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies the children's outcomes to the group.
    fn settle(&self, members: &Members) {
        if !self.lifecycle.is_in_state(ServiceState::Started) {
            return;
        }
        if let Some(failed) = members
            .children
            .iter()
            .find(|c| c.state() == ServiceState::Failed)
        {
            let cause: FailureCause = failed.failure_cause().unwrap_or_else(|| {
                Arc::new(ServiceError::Failed {
                    service: failed.name().to_string(),
                    error: "failed without a cause".to_string(),
                })
            });
            for child in &members.children {
                if !child.state().is_terminal() {
                    child.stop();
                }
            }
            self.lifecycle.enter_failed(cause);
            self.done.cancel();
            return;
        }
        if members.children.iter().all(|c| c.state() == ServiceState::Stopped) {
            self.lifecycle.enter_stopped();
            self.done.cancel();
        }
    }

    async fn drive(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<usize>) {
        loop {
            tokio::select! {
                _ = self.done.cancelled() => break,
                notice = inbox.recv() => match notice {
                    Some(_) => {
                        let members = lock(&self.members);
                        self.settle(&members);
                    }
                    None => break,
                },
            }
        }
    }
}

impl Service for Group {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn init(&self, cfg: &Config) -> Result<(), ServiceError> {
        cfg.validate()?;
        let mut members = lock(&self.members);
        for child in &members.children {
            if child.state() == ServiceState::Created {
                child.init(cfg)?;
            }
        }
        members.config = Some(cfg.clone());
        self.lifecycle.enter_initialized()
    }

    fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        let members = lock(&self.members);
        self.lifecycle.enter_started()?;

        if let Some(inbox) = lock(&self.inbox).take() {
            tokio::spawn(Arc::clone(self).drive(inbox));
        }
        for child in &members.children {
            if let Err(err) = child.start() {
                if !child.state().is_terminal() {
                    for other in &members.children {
                        other.stop();
                    }
                    self.lifecycle.enter_failed(Arc::new(err));
                    self.done.cancel();
                    return Ok(());
                }
            }
        }
        self.settle(&members);
        Ok(())
    }

    fn stop(&self) {
        let members = lock(&self.members);
        for child in &members.children {
            child.stop();
        }
        self.lifecycle.enter_stopped();
        self.done.cancel();
    }
}

impl Container for Group {
    /// Adds `child`; starts it right away if the group is running.
    ///
    /// ### Errors
    /// - `SequenceTerminated` if the group already finished
    /// - `ChildAlreadyStarted` if `child` is past `Initialized`
    /// - `Failed` if a running group's new child refuses to start; the group
    ///   then stops its other children and fails with the refusal as cause
    fn add(&self, child: Unit) -> Result<(), ServiceError> {
        let mut members = lock(&self.members);
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
        if let Some(cfg) = &members.config {
            if child.state() == ServiceState::Created {
                child.init(cfg)?;
            }
        }

        let index = members.children.len();
        child
            .lifecycle()
            .attach(Listener::new(index, self.notices.clone()));
        members.children.push(child.clone());

        if state == ServiceState::Started {
            if let Err(err) = child.start() {
                if !child.state().is_terminal() {
                    for other in &members.children {
                        other.stop();
                    }
                    let cause = Arc::new(err);
                    self.lifecycle.enter_failed(Arc::clone(&cause));
                    self.done.cancel();
                    return Err(ServiceError::Failed {
                        service: self.lifecycle.name().to_string(),
                        error: cause.as_message(),
                    });
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn children(&self) -> Vec<Unit> {
        lock(&self.members).children.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExitCodeProvider;
    use crate::steps::ActionStep;
    use std::time::Duration;

    fn bus() -> Bus {
        Bus::new(64)
    }

    fn group_of(children: Vec<Unit>) -> Arc<Group> {
        let group = Group::arc("group", bus());
        for child in children {
            group.add(child).unwrap();
        }
        group.init(&Config::default()).unwrap();
        group
    }

    #[tokio::test]
    async fn empty_group_stops_on_start() {
        let group = group_of(vec![]);
        group.start().unwrap();
        assert_eq!(group.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn stops_after_all_children_stop() {
        let a: Unit = ActionStep::from_fn("a", bus(), |_ctx| async { Ok(()) }).into();
        let b: Unit = ActionStep::from_fn("b", bus(), |_ctx| async { Ok(()) }).into();
        let group = group_of(vec![a, b]);
        group.start().unwrap();

        assert_eq!(group.lifecycle().wait().await, ServiceState::Stopped);
        assert!(group.find("b").is_some());
    }

    #[tokio::test]
    async fn failed_child_fails_group_and_stops_siblings() {
        let idle: Unit = ActionStep::from_fn("idle", bus(), |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok(())
        })
        .into();
        let bad: Unit = ActionStep::from_fn("bad", bus(), |_ctx| async {
            Err(ServiceError::Exit { code: 2, reason: "bad".into() })
        })
        .into();
        let group = group_of(vec![idle.clone(), bad]);
        group.start().unwrap();

        assert_eq!(group.lifecycle().wait().await, ServiceState::Failed);
        assert_eq!(idle.state(), ServiceState::Stopped);
        assert_eq!(group.lifecycle().exit_code(), Some(2));
    }

    #[tokio::test]
    async fn refused_late_child_fails_running_group() {
        let gate = ActionStep::from_fn("gate", bus(), |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok(())
        });
        let group = group_of(vec![gate.clone().into()]);
        group.start().unwrap();
        assert_eq!(group.state(), ServiceState::Started);

        let unbuilt = crate::steps::ProcessStep::arc("unbuilt", bus());
        let err = group.add(unbuilt.clone().into()).unwrap_err();
        assert_eq!(err.as_label(), "service_failed");

        let state = tokio::time::timeout(Duration::from_secs(2), group.lifecycle().wait())
            .await
            .unwrap();
        assert_eq!(state, ServiceState::Failed);
        assert_eq!(gate.state(), ServiceState::Stopped);
        assert_eq!(unbuilt.state(), ServiceState::Stopped);
        assert_eq!(
            group.failure_cause().unwrap().as_label(),
            "invalid_argument"
        );
    }
}
