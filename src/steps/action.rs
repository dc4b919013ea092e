//! # Action steps: plain control steps backed by async closures.
//!
//! [`Action`] is the unit of work (async, cancelable); [`ActionFn`] adapts a
//! closure `F: Fn(CancellationToken) -> Fut`, producing a fresh future per run.
//! [`ActionStep`] wraps an action in a [`Lifecycle`] so it can sit in a sequence
//! next to process steps (e.g. "write config" before "launch master").
//!
//! ## Event flow
//! ```text
//! start() ──► ServiceStarted ──► tokio::spawn(action.run(token))
//!                                   ├─ Ok(())  ──► ServiceStopped
//!                                   ├─ Err(e)  ──► ServiceFailed (cause = e)
//!                                   └─ stop()  ──► token cancelled, ServiceStopped
//! ```
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use seqvisor::{ActionFn, ActionRef, ServiceError};
//!
//! let write_config: ActionRef = ActionFn::arc(|_ctx: CancellationToken| async move {
//!     // render files...
//!     Ok::<_, ServiceError>(())
//! });
//! # let _ = write_config;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ServiceError;
use crate::events::Bus;
use crate::service::{Lifecycle, Service};

/// Shared handle to an action.
pub type ActionRef = Arc<dyn Action>;

/// # Asynchronous, cancelable unit of control work.
///
/// Implementations should watch `ctx` and return promptly once it is cancelled.
pub trait Action: Send + Sync + 'static {
    /// Runs the action to completion.
    fn run(&self, ctx: CancellationToken) -> BoxFuture<'static, Result<(), ServiceError>>;
}

/// Function-backed action.
pub struct ActionFn<F> {
    f: F,
}

impl<F> ActionFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Action for ActionFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    fn run(&self, ctx: CancellationToken) -> BoxFuture<'static, Result<(), ServiceError>> {
        Box::pin((self.f)(ctx))
    }
}

/// Control step running an [`Action`] under a lifecycle.
pub struct ActionStep {
    lifecycle: Lifecycle,
    action: ActionRef,
    cancel: CancellationToken,
}

impl ActionStep {
    /// Creates a step in the `Created` state.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus, action: ActionRef) -> Self {
        Self {
            lifecycle: Lifecycle::new(name, bus),
            action,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a step and returns it as a shared handle.
    pub fn arc(name: impl Into<Arc<str>>, bus: Bus, action: ActionRef) -> Arc<Self> {
        Arc::new(Self::new(name, bus, action))
    }

    /// Shorthand for a step backed by a closure.
    pub fn from_fn<F, Fut>(name: impl Into<Arc<str>>, bus: Bus, f: F) -> Arc<Self>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        Self::arc(name, bus, ActionFn::arc(f))
    }

    fn complete(&self, res: Result<(), ServiceError>) {
        match res {
            Ok(()) => {
                self.lifecycle.enter_stopped();
            }
            Err(err) => {
                self.lifecycle.enter_failed(Arc::new(err));
            }
        }
    }
}

impl Service for ActionStep {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn init(&self, cfg: &Config) -> Result<(), ServiceError> {
        cfg.validate()?;
        self.lifecycle.enter_initialized()
    }

    fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        self.lifecycle.enter_started()?;

        let me = Arc::clone(self);
        let run = self.action.run(self.cancel.clone());
        tokio::spawn(async move {
            tokio::select! {
                res = run => me.complete(res),
                _ = me.cancel.cancelled() => {}
            }
        });
        Ok(())
    }

    fn stop(&self) {
        self.cancel.cancel();
        self.lifecycle.enter_stopped();
    }
}

impl fmt::Debug for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStep")
            .field("name", &self.lifecycle.name())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceState;

    fn initialized(step: &Arc<ActionStep>) {
        step.init(&Config::default()).unwrap();
    }

    #[tokio::test]
    async fn successful_action_stops() {
        let step = ActionStep::from_fn("write-config", Bus::new(16), |_ctx| async { Ok(()) });
        initialized(&step);
        step.start().unwrap();
        assert_eq!(step.lifecycle().wait().await, ServiceState::Stopped);
    }

    #[tokio::test]
    async fn failing_action_records_cause() {
        let step = ActionStep::from_fn("write-config", Bus::new(16), |_ctx| async {
            Err(ServiceError::Exit { code: 4, reason: "no site file".into() })
        });
        initialized(&step);
        step.start().unwrap();

        assert_eq!(step.lifecycle().wait().await, ServiceState::Failed);
        let cause = step.failure_cause().unwrap();
        assert_eq!(cause.as_label(), "exit_requested");
    }

    #[tokio::test]
    async fn stop_cancels_running_action() {
        let step = ActionStep::from_fn("idle", Bus::new(16), |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err(ServiceError::Failed { service: "idle".into(), error: "cancelled".into() })
        });
        initialized(&step);
        step.start().unwrap();
        step.stop();

        assert_eq!(step.state(), ServiceState::Stopped);
        assert!(step.failure_cause().is_none());
    }

    #[test]
    fn start_before_init_is_rejected() {
        let step = ActionStep::from_fn("x", Bus::new(4), |_ctx| async { Ok(()) });
        assert!(step.start().unwrap_err().is_contract_violation());
    }
}
