//! # Orchestrator: the provider-facing entry point.
//!
//! The [`Orchestrator`] owns the event bus, the [`SubscriberSet`] and one root
//! [`Sequence`]. Callers queue commands (each becomes a [`ProcessStep`]) or
//! arbitrary units; the sequence runs them in order and the orchestrator
//! resolves the final exit code.
//!
//! ## Architecture
//! ```text
//! queue_command(name, env, argv)
//!     └─► build_process: ProcessStep::new → init(cfg) → build(env, argv)
//!     └─► sequence.add(step)
//!     └─► maybe_start_command_sequence()  (starts it now if the sequence is idle)
//!
//! run():
//!   init (if Created) ─► start ─► select {
//!       sequence terminal        ─► resolve_exit_code
//!       shutdown signal          ─► shutdown(): ShutdownRequested, sequence.stop(),
//!                                   reap latest process, resolve_exit_code
//!   }
//!
//! Event flow:
//!   units ── publish ──► Bus ──► subscriber_listener ──► SubscriberSet::emit
//! ```
//!
//! ## Example
//! ```no_run
//! use seqvisor::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orch = Orchestrator::builder(Config::default()).build();
//!     orch.queue_command("master", [("ROLE", "master")], ["bin/server", "master"])?;
//!     orch.queue_command("worker", [("ROLE", "worker")], ["bin/server", "worker"])?;
//!
//!     let code = orch.run().await?;
//!     std::process::exit(code);
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::containers::Sequence;
use crate::error::{ExitCodeProvider, FailureCause, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::provider::ProviderRole;
use crate::service::{Container, Service, ServiceState, Unit};
use crate::steps::ProcessStep;
use crate::subscribers::SubscriberSet;

use super::builder::OrchestratorBuilder;
use super::exit_code;
use super::shutdown;

/// Runs queued steps in order and reports how they ended.
pub struct Orchestrator {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    sequence: Arc<Sequence>,
    roles: Vec<ProviderRole>,
}

impl Orchestrator {
    /// Starts building an orchestrator.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        sequence: Arc<Sequence>,
        roles: Vec<ProviderRole>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            sequence,
            roles,
        }
    }

    /// Forwards bus events to the subscriber set (fire-and-forget).
    pub(super) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Configuration handed to every unit.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus shared by all units.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Root sequence.
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    /// Creates an initialized, built process step; does not queue it.
    ///
    /// ### Errors
    /// Configuration errors from `init`, argument errors from `build`.
    pub fn build_process<I, K, V, C, S>(
        &self,
        name: &str,
        environment: I,
        command: C,
    ) -> Result<Arc<ProcessStep>, ServiceError>
    where
        I: IntoIterator<Item = (K, V)>,
        C: IntoIterator<Item = S>,
        K: Into<String>,
        V: Into<String>,
        S: Into<String>,
    {
        let step = ProcessStep::arc(name, self.bus.clone());
        step.init(&self.cfg)?;
        step.build(environment, command)?;
        Ok(step)
    }

    /// Builds a process step and appends it to the sequence.
    ///
    /// If the sequence is running and idle, the step starts before this returns.
    pub fn queue_command<I, K, V, C, S>(
        &self,
        name: &str,
        environment: I,
        command: C,
    ) -> Result<Arc<ProcessStep>, ServiceError>
    where
        I: IntoIterator<Item = (K, V)>,
        C: IntoIterator<Item = S>,
        K: Into<String>,
        V: Into<String>,
        S: Into<String>,
    {
        let step = self.build_process(name, environment, command)?;
        info!(service = name, command = ?step.command(), "queueing command");
        self.queue(Arc::clone(&step).into())?;
        Ok(step)
    }

    /// Appends any unit to the sequence, starting it if the sequence is idle.
    pub fn queue(&self, unit: Unit) -> Result<(), ServiceError> {
        self.sequence.add(unit)?;
        self.maybe_start_command_sequence();
        Ok(())
    }

    /// Advances the sequence if it is running; a no-op before `start`.
    pub fn maybe_start_command_sequence(&self) -> bool {
        self.sequence.maybe_advance_if_running()
    }

    /// Initializes the sequence and every queued child with the config.
    pub fn init(&self) -> Result<(), ServiceError> {
        self.sequence.init(&self.cfg)
    }

    /// Starts the sequence. Must be called within a Tokio runtime.
    pub fn start(&self) -> Result<(), ServiceError> {
        self.sequence.start()
    }

    /// Stops the sequence, killing the active process.
    pub fn stop(&self) {
        self.sequence.stop();
    }

    /// State of the root sequence.
    pub fn state(&self) -> ServiceState {
        self.sequence.state()
    }

    /// Cause the root sequence failed with, if it failed.
    pub fn failure_cause(&self) -> Option<FailureCause> {
        self.sequence.failure_cause()
    }

    /// Exit code the agent should report right now.
    pub fn exit_code(&self) -> i32 {
        exit_code::resolve_exit_code(&self.sequence)
    }

    /// Process step of the current or previous child.
    pub fn latest_process(&self) -> Option<Arc<ProcessStep>> {
        exit_code::latest_process(&self.sequence)
    }

    /// Waits for the sequence to finish and returns the resolved exit code.
    ///
    /// Never resolves if the sequence is not started.
    pub async fn wait(&self) -> i32 {
        self.sequence.lifecycle().wait().await;
        self.exit_code()
    }

    /// Stops the sequence on request and returns the final exit code.
    ///
    /// Publishes `ShutdownRequested`, stops the sequence, then waits until
    /// the latest process is reaped so the code no longer changes afterwards.
    pub async fn shutdown(&self) -> i32 {
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_service(self.sequence.name()));
        self.stop();
        if let Some(process) = self.latest_process() {
            process.wait_exit().await;
        }
        self.exit_code()
    }

    /// Runs the sequence to completion or until a termination signal.
    ///
    /// ### Errors
    /// Errors from `init` or `start`; a failing step is reported through the
    /// returned exit code instead.
    pub async fn run(&self) -> Result<i32, ServiceError> {
        if self.state() == ServiceState::Created {
            self.init()?;
        }
        self.start()?;

        let signal = async {
            if let Err(err) = shutdown::wait_for_shutdown_signal().await {
                warn!(error = %err, "cannot listen for shutdown signals");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            code = self.wait() => Ok(code),
            _ = signal => Ok(self.shutdown().await),
        }
    }

    /// Returns `true` if `role` is one of the configured roles.
    pub fn is_supported_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.name() == role)
    }

    /// Configured roles.
    pub fn roles(&self) -> &[ProviderRole] {
        &self.roles
    }

    /// Status report: each step's state, plus exit codes of finished processes.
    ///
    /// Keys are `<step>` and `<step>.exit_code`.
    pub fn status(&self) -> BTreeMap<String, String> {
        let mut status = BTreeMap::new();
        status.insert(self.sequence.name().to_string(), self.state().to_string());
        for child in self.sequence.children() {
            status.insert(child.name().to_string(), child.state().to_string());
            if let Some(code) = child.as_process().and_then(|p| p.exit_code()) {
                status.insert(format!("{}.exit_code", child.name()), code.to_string());
            }
        }
        if let Some(code) = self.sequence.lifecycle().exit_code() {
            status.insert("exit_code".to_string(), code.to_string());
        }
        status
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("sequence", &self.sequence.name())
            .field("state", &self.state())
            .field("subscribers", &self.subs.len())
            .field("roles", &self.roles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_before_start_stays_pending() {
        let orch = Orchestrator::builder(Config::default()).build();
        let step = orch
            .queue_command("echo", Vec::<(String, String)>::new(), ["echo", "hi"])
            .unwrap();

        assert!(!orch.maybe_start_command_sequence());
        assert_eq!(step.state(), ServiceState::Initialized);
        assert_eq!(orch.status().get("echo").map(String::as_str), Some("initialized"));
    }

    #[tokio::test]
    async fn role_lookup() {
        let orch = Orchestrator::builder(Config::default())
            .with_roles(vec![ProviderRole::new("master", 1), ProviderRole::new("worker", 2)])
            .build();
        assert!(orch.is_supported_role("worker"));
        assert!(!orch.is_supported_role("gateway"));
    }

    #[tokio::test]
    async fn bad_command_is_not_queued() {
        let orch = Orchestrator::builder(Config::default()).build();
        let err = orch
            .queue_command("broken", Vec::<(String, String)>::new(), Vec::<String>::new())
            .unwrap_err();
        assert_eq!(err.as_label(), "invalid_argument");
        assert!(orch.sequence().is_empty());
    }
}
