//! # External process step.
//!
//! [`ProcessStep`] wraps spawning and supervising one OS process described by
//! a name, an environment and an argument vector.
//!
//! ## Architecture
//! ```text
//! build(env, argv) ──► init(cfg) ──► start()
//!                                      │ Command::spawn (non-blocking)
//!                                      ├──► ProcessSpawned
//!                                      ├──► pump(stdout) / pump(stderr)
//!                                      └──► watcher task (owns Child)
//!                                             ├─ exit 0      ──► exit_code=0, Stopped
//!                                             ├─ exit n != 0 ──► exit_code=n, Failed(ProcessExited{n})
//!                                             └─ stop()      ──► kill + reap, ProcessKilled
//! ```
//!
//! ## Rules
//! - `start()` never waits for the process; completion arrives from the watcher.
//! - The exit code is recorded **exactly once** and never changes afterwards.
//! - `stop()` moves the step to `Stopped` immediately, whatever the process later reports.
//! - A spawn error fails the step at once; no exit code exists in that case.
//! - Signal deaths are reported as `128 + signal`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ExitCodeProvider, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::provider::command_line;
use crate::service::{Lifecycle, Service, lock};
use crate::steps::output::{RecentOutput, pump};

/// Exit code recorded when the OS reports neither a code nor a signal.
pub const EXIT_UNKNOWN: i32 = -1;

/// Everything needed to spawn the process.
#[derive(Clone, Debug, Default)]
struct Launch {
    environment: BTreeMap<String, String>,
    command: Vec<String>,
    inherit_env: bool,
    working_dir: Option<PathBuf>,
}

/// Unit that runs one external process.
#[derive(Debug)]
pub struct ProcessStep {
    lifecycle: Lifecycle,
    launch: Mutex<Launch>,
    exit_code: OnceLock<i32>,
    pid: OnceLock<u32>,
    exited: Notify,
    output: Mutex<Arc<RecentOutput>>,
    cancel: CancellationToken,
}

impl ProcessStep {
    /// Creates an unbuilt step in the `Created` state.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus) -> Self {
        let defaults = Config::default();
        Self {
            lifecycle: Lifecycle::new(name, bus),
            launch: Mutex::new(Launch {
                inherit_env: defaults.inherit_env,
                ..Launch::default()
            }),
            exit_code: OnceLock::new(),
            pid: OnceLock::new(),
            exited: Notify::new(),
            output: Mutex::new(Arc::new(RecentOutput::new(defaults.output_lines))),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an unbuilt step and returns it as a shared handle.
    pub fn arc(name: impl Into<Arc<str>>, bus: Bus) -> Arc<Self> {
        Arc::new(Self::new(name, bus))
    }

    /// Records the environment and argument vector.
    ///
    /// ### Errors
    /// - `InvalidArgument` if the command is empty, the program name is blank,
    ///   an environment key is empty or contains `=`, or the step already started.
    pub fn build<I, K, V, C, S>(&self, environment: I, command: C) -> Result<(), ServiceError>
    where
        I: IntoIterator<Item = (K, V)>,
        C: IntoIterator<Item = S>,
        K: Into<String>,
        V: Into<String>,
        S: Into<String>,
    {
        let state = self.lifecycle.state();
        if !state.is_pending() {
            return Err(self.invalid(format!("cannot rebuild a step that is {state}")));
        }

        let command: Vec<String> = command.into_iter().map(Into::into).collect();
        match command.first() {
            None => return Err(self.invalid("empty command".to_string())),
            Some(program) if program.trim().is_empty() => {
                return Err(self.invalid("empty program name".to_string()));
            }
            Some(_) => {}
        }

        let mut env = BTreeMap::new();
        for (k, v) in environment {
            let key: String = k.into();
            if key.is_empty() || key.contains('=') {
                return Err(self.invalid(format!("bad environment key {key:?}")));
            }
            env.insert(key, v.into());
        }

        let mut launch = lock(&self.launch);
        launch.environment = env;
        launch.command = command;
        Ok(())
    }

    /// Argument vector given to `build` (empty until built).
    pub fn command(&self) -> Vec<String> {
        lock(&self.launch).command.clone()
    }

    /// Environment given to `build`.
    pub fn environment(&self) -> BTreeMap<String, String> {
        lock(&self.launch).environment.clone()
    }

    /// Exit code, once the process has terminated.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.get().copied()
    }

    /// OS process id, once spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid.get().copied()
    }

    /// Most recent stdout/stderr lines, oldest first.
    pub fn recent_output(&self) -> Vec<String> {
        lock(&self.output).snapshot()
    }

    /// Waits until the process has terminated and returns its exit code.
    ///
    /// Returns `None` if the step finished without a process exit (never
    /// spawned, spawn error, or stopped before starting).
    pub async fn wait_exit(&self) -> Option<i32> {
        self.lifecycle.wait().await;
        if self.pid().is_none() {
            return self.exit_code();
        }
        // stop() races ahead of the watcher; wait for it to reap the child.
        let exited = self.exited.notified();
        if let Some(code) = self.exit_code() {
            return Some(code);
        }
        exited.await;
        self.exit_code()
    }

    fn invalid(&self, reason: String) -> ServiceError {
        ServiceError::InvalidArgument {
            reason: format!("{}: {reason}", self.lifecycle.name()),
        }
    }

    fn publish(&self, ev: Event) {
        self.lifecycle.bus().publish(ev.with_service(self.lifecycle.name()));
    }

    /// Owns the child until it exits; kills it if the step is stopped first.
    async fn watch(self: Arc<Self>, mut child: Child) {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = self.cancel.cancelled() => {
                if let Err(err) = child.start_kill() {
                    warn!(service = %self.lifecycle.name(), error = %err, "kill failed");
                }
                let mut ev = Event::new(EventKind::ProcessKilled);
                if let Some(pid) = self.pid() {
                    ev = ev.with_pid(pid);
                }
                self.publish(ev);
                child.wait().await
            }
        };

        let code = match status {
            Ok(status) => exit_code_of(status),
            Err(err) => {
                warn!(service = %self.lifecycle.name(), error = %err, "wait failed");
                EXIT_UNKNOWN
            }
        };
        self.record_exit(code);
    }

    fn record_exit(&self, code: i32) {
        if self.exit_code.set(code).is_err() {
            return;
        }
        self.exited.notify_waiters();
        info!(service = %self.lifecycle.name(), code, "process exited");
        self.publish(Event::new(EventKind::ProcessExited).with_exit_code(code));

        if code == 0 {
            self.lifecycle.enter_stopped();
        } else {
            self.lifecycle.enter_failed(Arc::new(ServiceError::ProcessExited {
                service: self.lifecycle.name().to_string(),
                code,
            }));
        }
    }

    fn spawn_failed(&self, source: std::io::Error) -> ServiceError {
        let service = self.lifecycle.name().to_string();
        warn!(service = %service, error = %source, "spawn failed");

        let returned = ServiceError::Spawn {
            service: service.clone(),
            source: std::io::Error::new(source.kind(), source.to_string()),
        };
        self.lifecycle
            .enter_failed(Arc::new(ServiceError::Spawn { service, source }));
        returned
    }
}

impl Service for ProcessStep {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn init(&self, cfg: &Config) -> Result<(), ServiceError> {
        cfg.validate()?;
        {
            let mut launch = lock(&self.launch);
            launch.inherit_env = cfg.inherit_env;
            launch.working_dir = cfg.working_dir.clone();
        }
        *lock(&self.output) = Arc::new(RecentOutput::new(cfg.output_lines));
        self.lifecycle.enter_initialized()
    }

    fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        let launch = lock(&self.launch).clone();
        let Some((program, args)) = launch.command.split_first() else {
            return Err(self.invalid("started before build".to_string()));
        };
        self.lifecycle.enter_started()?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        if !launch.inherit_env {
            cmd.env_clear();
        }
        cmd.envs(&launch.environment);
        if let Some(dir) = &launch.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => return Err(self.spawn_failed(source)),
        };

        let mut ev =
            Event::new(EventKind::ProcessSpawned).with_reason(command_line(&launch.command));
        if let Some(pid) = child.id() {
            let _ = self.pid.set(pid);
            ev = ev.with_pid(pid);
        }
        info!(service = %self.lifecycle.name(), pid = ?self.pid(), command = ?launch.command, "process spawned");
        self.publish(ev);

        let service: Arc<str> = Arc::from(self.lifecycle.name());
        let recent = Arc::clone(&lock(&self.output));
        if let Some(stdout) = child.stdout.take() {
            let bus = self.lifecycle.bus().clone();
            tokio::spawn(pump(stdout, Arc::clone(&service), "stdout", Arc::clone(&recent), bus));
        }
        if let Some(stderr) = child.stderr.take() {
            let bus = self.lifecycle.bus().clone();
            tokio::spawn(pump(stderr, service, "stderr", recent, bus));
        }

        tokio::spawn(Arc::clone(self).watch(child));
        Ok(())
    }

    fn stop(&self) {
        self.cancel.cancel();
        self.lifecycle.enter_stopped();
    }
}

impl ExitCodeProvider for ProcessStep {
    fn exit_code(&self) -> Option<i32> {
        self.exit_code.get().copied()
    }
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(EXIT_UNKNOWN)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(EXIT_UNKNOWN)
}
