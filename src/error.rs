//! Error types used by the sequencing engine and its units.
//!
//! [`ServiceError`] covers every failure the engine reports:
//!
//! - **argument/validation** errors raised synchronously by `build`/`init`,
//! - **spawn** errors when the OS refuses to create a process,
//! - **process failures** (nonzero exit) that carry the exit code,
//! - **sequencing** errors for contract violations (e.g. adding to a finished sequence).
//!
//! Failure causes are shared between a unit and every container above it,
//! so they travel as [`FailureCause`] (`Arc<ServiceError>`) and are never re-wrapped.

use std::sync::Arc;

use thiserror::Error;

use crate::service::ServiceState;

/// Shared failure cause, propagated upward unchanged.
pub type FailureCause = Arc<ServiceError>;

/// Capability of a failure (or a unit) to expose a process-style exit status.
///
/// # Example
/// ```
/// use seqvisor::{ExitCodeProvider, ServiceError};
///
/// let err = ServiceError::ProcessExited { service: "master".into(), code: 137 };
/// assert_eq!(err.exit_code(), Some(137));
///
/// let err = ServiceError::InvalidArgument { reason: "empty command".into() };
/// assert_eq!(err.exit_code(), None);
/// ```
pub trait ExitCodeProvider {
    /// Returns the exit code, if this value carries one.
    fn exit_code(&self) -> Option<i32>;
}

/// # Errors produced by services, steps and containers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A step was built with malformed arguments.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the arguments.
        reason: String,
    },

    /// Configuration rejected during `init`.
    #[error("invalid configuration {key}: {reason}")]
    Config {
        /// Offending configuration key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The OS refused to create the process.
    #[error("failed to spawn {service}: {source}")]
    Spawn {
        /// Name of the process step.
        service: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process terminated with a nonzero exit code.
    #[error("process {service} exited with code {code}")]
    ProcessExited {
        /// Name of the process step.
        service: String,
        /// Exit code (signal deaths are reported as `128 + signal`).
        code: i32,
    },

    /// An action failed and asks for a specific exit code.
    #[error("exit {code}: {reason}")]
    Exit {
        /// Requested exit code.
        code: i32,
        /// Human-readable reason.
        reason: String,
    },

    /// An action failed without an exit code.
    #[error("{service} failed: {error}")]
    Failed {
        /// Name of the failing unit.
        service: String,
        /// The underlying error message.
        error: String,
    },

    /// A lifecycle operation was invoked in a state that does not allow it.
    #[error("{service}: cannot move from {from} to {to}")]
    InvalidTransition {
        /// Name of the unit.
        service: String,
        /// Current state.
        from: ServiceState,
        /// Requested state.
        to: ServiceState,
    },

    /// A child was added to a container that already finished.
    #[error("{service} is already {state}; refusing to enqueue more work")]
    SequenceTerminated {
        /// Name of the container.
        service: String,
        /// Terminal state of the container.
        state: ServiceState,
    },

    /// A child that was already started cannot be handed to a container.
    #[error("{service}: child {child} was already started")]
    ChildAlreadyStarted {
        /// Name of the container.
        service: String,
        /// Name of the rejected child.
        child: String,
    },
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use seqvisor::ServiceError;
    ///
    /// let err = ServiceError::ProcessExited { service: "worker".into(), code: 2 };
    /// assert_eq!(err.as_label(), "process_exited");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::InvalidArgument { .. } => "invalid_argument",
            ServiceError::Config { .. } => "invalid_config",
            ServiceError::Spawn { .. } => "spawn_failed",
            ServiceError::ProcessExited { .. } => "process_exited",
            ServiceError::Exit { .. } => "exit_requested",
            ServiceError::Failed { .. } => "service_failed",
            ServiceError::InvalidTransition { .. } => "invalid_transition",
            ServiceError::SequenceTerminated { .. } => "sequence_terminated",
            ServiceError::ChildAlreadyStarted { .. } => "child_already_started",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ServiceError::InvalidArgument { reason } => format!("bad argument: {reason}"),
            ServiceError::Config { key, reason } => format!("config {key}: {reason}"),
            ServiceError::Spawn { service, source } => format!("spawn {service}: {source}"),
            ServiceError::ProcessExited { service, code } => format!("{service} exit={code}"),
            ServiceError::Exit { code, reason } => format!("exit={code}: {reason}"),
            ServiceError::Failed { service, error } => format!("{service}: {error}"),
            ServiceError::InvalidTransition { service, from, to } => {
                format!("{service}: {from} -> {to} not allowed")
            }
            ServiceError::SequenceTerminated { service, state } => {
                format!("{service} already {state}")
            }
            ServiceError::ChildAlreadyStarted { service, child } => {
                format!("{service}: {child} already started")
            }
        }
    }

    /// Indicates a programming-contract violation rather than a runtime failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidTransition { .. }
                | ServiceError::SequenceTerminated { .. }
                | ServiceError::ChildAlreadyStarted { .. }
        )
    }
}

impl ExitCodeProvider for ServiceError {
    fn exit_code(&self) -> Option<i32> {
        match self {
            ServiceError::ProcessExited { code, .. } | ServiceError::Exit { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }
}

impl<T: ExitCodeProvider + ?Sized> ExitCodeProvider for Arc<T> {
    fn exit_code(&self) -> Option<i32> {
        (**self).exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exit_bearing_variants_expose_codes() {
        let spawn = ServiceError::Spawn {
            service: "x".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(spawn.exit_code(), None);
        assert_eq!(spawn.as_label(), "spawn_failed");

        let exit = ServiceError::Exit { code: 3, reason: "no config".into() };
        assert_eq!(exit.exit_code(), Some(3));

        let shared: FailureCause = Arc::new(ServiceError::ProcessExited {
            service: "master".into(),
            code: 137,
        });
        assert_eq!(shared.exit_code(), Some(137));
    }

    #[test]
    fn contract_violations_are_flagged() {
        let err = ServiceError::SequenceTerminated {
            service: "seq".into(),
            state: ServiceState::Stopped,
        };
        assert!(err.is_contract_violation());
        assert_eq!(err.to_string(), "seq is already stopped; refusing to enqueue more work");

        let err = ServiceError::Failed { service: "a".into(), error: "boom".into() };
        assert!(!err.is_contract_violation());
    }
}
