//! Orchestration: the entry point that owns the root sequence.
//!
//! - [`orchestrator`]: queues commands, runs the sequence, handles shutdown
//! - [`builder`]: wires bus, subscribers, roles and the root sequence
//! - [`exit_code`]: resolves the exit code of a (possibly nested) sequence
//! - [`shutdown`]: OS termination signals

mod builder;
pub mod exit_code;
mod orchestrator;
mod shutdown;

pub use builder::{DEFAULT_SEQUENCE_NAME, OrchestratorBuilder};
pub use exit_code::{PROCESS_SEARCH_DEPTH, find_process, latest_process, resolve_exit_code};
pub use orchestrator::Orchestrator;
