//! # seqvisor
//!
//! **Seqvisor** runs a node agent's bootstrap as an ordered sequence of
//! steps (write config, launch master process, launch worker process) and
//! supervises the external processes it spawns.
//!
//! Each step advances only after the previous one stopped cleanly. The first
//! failure halts the sequence, and its cause (including a process exit code)
//! propagates upward unchanged so the agent can exit with the same code.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   queue_command / queue
//!            │
//!            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - root Sequence                                                  │
//! │  - exit-code resolution                                           │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//!        ┌───────────────────── Sequence ─────────────────────┐
//!        │  children[0]  ──►  children[1]  ──►  children[2]   │
//!        │  ActionStep        ProcessStep       Group         │
//!        │                    (OS child)        ├ ProcessStep │
//!        │                                      └ ActionStep  │
//!        └──────┬─────────────────────────────────────────────┘
//!               │ every unit embeds a Lifecycle:
//!               │ Created ─► Initialized ─► Started ─► Stopped | Failed
//!               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//!                    subscriber_listener ──► SubscriberSet
//!                                           ┌────┴────┐
//!                                           ▼         ▼
//!                                       LogWriter   custom
//! ```
//!
//! ### Completion flow
//! ```text
//! ProcessStep watcher ── child exits ──► Lifecycle: Stopped | Failed(ProcessExited{code})
//!                                           └─► Listener ──► Sequence notice channel
//!                                                              └─► driver: start next child
//!                                                                  or fail with the same cause
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                       |
//! |-------------------|-----------------------------------------------------------|------------------------------------------|
//! | **Lifecycle**     | Five-state machine embedded in every unit.                | [`Lifecycle`], [`ServiceState`]          |
//! | **Steps**         | External processes and async control steps.               | [`ProcessStep`], [`ActionStep`]          |
//! | **Containers**    | Ordered sequences and unordered groups.                   | [`Sequence`], [`Group`], [`Unit`]        |
//! | **Orchestration** | Queue commands, run, stop on signals, resolve exit codes. | [`Orchestrator`], [`resolve_exit_code`]  |
//! | **Events**        | Lifecycle, process and sequencing events.                 | [`Event`], [`EventKind`], [`Subscribe`]  |
//! | **Errors**        | Typed failure causes, exit-code aware.                    | [`ServiceError`], [`ExitCodeProvider`]   |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], which renders events through `tracing`.
//!
//! ## Example
//! ```no_run
//! use seqvisor::{ActionStep, Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orch = Orchestrator::builder(Config::default()).build();
//!
//!     let write_config = ActionStep::from_fn("write-config", orch.bus().clone(), |_ctx| async {
//!         Ok(())
//!     });
//!     orch.queue(write_config.into())?;
//!     orch.queue_command("master", [("HEAP", "512m")], ["bin/server", "master"])?;
//!
//!     let code = orch.run().await?;
//!     std::process::exit(code);
//! }
//! ```

mod config;
mod containers;
mod core;
mod error;
mod events;
mod provider;
mod service;
mod steps;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use containers::{Group, Sequence};
pub use crate::core::{
    DEFAULT_SEQUENCE_NAME, Orchestrator, OrchestratorBuilder, PROCESS_SEARCH_DEPTH, find_process,
    latest_process, resolve_exit_code,
};
pub use error::{ExitCodeProvider, FailureCause, ServiceError};
pub use events::{Bus, Event, EventKind};
pub use provider::{ClusterInfo, NOT_AVAILABLE, ProviderRole, command_line, info_or_na};
pub use service::{Container, Lifecycle, Service, ServiceState, Status, Unit};
pub use steps::{Action, ActionFn, ActionRef, ActionStep, EXIT_UNKNOWN, ProcessStep, RecentOutput};
pub use subscribers::{Subscribe, SubscriberSet};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
