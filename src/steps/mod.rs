//! # Leaf units.
//!
//! - [`ProcessStep`] spawns and supervises one external OS process
//! - [`ActionStep`] runs an async [`Action`] (plain control step)
//! - [`RecentOutput`] bounded buffer of a process's latest output lines

mod action;
mod output;
mod process;

pub use action::{Action, ActionFn, ActionRef, ActionStep};
pub use output::RecentOutput;
pub use process::{EXIT_UNKNOWN, ProcessStep};
