//! Service abstraction: lifecycle state machine and capability traits.
//!
//! ## Contents
//! - [`ServiceState`] the five lifecycle states and the allowed transitions
//! - [`Lifecycle`] the state machine embedded in every unit
//! - [`Unit`] tagged variant over the child kinds a container may hold
//! - [`Service`] / [`Container`] capability traits implemented by units
//!
//! Exit-code capability lives in [`ExitCodeProvider`](crate::ExitCodeProvider).

mod lifecycle;
mod state;
mod unit;

use std::sync::{Arc, Mutex, MutexGuard};

pub use lifecycle::{Lifecycle, Status};
pub(crate) use lifecycle::Listener;
pub use state::ServiceState;
pub use unit::Unit;

use crate::config::Config;
use crate::error::{FailureCause, ServiceError};

/// A startable unit of work.
///
/// Implementors embed a [`Lifecycle`] and expose it through [`Service::lifecycle`];
/// the provided methods read state from it.
///
/// ### Contract
/// - `init` validates configuration and moves Created → Initialized.
/// - `start` begins the work and returns immediately; completion is
///   observed through the lifecycle (`wait`, container notices, events).
/// - `stop` releases owned resources and moves to Stopped; it is idempotent.
///
/// `start` spawns background work and must be called from within a Tokio runtime.
pub trait Service: Send + Sync + 'static {
    /// Embedded state machine.
    fn lifecycle(&self) -> &Lifecycle;

    /// Validates `cfg` and moves Created → Initialized.
    fn init(&self, cfg: &Config) -> Result<(), ServiceError>;

    /// Moves Initialized → Started and begins the unit's work.
    fn start(self: &Arc<Self>) -> Result<(), ServiceError>;

    /// Stops the unit, releasing its resources.
    fn stop(&self);

    /// Unit name.
    fn name(&self) -> &str {
        self.lifecycle().name()
    }

    /// Current lifecycle state.
    fn state(&self) -> ServiceState {
        self.lifecycle().state()
    }

    /// Cause recorded when the unit failed.
    fn failure_cause(&self) -> Option<FailureCause> {
        self.lifecycle().failure_cause()
    }
}

/// A unit that owns children.
pub trait Container {
    /// Adopts `child`.
    fn add(&self, child: Unit) -> Result<(), ServiceError>;

    /// Snapshot of the direct children, in insertion order.
    fn children(&self) -> Vec<Unit>;
}

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
