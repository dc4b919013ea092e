use std::sync::Arc;

use crate::config::Config;
use crate::containers::Sequence;
use crate::events::Bus;
use crate::provider::ProviderRole;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::orchestrator::Orchestrator;

/// Name of the root sequence unless overridden.
pub const DEFAULT_SEQUENCE_NAME: &str = "commands";

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    cfg: Config,
    name: String,
    subscribers: Vec<Arc<dyn Subscribe>>,
    roles: Vec<ProviderRole>,
}

impl OrchestratorBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            name: DEFAULT_SEQUENCE_NAME.to_string(),
            subscribers: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// Names the root sequence.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Event subscribers; each gets its own worker and bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Roles this provider can launch.
    pub fn with_roles(mut self, roles: Vec<ProviderRole>) -> Self {
        self.roles = roles;
        self
    }

    /// Wires the bus, subscriber workers and root sequence.
    ///
    /// Must be called within a Tokio runtime.
    pub fn build(self) -> Arc<Orchestrator> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let sequence = Sequence::arc(self.name, bus.clone());

        let orchestrator = Arc::new(Orchestrator::new_internal(
            self.cfg, bus, subs, sequence, self.roles,
        ));
        orchestrator.subscriber_listener();
        orchestrator
    }
}
