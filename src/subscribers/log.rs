//! # LogWriter: events as `tracing` records.
//!
//! Maps each [`Event`] to one structured record. Lifecycle failures and
//! process deaths are `warn`, output lines are `trace`, the rest `info`.
//! Install any `tracing` subscriber to see them.

use async_trait::async_trait;
use tracing::{info, trace, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let service = e.service.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ServiceInited | EventKind::ServiceStarted | EventKind::ServiceStopped => {
                info!(seq = e.seq, service, state = ?e.state, "lifecycle");
            }
            EventKind::ServiceFailed => {
                warn!(seq = e.seq, service, exit_code = ?e.exit_code, reason, "service failed");
            }
            EventKind::ProcessSpawned => {
                info!(seq = e.seq, service, pid = ?e.pid, "process spawned");
            }
            EventKind::ProcessOutput => {
                trace!(service, "{reason}");
            }
            EventKind::ProcessExited => match e.exit_code {
                Some(0) => info!(seq = e.seq, service, "process exited cleanly"),
                code => warn!(seq = e.seq, service, exit_code = ?code, "process exited"),
            },
            EventKind::ProcessKilled => {
                warn!(seq = e.seq, service, pid = ?e.pid, "process killed");
            }
            EventKind::StepQueued => {
                info!(seq = e.seq, service, step = reason, index = ?e.index, "step queued");
            }
            EventKind::StepStarting => {
                info!(seq = e.seq, service, step = reason, index = ?e.index, "step starting");
            }
            EventKind::ShutdownRequested => {
                warn!(seq = e.seq, service, "shutdown requested");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(seq = e.seq, subscriber = service, reason, kind = ?e.kind, "subscriber trouble");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
