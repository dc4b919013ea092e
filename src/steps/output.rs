//! Process output capture.
//!
//! Each spawned process gets one pump per piped stream. Lines are logged
//! through `tracing`, published as `ProcessOutput` events and retained in a
//! bounded [`RecentOutput`] buffer for diagnostics after a failure.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

use crate::events::{Bus, Event, EventKind};
use crate::service::lock;

/// Bounded ring of the most recent output lines.
#[derive(Debug)]
pub struct RecentOutput {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl RecentOutput {
    /// Ring keeping at most `capacity` lines; `0` keeps none.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Appends `line`, evicting the oldest one when full.
    pub fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = lock(&self.lines);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        lock(&self.lines).iter().cloned().collect()
    }
}

/// Reads `reader` line by line until EOF.
pub(crate) async fn pump<R>(
    reader: R,
    service: Arc<str>,
    stream: &'static str,
    recent: Arc<RecentOutput>,
    bus: Bus,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(service = %service, stream, "{line}");
                bus.publish(
                    Event::new(EventKind::ProcessOutput)
                        .with_service(Arc::clone(&service))
                        .with_reason(line.as_str()),
                );
                recent.push(line);
            }
            Ok(None) => break,
            Err(err) => {
                debug!(service = %service, stream, error = %err, "output stream closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_latest_lines() {
        let recent = RecentOutput::new(2);
        for line in ["a", "b", "c"] {
            recent.push(line.to_string());
        }
        assert_eq!(recent.snapshot(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let recent = RecentOutput::new(0);
        recent.push("ignored".into());
        assert!(recent.snapshot().is_empty());
    }

    #[tokio::test]
    async fn pump_reads_until_eof() {
        let recent = Arc::new(RecentOutput::new(8));
        let input: &[u8] = b"starting master\nlistening on 60000\n";
        pump(input, "master".into(), "stdout", Arc::clone(&recent), Bus::new(8)).await;
        assert_eq!(recent.snapshot(), vec!["starting master", "listening on 60000"]);
    }
}
