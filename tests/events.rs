#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use seqvisor::{Config, Event, EventKind, Orchestrator, Subscribe};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn kinds_for(&self, service: &str) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.service.as_deref() == Some(service))
            .map(|e| e.kind)
            .collect()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.events.lock().unwrap().push(ev.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn subscribers_see_process_lifecycle() {
    let recorder = Arc::new(Recorder::default());
    let sub: Arc<dyn Subscribe> = recorder.clone();
    let orch = Orchestrator::builder(Config::default())
        .with_subscribers(vec![sub])
        .build();

    let step = orch
        .queue_command("master", [("GREETING", "hello")], ["sh", "-c", "echo $GREETING; exit 2"])
        .unwrap();
    orch.init().unwrap();
    orch.start().unwrap();
    let code = tokio::time::timeout(Duration::from_secs(10), orch.wait())
        .await
        .unwrap();
    assert_eq!(code, 2);

    // Output pumps and subscriber delivery run asynchronously.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(step.recent_output(), vec!["hello".to_string()]);

    let kinds = recorder.kinds_for("master");
    for expected in [
        EventKind::ServiceInited,
        EventKind::ServiceStarted,
        EventKind::ProcessSpawned,
        EventKind::ProcessExited,
        EventKind::ServiceFailed,
    ] {
        assert!(kinds.contains(&expected), "missing {expected:?} in {kinds:?}");
    }

    let events = recorder.events.lock().unwrap();
    let exited = events
        .iter()
        .find(|e| e.kind == EventKind::ProcessExited)
        .unwrap();
    assert_eq!(exited.exit_code, Some(2));

    let spawned = events
        .iter()
        .find(|e| e.kind == EventKind::ProcessSpawned)
        .unwrap();
    assert_eq!(spawned.reason.as_deref(), Some("sh -c echo $GREETING; exit 2"));

    let queued = events
        .iter()
        .find(|e| e.kind == EventKind::StepQueued)
        .unwrap();
    assert_eq!(queued.reason.as_deref(), Some("master"));
    assert_eq!(queued.index, Some(0));

    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    assert_eq!(seqs, sorted);
}
