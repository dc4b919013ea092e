#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use seqvisor::{
    ActionStep, Config, Container, ExitCodeProvider, Group, Orchestrator, Sequence, Service,
    ServiceError, ServiceState, Unit, latest_process, resolve_exit_code,
};
use tokio_util::sync::CancellationToken;

const NO_ENV: [(&str, &str); 0] = [];

fn sh(script: &str) -> [String; 3] {
    ["sh".into(), "-c".into(), script.into()]
}

async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

async fn finished(orch: &Orchestrator) -> i32 {
    tokio::time::timeout(Duration::from_secs(10), orch.wait())
        .await
        .expect("sequence did not finish")
}

#[tokio::test]
async fn master_exit_code_becomes_agent_exit_code() {
    let orch = Orchestrator::builder(Config::default()).build();
    let config = ActionStep::from_fn("config", orch.bus().clone(), |_ctx| async { Ok(()) });
    orch.queue(config.clone().into()).unwrap();
    let master = orch.queue_command("master", NO_ENV, sh("exit 137")).unwrap();
    let worker = orch.queue_command("worker", NO_ENV, sh("exit 0")).unwrap();

    orch.init().unwrap();
    orch.start().unwrap();
    assert_eq!(finished(&orch).await, 137);

    assert_eq!(config.state(), ServiceState::Stopped);
    assert_eq!(master.state(), ServiceState::Failed);
    assert_eq!(master.exit_code(), Some(137));
    assert_eq!(worker.state(), ServiceState::Initialized);
    assert!(worker.pid().is_none());
    assert_eq!(orch.state(), ServiceState::Failed);

    let cause = orch.failure_cause().unwrap();
    assert!(Arc::ptr_eq(&cause, &master.failure_cause().unwrap()));
    assert_eq!(cause.exit_code(), Some(137));
}

#[tokio::test]
async fn all_steps_succeeding_exits_zero() {
    let orch = Orchestrator::builder(Config::default()).build();
    let a = orch.queue_command("a", NO_ENV, sh("exit 0")).unwrap();
    let b = orch.queue_command("b", NO_ENV, sh("echo done")).unwrap();

    orch.init().unwrap();
    orch.start().unwrap();
    assert_eq!(finished(&orch).await, 0);

    assert_eq!(a.state(), ServiceState::Stopped);
    assert_eq!(b.state(), ServiceState::Stopped);
    eventually(|| b.recent_output() == vec!["done".to_string()]).await;
    assert_eq!(orch.latest_process().unwrap().name(), "b");
}

#[tokio::test]
async fn empty_sequence_stops_and_rejects_later_steps() {
    let orch = Orchestrator::builder(Config::default()).build();
    orch.init().unwrap();
    orch.start().unwrap();

    assert_eq!(orch.state(), ServiceState::Stopped);
    assert_eq!(orch.exit_code(), 0);

    let err = orch.queue_command("late", NO_ENV, sh("exit 0")).unwrap_err();
    assert!(matches!(err, ServiceError::SequenceTerminated { state: ServiceState::Stopped, .. }));
}

#[tokio::test]
async fn adding_after_completion_is_an_error() {
    let orch = Orchestrator::builder(Config::default()).build();
    orch.queue_command("a", NO_ENV, sh("exit 0")).unwrap();
    orch.init().unwrap();
    orch.start().unwrap();
    assert_eq!(finished(&orch).await, 0);

    let err = orch.queue_command("b", NO_ENV, sh("exit 0")).unwrap_err();
    assert_eq!(err.as_label(), "sequence_terminated");
    assert_eq!(orch.sequence().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn queueing_while_idle_starts_in_the_same_tick() {
    let orch = Orchestrator::builder(Config::default()).build();
    let gate = ActionStep::from_fn("gate", orch.bus().clone(), |ctx: CancellationToken| async move {
        ctx.cancelled().await;
        Ok(())
    });
    orch.queue(gate.clone().into()).unwrap();
    orch.init().unwrap();
    orch.start().unwrap();
    assert_eq!(gate.state(), ServiceState::Started);

    gate.stop();
    let next = orch.queue_command("next", NO_ENV, sh("exit 0")).unwrap();
    assert_eq!(next.state(), ServiceState::Started);
    assert!(next.pid().is_some());

    assert_eq!(finished(&orch).await, 0);
}

#[tokio::test]
async fn queueing_before_start_waits() {
    let orch = Orchestrator::builder(Config::default()).build();
    let step = orch.queue_command("early", NO_ENV, sh("exit 3")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(step.state(), ServiceState::Initialized);
    assert!(step.exit_code().is_none());

    orch.init().unwrap();
    orch.start().unwrap();
    assert_eq!(finished(&orch).await, 3);
}

#[tokio::test]
async fn process_inside_group_is_found_one_level_down() {
    let orch = Orchestrator::builder(Config::default()).build();
    let group = Group::arc("roles", orch.bus().clone());
    let inner = orch.build_process("region", NO_ENV, sh("exit 5")).unwrap();
    group.add(inner.clone().into()).unwrap();
    orch.queue(group.into()).unwrap();

    orch.init().unwrap();
    orch.start().unwrap();
    assert_eq!(finished(&orch).await, 5);
    assert_eq!(orch.latest_process().unwrap().name(), "region");
}

#[tokio::test]
async fn process_two_levels_down_is_not_found() {
    let bus = seqvisor::Bus::new(64);
    let inner = Group::arc("inner", bus.clone());
    let outer = Group::arc("outer", bus.clone());
    let deep = seqvisor::ProcessStep::arc("deep", bus.clone());
    deep.build(NO_ENV, sh("exit 0")).unwrap();
    inner.add(deep.into()).unwrap();
    outer.add(inner.into()).unwrap();

    let seq = Sequence::arc("seq", bus);
    seq.add(outer.into()).unwrap();
    seq.init(&Config::default()).unwrap();
    seq.start().unwrap();
    assert_eq!(seq.lifecycle().wait().await, ServiceState::Stopped);

    assert!(latest_process(&seq).is_none());
    assert_eq!(resolve_exit_code(&seq), 0);
}

#[tokio::test]
async fn stopping_kills_the_active_process() {
    let orch = Orchestrator::builder(Config::default()).build();
    let sleeper = orch.queue_command("sleeper", NO_ENV, sh("sleep 30")).unwrap();
    let after = orch.queue_command("after", NO_ENV, sh("exit 0")).unwrap();
    orch.init().unwrap();
    orch.start().unwrap();
    assert!(sleeper.pid().is_some());

    orch.stop();
    assert_eq!(orch.state(), ServiceState::Stopped);
    assert_eq!(sleeper.state(), ServiceState::Stopped);
    assert_eq!(after.state(), ServiceState::Stopped);
    assert!(after.pid().is_none());

    let code = tokio::time::timeout(Duration::from_secs(5), sleeper.wait_exit())
        .await
        .unwrap();
    assert_eq!(code, Some(137));
}

#[tokio::test]
async fn nested_sequence_failure_propagates_unchanged() {
    let orch = Orchestrator::builder(Config::default()).build();
    let nested = Sequence::arc("nested", orch.bus().clone());
    let failing = orch.build_process("inner", NO_ENV, sh("exit 9")).unwrap();
    nested.add(failing.clone().into()).unwrap();
    let unit: Unit = nested.clone().into();
    orch.queue(unit).unwrap();

    orch.init().unwrap();
    orch.start().unwrap();
    assert_eq!(finished(&orch).await, 9);

    assert_eq!(nested.state(), ServiceState::Failed);
    let cause = orch.failure_cause().unwrap();
    assert!(Arc::ptr_eq(&cause, &failing.failure_cause().unwrap()));
}

#[tokio::test]
async fn shutdown_reports_the_killed_process_code() {
    let orch = Orchestrator::builder(Config::default()).build();
    let sleeper = orch.queue_command("sleeper", NO_ENV, sh("sleep 30")).unwrap();
    orch.init().unwrap();
    orch.start().unwrap();
    assert!(sleeper.pid().is_some());

    let code = tokio::time::timeout(Duration::from_secs(5), orch.shutdown())
        .await
        .unwrap();
    assert_eq!(code, 137);
    assert_eq!(sleeper.exit_code(), Some(137));
    assert_eq!(orch.state(), ServiceState::Stopped);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(orch.exit_code(), code);
}

#[tokio::test]
async fn spawn_error_halts_the_sequence() {
    let orch = Orchestrator::builder(Config::default()).build();
    let first = orch.queue_command("first", NO_ENV, sh("exit 0")).unwrap();
    let missing = orch
        .queue_command("missing", NO_ENV, ["/nonexistent/bin"])
        .unwrap();
    let later = orch.queue_command("later", NO_ENV, sh("exit 0")).unwrap();

    orch.init().unwrap();
    orch.start().unwrap();
    assert_eq!(finished(&orch).await, 0);

    assert_eq!(first.state(), ServiceState::Stopped);
    assert_eq!(missing.state(), ServiceState::Failed);
    assert!(missing.pid().is_none());
    assert_eq!(later.state(), ServiceState::Initialized);
    assert!(later.pid().is_none());

    assert_eq!(orch.state(), ServiceState::Failed);
    let cause = orch.failure_cause().unwrap();
    assert!(matches!(*cause, ServiceError::Spawn { .. }));
    assert_eq!(cause.exit_code(), None);
    assert_eq!(orch.latest_process().unwrap().name(), "missing");
    assert_eq!(resolve_exit_code(orch.sequence()), 0);
}
