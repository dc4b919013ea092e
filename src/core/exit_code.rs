//! # Exit-code resolution.
//!
//! Turns a finished (or running) sequence into the integer a launcher should
//! exit with.
//!
//! ## Precedence
//! ```text
//! 1. sequence failure cause carries a code      ──► that code
//! 2. latest process (active, else previous)     ──► its exit code, 0 while unknown
//! 3. otherwise                                  ──► 0
//! ```
//!
//! "Latest process" is found by looking at the sequence's current-or-previous
//! child: a process step directly, or a process inside a group/sequence at most
//! [`PROCESS_SEARCH_DEPTH`] levels down. Deeper nesting is not searched.

use std::sync::Arc;

use crate::containers::Sequence;
use crate::error::ExitCodeProvider;
use crate::service::{Service, Unit};
use crate::steps::ProcessStep;

/// How many container levels below the current child are searched for a process.
pub const PROCESS_SEARCH_DEPTH: usize = 1;

/// First process step found in `unit`, descending at most `depth` container levels.
///
/// Children are searched in insertion order.
pub fn find_process(unit: &Unit, depth: usize) -> Option<Arc<ProcessStep>> {
    match unit {
        Unit::Process(p) => Some(Arc::clone(p)),
        Unit::Action(_) => None,
        Unit::Group(_) | Unit::Sequence(_) if depth == 0 => None,
        container => container
            .children()?
            .iter()
            .find_map(|child| find_process(child, depth - 1)),
    }
}

/// Process step associated with the sequence's current or previous child.
pub fn latest_process(seq: &Sequence) -> Option<Arc<ProcessStep>> {
    seq.current_or_previous()
        .and_then(|unit| find_process(&unit, PROCESS_SEARCH_DEPTH))
}

/// Exit code a launcher should report for `seq`.
pub fn resolve_exit_code(seq: &Sequence) -> i32 {
    if let Some(code) = seq.lifecycle().exit_code() {
        return code;
    }
    match latest_process(seq) {
        Some(process) => process.exit_code().unwrap_or(0),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::containers::Group;
    use crate::error::ServiceError;
    use crate::events::Bus;
    use crate::service::Container;
    use crate::steps::ActionStep;

    fn bus() -> Bus {
        Bus::new(64)
    }

    fn process(name: &str) -> Arc<ProcessStep> {
        let p = ProcessStep::arc(name, bus());
        p.build(Vec::<(String, String)>::new(), ["true"]).unwrap();
        p
    }

    #[test]
    fn finds_process_one_level_down() {
        let group = Group::arc("g", bus());
        group.add(ActionStep::from_fn("a", bus(), |_| async { Ok(()) }).into()).unwrap();
        group.add(process("inner").into()).unwrap();

        let found = find_process(&group.into(), PROCESS_SEARCH_DEPTH).unwrap();
        assert_eq!(found.name(), "inner");
    }

    #[test]
    fn does_not_search_two_levels_down() {
        let inner = Group::arc("inner", bus());
        inner.add(process("deep").into()).unwrap();
        let outer = Group::arc("outer", bus());
        outer.add(inner.into()).unwrap();

        assert!(find_process(&outer.into(), PROCESS_SEARCH_DEPTH).is_none());
    }

    #[test]
    fn unstarted_sequence_resolves_to_zero() {
        let seq = Sequence::arc("seq", bus());
        seq.add(process("p").into()).unwrap();
        assert_eq!(resolve_exit_code(&seq), 0);
        assert!(latest_process(&seq).is_none());
    }

    #[tokio::test]
    async fn failure_cause_wins() {
        let seq = Sequence::arc("seq", bus());
        seq.add(
            ActionStep::from_fn("gate", bus(), |_| async {
                Err(ServiceError::Exit { code: 42, reason: "refused".into() })
            })
            .into(),
        )
        .unwrap();
        seq.init(&Config::default()).unwrap();
        seq.start().unwrap();
        seq.lifecycle().wait().await;

        assert_eq!(resolve_exit_code(&seq), 42);
    }
}
