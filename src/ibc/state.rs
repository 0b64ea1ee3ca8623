//! Two-phase resumable index-build state machine,
//! modeled as a sum type rather than a bag of booleans so each phase
//! pins down one axis of state as a closed set of variants instead of
//! loose flags.

use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// One step of the build. Transitions only ever move forward through
/// the listed order, except that any phase before `Committed` can jump
/// to `CleanupAborted`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildPhase {
    /// The build is recorded in the coordinator but has not started
    /// scanning yet.
    Registered,
    /// Collection scan + bulk load underway.
    Scanning,
    /// First side-table drain: catches writes that raced the initial
    /// scan.
    Drain1,
    /// Second side-table drain: catches writes that raced drain 1.
    Drain2,
    /// Waiting for the commit signal (e.g. replication commit quorum).
    AwaitingCommit,
    /// Final side-table drain taken under the commit lock, after which
    /// the index is indistinguishable from one built inline.
    Drain3,
    /// The index is ready and visible.
    Committed,
    /// The empty-collection fast path skipped scanning/draining
    /// entirely.
    CompleteEarly,
    /// The build was aborted; `reason` is surfaced to the caller that
    /// issued the original `createIndexes` command.
    CleanupAborted(String),
}

impl BuildPhase {
    fn ordinal(&self) -> u8 {
        match self {
            BuildPhase::Registered => 0,
            BuildPhase::Scanning => 1,
            BuildPhase::Drain1 => 2,
            BuildPhase::Drain2 => 3,
            BuildPhase::AwaitingCommit => 4,
            BuildPhase::Drain3 => 5,
            BuildPhase::Committed => 6,
            BuildPhase::CompleteEarly => 7,
            BuildPhase::CleanupAborted(_) => 8,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, BuildPhase::Committed | BuildPhase::CompleteEarly | BuildPhase::CleanupAborted(_))
    }

    fn can_advance_to(&self, next: &BuildPhase) -> bool {
        if matches!(next, BuildPhase::CleanupAborted(_)) {
            return !self.is_terminal();
        }
        match (self, next) {
            (BuildPhase::Registered, BuildPhase::Scanning) => true,
            (BuildPhase::Registered, BuildPhase::CompleteEarly) => true,
            (BuildPhase::Scanning, BuildPhase::Drain1) => true,
            (BuildPhase::Drain1, BuildPhase::Drain2) => true,
            (BuildPhase::Drain2, BuildPhase::AwaitingCommit) => true,
            (BuildPhase::AwaitingCommit, BuildPhase::Drain3) => true,
            (BuildPhase::Drain3, BuildPhase::Committed) => true,
            _ => false,
        }
    }
}

/// One build's full bookkeeping record: identity, target indexes, and current phase.
pub struct ReplIndexBuildState {
    pub build_uuid: String,
    pub collection: String,
    pub index_names: Vec<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    phase: RwLock<BuildPhase>,
}

impl ReplIndexBuildState {
    pub fn new(build_uuid: String, collection: String, index_names: Vec<String>) -> Arc<ReplIndexBuildState> {
        Arc::new(ReplIndexBuildState {
            build_uuid,
            collection,
            index_names,
            started_at: chrono::Utc::now(),
            phase: RwLock::new(BuildPhase::Registered),
        })
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase.read().unwrap().clone()
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.phase(), BuildPhase::CleanupAborted(_))
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase(), BuildPhase::Committed | BuildPhase::CompleteEarly)
    }

    /// Advance to `next`, rejecting any transition not legal from the
    /// current phase.
    pub fn transition(&self, next: BuildPhase) -> Result<()> {
        let mut phase = self.phase.write().unwrap();
        if !phase.can_advance_to(&next) {
            return Err(Error::IndexBuildAborted(format!(
                "illegal index build transition for '{}': {:?} -> {:?}",
                self.build_uuid, *phase, next
            )));
        }
        log::debug!("build {} on '{}': {:?} -> {:?}", self.build_uuid, self.collection, *phase, next);
        *phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_in_order() {
        let state = ReplIndexBuildState::new("u1".into(), "coll".into(), vec!["a_1".into()]);
        for next in [
            BuildPhase::Scanning,
            BuildPhase::Drain1,
            BuildPhase::Drain2,
            BuildPhase::AwaitingCommit,
            BuildPhase::Drain3,
            BuildPhase::Committed,
        ] {
            state.transition(next).unwrap();
        }
        assert!(state.is_complete());
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let state = ReplIndexBuildState::new("u1".into(), "coll".into(), vec!["a_1".into()]);
        state.transition(BuildPhase::Scanning).unwrap();
        assert!(state.transition(BuildPhase::AwaitingCommit).is_err());
    }

    #[test]
    fn abort_reachable_from_any_nonterminal_phase() {
        let state = ReplIndexBuildState::new("u1".into(), "coll".into(), vec!["a_1".into()]);
        state.transition(BuildPhase::Scanning).unwrap();
        state.transition(BuildPhase::CleanupAborted("killed".into())).unwrap();
        assert!(state.is_aborted());
    }

    #[test]
    fn complete_early_skips_the_drain_phases() {
        let state = ReplIndexBuildState::new("u1".into(), "coll".into(), vec!["a_1".into()]);
        state.transition(BuildPhase::CompleteEarly).unwrap();
        assert!(state.is_complete());
    }
}
