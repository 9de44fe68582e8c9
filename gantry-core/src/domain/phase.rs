//! Stage and Task phases
//!
//! Phases only move forward: an unset phase may become anything, `InProgress`
//! may become a terminal phase, and terminal phases never change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution phase shared by Stages and Tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    InProgress,
    Error,
    Complete,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Error | Phase::Complete)
    }

    /// Whether moving from `current` to `next` respects monotonicity.
    ///
    /// Staying in the same phase is allowed (it is a no-op).
    pub fn can_transition(current: Option<Phase>, next: Phase) -> bool {
        match current {
            None => true,
            Some(Phase::InProgress) => true,
            Some(terminal) => terminal == next,
        }
    }

    /// Returns the phase to write, or `None` when nothing should be written
    /// (unchanged, or the move would regress).
    pub fn advance(current: Option<Phase>, next: Phase) -> Option<Phase> {
        if current == Some(next) || !Self::can_transition(current, next) {
            None
        } else {
            Some(next)
        }
    }

    /// Aggregates child phases into a parent phase.
    ///
    /// Any `Error` wins, then anything not yet complete (including unset)
    /// keeps the parent `InProgress`. No children means `Complete`.
    pub fn aggregate<I>(phases: I) -> Phase
    where
        I: IntoIterator<Item = Option<Phase>>,
    {
        let mut pending = false;
        for phase in phases {
            match phase {
                Some(Phase::Error) => return Phase::Error,
                Some(Phase::Complete) => {}
                Some(Phase::InProgress) | None => pending = true,
            }
        }
        if pending {
            Phase::InProgress
        } else {
            Phase::Complete
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::InProgress => "InProgress",
            Phase::Error => "Error",
            Phase::Complete => "Complete",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_from_unset() {
        assert_eq!(Phase::advance(None, Phase::InProgress), Some(Phase::InProgress));
        assert_eq!(Phase::advance(None, Phase::Complete), Some(Phase::Complete));
    }

    #[test]
    fn test_advance_unchanged_is_noop() {
        assert_eq!(Phase::advance(Some(Phase::InProgress), Phase::InProgress), None);
        assert_eq!(Phase::advance(Some(Phase::Complete), Phase::Complete), None);
    }

    #[test]
    fn test_terminal_phases_never_regress() {
        assert_eq!(Phase::advance(Some(Phase::Complete), Phase::InProgress), None);
        assert_eq!(Phase::advance(Some(Phase::Error), Phase::Complete), None);
        assert_eq!(Phase::advance(Some(Phase::Complete), Phase::Error), None);
    }

    #[test]
    fn test_aggregate() {
        assert_eq!(Phase::aggregate(Vec::new()), Phase::Complete);
        assert_eq!(
            Phase::aggregate(vec![Some(Phase::Complete), Some(Phase::Complete)]),
            Phase::Complete
        );
        assert_eq!(
            Phase::aggregate(vec![Some(Phase::Complete), None]),
            Phase::InProgress
        );
        assert_eq!(
            Phase::aggregate(vec![Some(Phase::InProgress), Some(Phase::Error)]),
            Phase::Error
        );
    }
}
