//! Assertion phases and the forward-only phase graph.
//!
//! ```text
//! projected → pending → judged(accepted) → propagated
//!                     ↘ judged(rejected)
//!                     ↘ judged(modified)   (only via a superseding append)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    Accepted,
    Rejected,
    Modified,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", content = "outcome", rename_all = "snake_case")]
pub enum AssertionPhase {
    Projected,
    Pending,
    Judged(Judgment),
    Propagated,
}

impl AssertionPhase {
    pub const ACCEPTED: AssertionPhase = AssertionPhase::Judged(Judgment::Accepted);
    pub const REJECTED: AssertionPhase = AssertionPhase::Judged(Judgment::Rejected);
    pub const MODIFIED: AssertionPhase = AssertionPhase::Judged(Judgment::Modified);

    /// Whether an entry in this phase contributes to derived state.
    pub fn is_effective(self) -> bool {
        matches!(self, AssertionPhase::ACCEPTED | AssertionPhase::Propagated)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AssertionPhase::REJECTED | AssertionPhase::MODIFIED | AssertionPhase::Propagated
        )
    }

    /// Edges of the phase graph.
    pub fn can_transition_to(self, next: AssertionPhase) -> bool {
        matches!(
            (self, next),
            (AssertionPhase::Projected, AssertionPhase::Pending)
                | (AssertionPhase::Pending, AssertionPhase::Judged(_))
                | (AssertionPhase::ACCEPTED, AssertionPhase::Propagated)
        )
    }
}

impl core::fmt::Display for AssertionPhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AssertionPhase::Projected => f.write_str("projected"),
            AssertionPhase::Pending => f.write_str("pending"),
            AssertionPhase::Judged(Judgment::Accepted) => f.write_str("judged(accepted)"),
            AssertionPhase::Judged(Judgment::Rejected) => f.write_str("judged(rejected)"),
            AssertionPhase::Judged(Judgment::Modified) => f.write_str("judged(modified)"),
            AssertionPhase::Propagated => f.write_str("propagated"),
        }
    }
}

/// One step of an entry's phase history.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub phase: AssertionPhase,
    /// Knowledge time at which the phase took effect.
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AssertionPhase; 6] = [
        AssertionPhase::Projected,
        AssertionPhase::Pending,
        AssertionPhase::ACCEPTED,
        AssertionPhase::REJECTED,
        AssertionPhase::MODIFIED,
        AssertionPhase::Propagated,
    ];

    #[test]
    fn graph_is_forward_only() {
        use AssertionPhase::*;
        assert!(Projected.can_transition_to(Pending));
        assert!(Pending.can_transition_to(AssertionPhase::ACCEPTED));
        assert!(Pending.can_transition_to(AssertionPhase::REJECTED));
        assert!(AssertionPhase::ACCEPTED.can_transition_to(Propagated));

        assert!(!Pending.can_transition_to(Projected));
        assert!(!Projected.can_transition_to(AssertionPhase::ACCEPTED));
        assert!(!AssertionPhase::REJECTED.can_transition_to(Propagated));
        assert!(!Pending.can_transition_to(Propagated));
    }

    #[test]
    fn terminal_phases_have_no_exits() {
        for from in ALL.into_iter().filter(|p| p.is_terminal()) {
            assert!(ALL.iter().all(|to| !from.can_transition_to(*to)), "{from} has an exit");
        }
    }

    #[test]
    fn only_accepted_and_propagated_are_effective() {
        let effective: Vec<_> = ALL.into_iter().filter(|p| p.is_effective()).collect();
        assert_eq!(effective, vec![AssertionPhase::ACCEPTED, AssertionPhase::Propagated]);
    }
}
