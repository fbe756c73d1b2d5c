//! `flowmatch-matching`: pairwise need/capacity compatibility.
//!
//! A match requires, in order: agreeing resource types, overlapping time
//! (`flowmatch-availability`), compatible locations (`flowmatch-spatial`), satisfied
//! flow constraints, bidirectional skills, and eligibility filters that admit both parties.
//! Slots can also be bucketed by space-time signature and matched in batches.

pub mod batch;
pub mod context;
pub mod error;
pub mod filter;
pub mod flow;
pub mod grouping;
pub mod matcher;
pub mod skills;
pub mod slot;

pub use batch::{BatchMatch, match_batch};
pub use context::{MatchContext, MatchDefaults, Participant};
pub use error::FilterEvaluationError;
pub use filter::{
    CompareOp, Expr, FilterContext, FilterRule, evaluate_eligibility_filter, evaluate_eligibility_json,
    evaluate_filter,
};
pub use flow::{FlowCheck, FlowConstraintKind, check_flow_constraints, check_flow_constraints_detailed};
pub use grouping::{
    SpaceTimeGroup, get_space_time_signature, group_slots_by_space_time, location_signature,
    time_signature,
};
pub use matcher::{
    MatchBreakdown, MatchScore, match_breakdown, resource_types_agree, score_match, slots_compatible,
};
pub use skills::skills_compatible;
pub use slot::{FlowConstraints, Slot};
