//! Pairwise need/capacity matching.
//!
//! Constraint categories are checked in a fixed order; the boolean and scored matchers
//! stop at the first failing category, the breakdown evaluates all of them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use flowmatch_availability::time_ranges_overlap;
use flowmatch_spatial::{LocationVerdict, assess_locations};

use crate::context::{MatchContext, Participant};
use crate::filter::{FilterContext, evaluate_eligibility_filter};
use crate::flow::{FlowCheck, check_flow_constraints, check_flow_constraints_detailed};
use crate::skills::skills_compatible;
use crate::slot::Slot;

pub const REASON_RESOURCE_TYPE: &str = "resource types differ";
pub const REASON_TIME: &str = "time ranges do not overlap";
pub const REASON_LOCATION: &str = "locations not compatible";
pub const REASON_FLOW: &str = "flow constraints not met";
pub const REASON_SKILLS: &str = "skills not compatible";
pub const REASON_ELIGIBILITY: &str = "eligibility filter denied";
pub const REASON_COMPATIBLE: &str = "compatible";

/// `{value: 0|1, reason}`; the reason names the first failing category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub value: u8,
    pub reason: String,
}

impl MatchScore {
    fn pass() -> Self {
        Self {
            value: 1,
            reason: REASON_COMPATIBLE.to_string(),
        }
    }

    fn fail(reason: &str) -> Self {
        Self {
            value: 0,
            reason: reason.to_string(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.value == 1
    }
}

/// Every category, evaluated without short-circuiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchBreakdown {
    pub resource_type: bool,
    pub time: bool,
    pub location: LocationVerdict,
    pub flow: Vec<FlowCheck>,
    pub skills: bool,
    pub eligibility: bool,
    pub score: MatchScore,
}

/// Types agree when either side leaves its type undeclared.
pub fn resource_types_agree(need: &Slot, capacity: &Slot) -> bool {
    match (need.resource_type(), capacity.resource_type()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => true,
    }
}

fn context_of<'a>(party: Option<&'a Participant>, empty: &'a FilterContext) -> &'a FilterContext {
    party.map_or(empty, |p| &p.filter_context)
}

/// Each side's rule is evaluated against the other side's party. A missing party has an
/// empty context, so any rule reading a variable denies.
pub fn eligibility_allows(need: &Slot, capacity: &Slot, ctx: &MatchContext) -> bool {
    let empty = FilterContext::default();
    let capacity_admits = capacity.eligibility.as_ref().is_none_or(|rule| {
        evaluate_eligibility_filter(rule, context_of(ctx.need_party.as_ref(), &empty))
    });
    let need_admits = need.eligibility.as_ref().is_none_or(|rule| {
        evaluate_eligibility_filter(rule, context_of(ctx.capacity_party.as_ref(), &empty))
    });
    capacity_admits && need_admits
}

fn skills_ok(need: &Slot, capacity: &Slot, ctx: &MatchContext) -> bool {
    skills_compatible(need, capacity, ctx.need_party.as_ref(), ctx.capacity_party.as_ref())
}

pub fn score_match(need: &Slot, capacity: &Slot, ctx: &MatchContext) -> MatchScore {
    let score = if !resource_types_agree(need, capacity) {
        MatchScore::fail(REASON_RESOURCE_TYPE)
    } else if !time_ranges_overlap(&need.timing, &capacity.timing, &ctx.overlap_options()) {
        MatchScore::fail(REASON_TIME)
    } else if !assess_locations(&need.location, &capacity.location, &ctx.spatial_options()).is_compatible() {
        MatchScore::fail(REASON_LOCATION)
    } else if !check_flow_constraints(need, capacity, ctx.reference_instant) {
        MatchScore::fail(REASON_FLOW)
    } else if !skills_ok(need, capacity, ctx) {
        MatchScore::fail(REASON_SKILLS)
    } else if !eligibility_allows(need, capacity, ctx) {
        MatchScore::fail(REASON_ELIGIBILITY)
    } else {
        MatchScore::pass()
    };
    debug!(need = %need.id, capacity = %capacity.id, value = score.value, reason = %score.reason, "scored");
    score
}

pub fn slots_compatible(need: &Slot, capacity: &Slot, ctx: &MatchContext) -> bool {
    score_match(need, capacity, ctx).is_match()
}

pub fn match_breakdown(need: &Slot, capacity: &Slot, ctx: &MatchContext) -> MatchBreakdown {
    let resource_type = resource_types_agree(need, capacity);
    let time = time_ranges_overlap(&need.timing, &capacity.timing, &ctx.overlap_options());
    let location = assess_locations(&need.location, &capacity.location, &ctx.spatial_options());
    let flow = check_flow_constraints_detailed(need, capacity, ctx.reference_instant);
    let skills = skills_ok(need, capacity, ctx);
    let eligibility = eligibility_allows(need, capacity, ctx);

    let failed = [
        (resource_type, REASON_RESOURCE_TYPE),
        (time, REASON_TIME),
        (location.is_compatible(), REASON_LOCATION),
        (flow.iter().all(|c| c.passed), REASON_FLOW),
        (skills, REASON_SKILLS),
        (eligibility, REASON_ELIGIBILITY),
    ]
    .into_iter()
    .find(|(ok, _)| !ok);
    let score = match failed {
        Some((_, reason)) => MatchScore::fail(reason),
        None => MatchScore::pass(),
    };

    MatchBreakdown {
        resource_type,
        time,
        location,
        flow,
        skills,
        eligibility,
        score,
    }
}
