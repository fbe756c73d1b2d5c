use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::MatchContext;
use crate::matcher::{MatchScore, score_match};
use crate::slot::Slot;

/// A compatible (need, capacity) pair, addressed by input index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMatch {
    pub need: usize,
    pub capacity: usize,
    pub need_id: String,
    pub capacity_id: String,
    pub score: MatchScore,
}

/// Score every need against every capacity in parallel.
///
/// Pairs share nothing mutable; results come back in (need, capacity) index order
/// regardless of scheduling.
pub fn match_batch(needs: &[Slot], capacities: &[Slot], ctx: &MatchContext) -> Vec<BatchMatch> {
    let matches: Vec<BatchMatch> = needs
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, need)| {
            capacities.iter().enumerate().filter_map(move |(j, capacity)| {
                let score = score_match(need, capacity, ctx);
                score.is_match().then(|| BatchMatch {
                    need: i,
                    capacity: j,
                    need_id: need.id.clone(),
                    capacity_id: capacity.id.clone(),
                    score,
                })
            })
        })
        .collect();
    info!(
        needs = needs.len(),
        capacities = capacities.len(),
        matches = matches.len(),
        "batch matched"
    );
    matches
}
