use crate::context::Participant;
use crate::slot::Slot;

fn normalize(skill: &str) -> Option<String> {
    let s = skill.trim();
    (!s.is_empty()).then(|| s.to_lowercase())
}

/// Whether `held` covers every non-blank entry of `required` (case-insensitive).
pub fn holds_all(required: &[String], held: &[String]) -> bool {
    let held: Vec<String> = held.iter().filter_map(|s| normalize(s)).collect();
    required
        .iter()
        .filter_map(|s| normalize(s))
        .all(|r| held.contains(&r))
}

fn skills_of(party: Option<&Participant>) -> &[String] {
    party.map(|p| p.skills.as_slice()).unwrap_or_default()
}

/// Bidirectional skill check: the capacity's party must hold what the need requires and
/// the need's party must hold what the capacity requires. An absent party holds nothing.
pub fn skills_compatible(
    need: &Slot,
    capacity: &Slot,
    need_party: Option<&Participant>,
    capacity_party: Option<&Participant>,
) -> bool {
    holds_all(&need.required_skills, skills_of(capacity_party))
        && holds_all(&capacity.required_skills, skills_of(need_party))
}
