//! Single derivation pass over the journey state

use super::recommend::recommended_action;
use super::snapshot::build_snapshot;
use super::types::UserJourneyState;
use crate::config::ScoringWeights;
use crate::scoring::{journey_progress, qualification_tier, score_with, temperature};

/// Recompute every derived field from the non-derived ones
///
/// Snapshot first, then score, temperature, tier, progress and next action,
/// each reading the fields computed before it.
pub fn derive_metrics(state: &UserJourneyState, weights: &ScoringWeights) -> UserJourneyState {
    let mut next = state.clone();

    next.completed_calculators = next.calculators.values().filter(|r| r.completed).count() as u32;
    next.financial_snapshot = build_snapshot(&next.calculators, next.profile.age);

    next.lead_score = score_with(&next, weights);
    next.temperature = temperature(&next, next.lead_score);
    next.qualification_tier = qualification_tier(&next);
    next.journey_progress = journey_progress(&next);
    next.next_action = Some(recommended_action(&next));

    next
}
