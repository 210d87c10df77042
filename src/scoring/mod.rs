//! Lead scoring: score, temperature, qualification tier and journey progress
//!
//! All functions are pure over the journey state; `derive_metrics` calls
//! them together so the results are never out of step with each other.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::ScoringWeights;
use crate::journey::{QualificationTier, Temperature, Urgency, UserJourneyState};

const HOT_SCORE: u8 = 70;
const WARM_SCORE: u8 = 40;
const WARM_CALCULATORS: u32 = 3;
const LARGE_GAP: Decimal = dec!(50000);
const LARGE_POT: Decimal = dec!(200000);
const TIER4_POT: Decimal = dec!(100000);

/// Lead score with the default weights
pub fn score(state: &UserJourneyState) -> u8 {
    score_with(state, &ScoringWeights::default())
}

/// Lead score in [0, 100]
pub fn score_with(state: &UserJourneyState, w: &ScoringWeights) -> u8 {
    let profile = &state.profile;
    let snapshot = &state.financial_snapshot;
    let mut points: u32 = 0;

    let profile_points = [
        (profile.has_email(), w.email),
        (profile.has_name(), w.name),
        (profile.has_phone(), w.phone),
        (profile.has_age(), w.age),
        (profile.has_income(), w.income),
    ];
    points += profile_points
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, p)| p)
        .sum::<u32>();

    points += state
        .completed_calculators
        .saturating_mul(w.per_calculator)
        .min(w.calculator_cap);

    if state.total_session_time > w.session_threshold_secs {
        points += w.session_bonus;
    }

    if snapshot.pension_gap > w.gap_large_threshold {
        points += w.gap_large_bonus;
    } else if snapshot.pension_gap > w.gap_medium_threshold {
        points += w.gap_medium_bonus;
    }

    if snapshot.total_current_pot > w.pot_large_threshold {
        points += w.pot_large_bonus;
    } else if snapshot.total_current_pot > w.pot_medium_threshold {
        points += w.pot_medium_bonus;
    }

    if state.has_downloaded_pdf {
        points += w.pdf_downloaded;
    }
    if state.has_requested_consultation {
        points += w.consultation_requested;
    }

    // u8 conversion cannot fail after the clamp
    u8::try_from(points.min(100)).unwrap_or(100)
}

/// Hot, warm or cold given the state and its score
pub fn temperature(state: &UserJourneyState, score: u8) -> Temperature {
    let snapshot = &state.financial_snapshot;
    let hot = score > HOT_SCORE
        || state.has_requested_consultation
        || snapshot.pension_gap > LARGE_GAP
        || snapshot.total_current_pot > LARGE_POT
        || state.profile.urgency == Some(Urgency::High);
    if hot {
        return Temperature::Hot;
    }

    if score > WARM_SCORE || state.completed_calculators >= WARM_CALCULATORS || state.has_downloaded_pdf {
        Temperature::Warm
    } else {
        Temperature::Cold
    }
}

/// Highest tier whose requirements the state meets
pub fn qualification_tier(state: &UserJourneyState) -> QualificationTier {
    let profile = &state.profile;
    let snapshot = &state.financial_snapshot;
    let contactable = profile.has_phone() && profile.has_email() && profile.has_name();

    let high_value = state.has_requested_consultation
        || snapshot.pension_gap > LARGE_GAP
        || snapshot.total_current_pot > TIER4_POT;

    if contactable && high_value {
        QualificationTier::Four
    } else if contactable {
        QualificationTier::Three
    } else if profile.has_email() && (profile.has_name() || profile.has_age() || profile.has_income()) {
        QualificationTier::Two
    } else {
        QualificationTier::One
    }
}

/// Percentage of the journey completed, in [0, 100]
pub fn journey_progress(state: &UserJourneyState) -> u8 {
    let profile = &state.profile;
    let mut progress: u32 = 0;

    if profile.has_email() {
        progress += 20;
    }
    progress += state.completed_calculators.saturating_mul(15).min(60);
    if profile.has_name() && profile.has_age() {
        progress += 10;
    }
    if profile.has_phone() {
        progress += 10;
    }

    u8::try_from(progress.min(100)).unwrap_or(100)
}
