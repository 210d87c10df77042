//! Gate decision engine
//!
//! Decides whether to interrupt the visitor for more profile data before
//! revealing a result. Rules are checked from tier 4 down and the first
//! trigger that matches decides the outcome.

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::journey::{QualificationTier, UserJourneyState};

const TIER4_GAP: Decimal = dec!(50000);
const TIER4_POT: Decimal = dec!(100000);
const TIER3_GAP: Decimal = dec!(10000);
const TIER3_CALCULATORS: u32 = 4;
const TIER2_CALCULATORS: u32 = 3;

/// Stable reason code; the caller picks gate copy and fields from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    Tier4HighValue,
    Tier3QualifiedInterest,
    Tier2Engaged,
    Tier1FirstResult,
    /// A tier triggered but its field is already on the profile
    AlreadyCaptured,
    NoTrigger,
}

impl GateReason {
    pub fn code(&self) -> &'static str {
        match self {
            GateReason::Tier4HighValue => "tier4_high_value",
            GateReason::Tier3QualifiedInterest => "tier3_qualified_interest",
            GateReason::Tier2Engaged => "tier2_engaged",
            GateReason::Tier1FirstResult => "tier1_first_result",
            GateReason::AlreadyCaptured => "already_captured",
            GateReason::NoTrigger => "no_trigger",
        }
    }
}

/// Profile field a gate asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateField {
    Email,
    Name,
    Age,
    Phone,
    Urgency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateContext {
    pub fields_requested: Vec<GateField>,
    pub completed_calculators: u32,
    pub pension_gap: Decimal,
    pub total_current_pot: Decimal,
    pub lead_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub should_show_gate: bool,
    /// Tier whose trigger matched, if any
    pub tier: Option<QualificationTier>,
    pub reason: GateReason,
    pub context: GateContext,
}

struct Rule {
    tier: QualificationTier,
    reason: GateReason,
    fields: &'static [GateField],
    triggered: fn(&UserJourneyState) -> bool,
    captured: fn(&UserJourneyState) -> bool,
}

fn tier4_triggered(s: &UserJourneyState) -> bool {
    s.profile.has_phone()
        && (s.has_requested_consultation
            || s.financial_snapshot.pension_gap > TIER4_GAP
            || s.financial_snapshot.total_current_pot > TIER4_POT)
}

fn tier3_triggered(s: &UserJourneyState) -> bool {
    s.profile.has_email()
        && s.profile.has_name()
        && (s.has_requested_consultation
            || s.completed_calculators >= TIER3_CALCULATORS
            || s.financial_snapshot.pension_gap > TIER3_GAP)
}

fn tier2_triggered(s: &UserJourneyState) -> bool {
    s.profile.has_email() && (s.completed_calculators >= TIER2_CALCULATORS || s.has_downloaded_pdf)
}

fn tier1_triggered(s: &UserJourneyState) -> bool {
    s.completed_calculators >= 1
}

fn urgency_captured(s: &UserJourneyState) -> bool {
    s.profile.urgency.is_some()
}

fn phone_captured(s: &UserJourneyState) -> bool {
    s.profile.has_phone()
}

fn name_and_age_captured(s: &UserJourneyState) -> bool {
    s.profile.has_name() && s.profile.has_age()
}

fn email_captured(s: &UserJourneyState) -> bool {
    s.profile.has_email()
}

/// Checked in order; the first triggered rule decides
const RULES: [Rule; 4] = [
    Rule {
        tier: QualificationTier::Four,
        reason: GateReason::Tier4HighValue,
        fields: &[GateField::Urgency],
        triggered: tier4_triggered,
        captured: urgency_captured,
    },
    Rule {
        tier: QualificationTier::Three,
        reason: GateReason::Tier3QualifiedInterest,
        fields: &[GateField::Phone],
        triggered: tier3_triggered,
        captured: phone_captured,
    },
    Rule {
        tier: QualificationTier::Two,
        reason: GateReason::Tier2Engaged,
        fields: &[GateField::Name, GateField::Age],
        triggered: tier2_triggered,
        captured: name_and_age_captured,
    },
    Rule {
        tier: QualificationTier::One,
        reason: GateReason::Tier1FirstResult,
        fields: &[GateField::Email],
        triggered: tier1_triggered,
        captured: email_captured,
    },
];

/// Evaluate the gate table against `state`
pub fn check_gate(state: &UserJourneyState) -> GateDecision {
    let context = |fields: &[GateField]| GateContext {
        fields_requested: fields.to_vec(),
        completed_calculators: state.completed_calculators,
        pension_gap: state.financial_snapshot.pension_gap,
        total_current_pot: state.financial_snapshot.total_current_pot,
        lead_score: state.lead_score,
    };

    let decision = match RULES.iter().find(|rule| (rule.triggered)(state)) {
        Some(rule) if (rule.captured)(state) => GateDecision {
            should_show_gate: false,
            tier: Some(rule.tier),
            reason: GateReason::AlreadyCaptured,
            context: context(&[]),
        },
        Some(rule) => GateDecision {
            should_show_gate: true,
            tier: Some(rule.tier),
            reason: rule.reason,
            context: context(rule.fields),
        },
        None => GateDecision {
            should_show_gate: false,
            tier: None,
            reason: GateReason::NoTrigger,
            context: context(&[]),
        },
    };

    debug!(
        "gate: show={} tier={:?} reason={}",
        decision.should_show_gate,
        decision.tier.map(|t| t.number()),
        decision.reason.code()
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn state() -> UserJourneyState {
        UserJourneyState::new(Utc::now(), None, None)
    }

    #[test]
    fn test_no_trigger_for_new_visitor() {
        let decision = check_gate(&state());
        assert!(!decision.should_show_gate);
        assert_eq!(decision.reason, GateReason::NoTrigger);
        assert_eq!(decision.tier, None);
    }

    #[test]
    fn test_first_result_asks_for_email() {
        let mut s = state();
        s.completed_calculators = 1;
        let decision = check_gate(&s);
        assert!(decision.should_show_gate);
        assert_eq!(decision.tier, Some(QualificationTier::One));
        assert_eq!(decision.reason, GateReason::Tier1FirstResult);
        assert_eq!(decision.context.fields_requested, vec![GateField::Email]);

        s.profile.email = Some("a@example.com".into());
        let decision = check_gate(&s);
        assert!(!decision.should_show_gate);
        assert_eq!(decision.reason, GateReason::AlreadyCaptured);
    }

    #[test]
    fn test_tier2_after_three_calculators() {
        let mut s = state();
        s.profile.email = Some("a@example.com".into());
        s.completed_calculators = 3;
        let decision = check_gate(&s);
        assert_eq!(decision.reason, GateReason::Tier2Engaged);
        assert_eq!(decision.context.fields_requested, vec![GateField::Name, GateField::Age]);
    }

    #[test]
    fn test_tier3_asks_for_phone() {
        let mut s = state();
        s.profile.email = Some("a@example.com".into());
        s.profile.name = Some("Al".into());
        s.financial_snapshot.pension_gap = dec!(15000);
        let decision = check_gate(&s);
        assert!(decision.should_show_gate);
        assert_eq!(decision.reason, GateReason::Tier3QualifiedInterest);
    }

    #[test]
    fn test_higher_tier_takes_precedence() {
        // Both the tier 2 and tier 4 triggers hold
        let mut s = state();
        s.profile.email = Some("a@example.com".into());
        s.profile.phone = Some("07700 900000".into());
        s.completed_calculators = 3;
        s.has_requested_consultation = true;

        let decision = check_gate(&s);
        assert_eq!(decision.tier, Some(QualificationTier::Four));
        assert_eq!(decision.reason, GateReason::Tier4HighValue);
        assert_eq!(decision.context.fields_requested, vec![GateField::Urgency]);

        // Same state with only the tier 2 trigger
        s.has_requested_consultation = false;
        let decision = check_gate(&s);
        assert_eq!(decision.tier, Some(QualificationTier::Two));
    }

    #[test]
    fn test_first_match_wins_even_when_captured() {
        let mut s = state();
        s.profile.phone = Some("07700 900000".into());
        s.profile.urgency = Some(crate::journey::Urgency::Medium);
        s.financial_snapshot.total_current_pot = dec!(150000);
        s.completed_calculators = 1;

        let decision = check_gate(&s);
        assert!(!decision.should_show_gate);
        assert_eq!(decision.tier, Some(QualificationTier::Four));
        assert_eq!(decision.reason, GateReason::AlreadyCaptured);
    }

    #[test]
    fn test_reason_codes_match_serde() {
        for reason in [
            GateReason::Tier4HighValue,
            GateReason::Tier3QualifiedInterest,
            GateReason::Tier2Engaged,
            GateReason::Tier1FirstResult,
            GateReason::AlreadyCaptured,
            GateReason::NoTrigger,
        ] {
            assert_eq!(serde_json::to_string(&reason).unwrap(), format!("\"{}\"", reason.code()));
        }
    }

    #[test]
    fn test_decision_is_deterministic() {
        let mut s = state();
        s.profile.email = Some("a@example.com".into());
        s.has_downloaded_pdf = true;
        assert_eq!(check_gate(&s), check_gate(&s));
    }
}
