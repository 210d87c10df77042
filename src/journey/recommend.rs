//! Recommended next action

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{ActionType, NextAction, Priority, UserJourneyState};
use crate::calculators::CalculatorType;
use crate::money::format_gbp;

const LARGE_GAP: Decimal = dec!(50000);
const DASHBOARD_AFTER: u32 = 3;

/// Order in which calculators are suggested
pub const CALCULATOR_SEQUENCE: [CalculatorType; 6] = [
    CalculatorType::StatePension,
    CalculatorType::WorkplacePension,
    CalculatorType::TaxRelief,
    CalculatorType::PensionDrawdown,
    CalculatorType::LumpSumTax,
    CalculatorType::Sipp,
];

fn calculator_link(kind: CalculatorType) -> String {
    format!("/calculators/{}", kind.slug())
}

fn calculator_action(kind: CalculatorType, priority: Priority, reason: &str) -> NextAction {
    NextAction {
        action_type: ActionType::Calculator,
        priority,
        title: kind.title().to_string(),
        description: format!("Try the {} calculator next.", kind.title()),
        cta: "Start calculator".to_string(),
        link: Some(calculator_link(kind)),
        reason: reason.to_string(),
        estimated_value: None,
    }
}

/// Rule table, first match wins
pub fn recommended_action(state: &UserJourneyState) -> NextAction {
    let gap = state.financial_snapshot.pension_gap;
    if gap > LARGE_GAP && !state.has_requested_consultation {
        return NextAction {
            action_type: ActionType::Consultation,
            priority: Priority::High,
            title: "Book a free pension review".to_string(),
            description: format!(
                "Your projected income falls {} a year short of your target.",
                format_gbp(gap)
            ),
            cta: "Book a consultation".to_string(),
            link: Some("/consultation".to_string()),
            reason: "large_pension_gap".to_string(),
            estimated_value: Some(gap),
        };
    }

    if state.completed_calculators < DASHBOARD_AFTER {
        if let Some(next) = CALCULATOR_SEQUENCE.into_iter().find(|c| !state.has_completed(*c)) {
            let priority = if state.completed_calculators == 0 {
                Priority::High
            } else {
                Priority::Medium
            };
            return calculator_action(next, priority, "next_calculator");
        }
    }

    if state.completed_calculators >= DASHBOARD_AFTER && !state.has_completed_full_journey {
        return NextAction {
            action_type: ActionType::Dashboard,
            priority: Priority::Medium,
            title: "See your retirement dashboard".to_string(),
            description: "Bring your results together in one retirement picture.".to_string(),
            cta: "Open dashboard".to_string(),
            link: Some("/dashboard".to_string()),
            reason: "enough_results_for_dashboard".to_string(),
            estimated_value: None,
        };
    }

    if state.completed_calculators > 0 && !state.has_downloaded_pdf {
        return NextAction {
            action_type: ActionType::DownloadReport,
            priority: Priority::Low,
            title: "Download your pension report".to_string(),
            description: "Keep a PDF copy of your results.".to_string(),
            cta: "Download report".to_string(),
            link: None,
            reason: "results_not_downloaded".to_string(),
            estimated_value: None,
        };
    }

    NextAction {
        action_type: ActionType::Start,
        ..calculator_action(CalculatorType::StatePension, Priority::Low, "start_journey")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{CalculatorInput, ResultSummary, StatePensionInput};
    use crate::journey::types::JourneyCalculatorResult;
    use chrono::{NaiveDate, Utc};

    fn state() -> UserJourneyState {
        UserJourneyState::new(Utc::now(), None, None)
    }

    fn complete(state: &mut UserJourneyState, kind: CalculatorType) {
        let inputs = CalculatorInput::StatePension(StatePensionInput {
            date_of_birth: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            as_of: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ni_years: 20,
            ni_gaps: 0,
            planned_contributions: 0,
            overseas_years: 0,
        });
        state.calculators.insert(
            kind,
            JourneyCalculatorResult {
                completed: true,
                completed_at: Utc::now(),
                inputs,
                results: ResultSummary::default(),
                session_duration_secs: 0,
            },
        );
        state.completed_calculators = state.calculators.len() as u32;
    }

    #[test]
    fn test_new_visitor_starts_with_state_pension() {
        let action = recommended_action(&state());
        assert_eq!(action.action_type, ActionType::Calculator);
        assert_eq!(action.priority, Priority::High);
        assert_eq!(action.link.as_deref(), Some("/calculators/state-pension"));
    }

    #[test]
    fn test_next_calculator_in_sequence() {
        let mut s = state();
        complete(&mut s, CalculatorType::StatePension);
        complete(&mut s, CalculatorType::TaxRelief);
        let action = recommended_action(&s);
        assert_eq!(action.link.as_deref(), Some("/calculators/workplace-pension"));
        assert_eq!(action.priority, Priority::Medium);
    }

    #[test]
    fn test_large_gap_recommends_consultation() {
        let mut s = state();
        s.financial_snapshot.pension_gap = dec!(60000);
        let action = recommended_action(&s);
        assert_eq!(action.action_type, ActionType::Consultation);
        assert_eq!(action.estimated_value, Some(dec!(60000)));

        s.has_requested_consultation = true;
        assert_eq!(recommended_action(&s).action_type, ActionType::Calculator);
    }

    #[test]
    fn test_dashboard_then_download_then_start() {
        let mut s = state();
        for kind in &CALCULATOR_SEQUENCE[..3] {
            complete(&mut s, *kind);
        }
        assert_eq!(recommended_action(&s).action_type, ActionType::Dashboard);

        s.has_completed_full_journey = true;
        assert_eq!(recommended_action(&s).action_type, ActionType::DownloadReport);

        s.has_downloaded_pdf = true;
        let action = recommended_action(&s);
        assert_eq!(action.action_type, ActionType::Start);
        assert_eq!(action.link.as_deref(), Some("/calculators/state-pension"));
    }
}
