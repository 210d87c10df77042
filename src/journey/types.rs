//! Journey aggregate and the records it is built from

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::calculators::{CalculatorInput, CalculatorType, ResultSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Retired,
    NotWorking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Campaign attribution captured when the journey starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtmParams {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

/// Contact and demographic details, collected a field at a time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub income: Option<Decimal>,
    pub employment_status: Option<EmploymentStatus>,
    pub urgency: Option<Urgency>,
    pub marketing_consent: Option<bool>,
    pub source: Option<String>,
    pub utm: Option<UtmParams>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn merge_field<T>(current: &mut Option<T>, update: Option<T>) {
    if update.is_some() {
        *current = update;
    }
}

impl UserProfile {
    /// Copy every field set in `update`; fields `update` leaves empty are kept
    pub fn merge(&mut self, update: UserProfile) {
        let UserProfile {
            email,
            name,
            phone,
            age,
            income,
            employment_status,
            urgency,
            marketing_consent,
            source,
            utm,
        } = update;

        merge_field(&mut self.email, email.filter(|v| !v.trim().is_empty()));
        merge_field(&mut self.name, name.filter(|v| !v.trim().is_empty()));
        merge_field(&mut self.phone, phone.filter(|v| !v.trim().is_empty()));
        merge_field(&mut self.age, age);
        merge_field(&mut self.income, income);
        merge_field(&mut self.employment_status, employment_status);
        merge_field(&mut self.urgency, urgency);
        merge_field(&mut self.marketing_consent, marketing_consent);
        merge_field(&mut self.source, source);
        merge_field(&mut self.utm, utm);
    }

    pub fn has_email(&self) -> bool {
        present(&self.email)
    }

    pub fn has_name(&self) -> bool {
        present(&self.name)
    }

    pub fn has_phone(&self) -> bool {
        present(&self.phone)
    }

    pub fn has_age(&self) -> bool {
        self.age.is_some()
    }

    pub fn has_income(&self) -> bool {
        self.income.is_some()
    }
}

/// A completed calculator as remembered by the journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyCalculatorResult {
    pub completed: bool,
    pub completed_at: DateTime<Utc>,
    pub inputs: CalculatorInput,
    pub results: ResultSummary,
    #[serde(default)]
    pub session_duration_secs: u64,
}

/// Figures pulled together from the completed calculators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialSnapshot {
    /// Annual State Pension
    pub state_pension_amount: Decimal,
    pub workplace_pot: Decimal,
    pub personal_pot: Decimal,
    pub total_current_pot: Decimal,
    pub desired_retirement_income: Decimal,
    pub projected_retirement_income: Decimal,
    /// Desired less projected income; zero while no target is known
    pub pension_gap: Decimal,
    pub retirement_age: Option<u32>,
    pub years_to_retirement: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    #[default]
    Cold,
    Warm,
    Hot,
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Temperature::Cold => "cold",
            Temperature::Warm => "warm",
            Temperature::Hot => "hot",
        })
    }
}

/// Qualification tier 1-4, serialized as its number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum QualificationTier {
    #[default]
    One,
    Two,
    Three,
    Four,
}

impl QualificationTier {
    pub fn number(&self) -> u8 {
        match self {
            QualificationTier::One => 1,
            QualificationTier::Two => 2,
            QualificationTier::Three => 3,
            QualificationTier::Four => 4,
        }
    }
}

impl From<QualificationTier> for u8 {
    fn from(tier: QualificationTier) -> u8 {
        tier.number()
    }
}

impl TryFrom<u8> for QualificationTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(QualificationTier::One),
            2 => Ok(QualificationTier::Two),
            3 => Ok(QualificationTier::Three),
            4 => Ok(QualificationTier::Four),
            other => Err(format!("qualification tier must be 1-4, got {}", other)),
        }
    }
}

impl fmt::Display for QualificationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    CalculatorStarted,
    CalculatorCompleted,
    GateShown,
    GateDismissed,
    LeadCaptured,
    PdfDownloaded,
    ConsultationRequested,
    JourneyCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A lead-capture submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub calculator: Option<CalculatorType>,
    /// Primary result of `calculator` at capture time
    pub result_value: Option<Decimal>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Consultation,
    Calculator,
    Dashboard,
    DownloadReport,
    Start,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// What the visitor should be nudged towards next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    pub action_type: ActionType,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub cta: String,
    pub link: Option<String>,
    pub reason: String,
    pub estimated_value: Option<Decimal>,
}

/// Root aggregate of a visitor's journey
///
/// Fields from `financial_snapshot` to `next_action` are derived and only
/// ever written by `derive_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJourneyState {
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub profile: UserProfile,
    #[serde(default)]
    pub calculators: BTreeMap<CalculatorType, JourneyCalculatorResult>,

    #[serde(default)]
    pub financial_snapshot: FinancialSnapshot,
    #[serde(default)]
    pub qualification_tier: QualificationTier,
    #[serde(default)]
    pub lead_score: u8,
    #[serde(default)]
    pub temperature: Temperature,
    #[serde(default)]
    pub journey_progress: u8,
    #[serde(default)]
    pub completed_calculators: u32,
    #[serde(default)]
    pub next_action: Option<NextAction>,

    #[serde(default)]
    pub total_session_time: u64,
    #[serde(default)]
    pub pageviews: u32,
    #[serde(default)]
    pub has_downloaded_pdf: bool,
    #[serde(default)]
    pub has_requested_consultation: bool,
    #[serde(default)]
    pub has_completed_full_journey: bool,

    #[serde(default)]
    pub analytics: Vec<AnalyticsEvent>,
    #[serde(default)]
    pub leads: Vec<LeadRecord>,
}

impl UserJourneyState {
    /// Fresh anonymous journey with zeroed metrics
    pub fn new(now: DateTime<Utc>, source: Option<String>, utm: Option<UtmParams>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            created_at: now,
            last_updated: now,
            profile: UserProfile {
                source,
                utm,
                ..Default::default()
            },
            calculators: BTreeMap::new(),
            financial_snapshot: FinancialSnapshot::default(),
            qualification_tier: QualificationTier::One,
            lead_score: 0,
            temperature: Temperature::Cold,
            journey_progress: 0,
            completed_calculators: 0,
            next_action: None,
            total_session_time: 0,
            pageviews: 0,
            has_downloaded_pdf: false,
            has_requested_consultation: false,
            has_completed_full_journey: false,
            analytics: Vec::new(),
            leads: Vec::new(),
        }
    }

    pub fn has_completed(&self, kind: CalculatorType) -> bool {
        self.calculators.get(&kind).is_some_and(|r| r.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_never_clears() {
        let mut profile = UserProfile {
            email: Some("a@example.com".into()),
            age: Some(45),
            ..Default::default()
        };
        profile.merge(UserProfile {
            name: Some("Sam".into()),
            email: None,
            ..Default::default()
        });

        assert_eq!(profile.email.as_deref(), Some("a@example.com"));
        assert_eq!(profile.name.as_deref(), Some("Sam"));
        assert_eq!(profile.age, Some(45));
    }

    #[test]
    fn test_merge_ignores_blank_strings() {
        let mut profile = UserProfile {
            phone: Some("07700 900000".into()),
            ..Default::default()
        };
        profile.merge(UserProfile {
            phone: Some("  ".into()),
            ..Default::default()
        });
        assert!(profile.has_phone());
        assert_eq!(profile.phone.as_deref(), Some("07700 900000"));
    }

    #[test]
    fn test_tier_serializes_as_number() {
        assert_eq!(serde_json::to_string(&QualificationTier::Three).unwrap(), "3");
        let tier: QualificationTier = serde_json::from_str("4").unwrap();
        assert_eq!(tier, QualificationTier::Four);
        assert!(serde_json::from_str::<QualificationTier>("5").is_err());
    }

    #[test]
    fn test_state_round_trips_with_dates() {
        let state = UserJourneyState::new(Utc::now(), Some("google".into()), None);
        let json = serde_json::to_string(&state).unwrap();
        let back: UserJourneyState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.created_at, state.created_at);
    }
}
