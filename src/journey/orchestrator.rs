//! Journey orchestrator
//!
//! Owns the store and the in-memory state. Every mutation edits the
//! non-derived fields, runs one `derive_metrics` pass and then persists.
//! Persistence failures are logged and swallowed; the in-memory state stays
//! authoritative for the session.

use chrono::Utc;
use log::{debug, info, warn};

use super::derive::derive_metrics;
use super::store::{JourneyStateStore, KeyValueStore};
use super::types::{
    AnalyticsEvent, EventType, JourneyCalculatorResult, LeadRecord, NextAction, UserJourneyState, UserProfile,
};
use crate::calculators::{self, CalculatorInput, CalculatorOutput, CalculatorType};
use crate::config::JourneyConfig;
use crate::constants::PensionConstants;
use crate::error::JourneyError;
use crate::gate::{check_gate, GateDecision};

pub struct JourneyOrchestrator<S: KeyValueStore> {
    store: JourneyStateStore<S>,
    state: UserJourneyState,
    config: JourneyConfig,
}

impl<S: KeyValueStore> JourneyOrchestrator<S> {
    /// Load (or create) the journey held in `kv`
    ///
    /// A loaded journey whose derived fields are already current is not
    /// written back, so read-only commands leave `last_updated` alone.
    pub fn new(kv: S, config: JourneyConfig) -> Self {
        let mut store = JourneyStateStore::new(kv, config.keys.clone());
        let loaded = store.load();
        let stored = loaded.is_some();
        let state = loaded.unwrap_or_else(|| store.get_or_create());
        let derived = derive_metrics(&state, &config.scoring);
        let stale = !stored || derived != state;

        let mut orchestrator = Self {
            store,
            state: derived,
            config,
        };
        if stale {
            orchestrator.persist();
        }
        orchestrator
    }

    pub fn state(&self) -> &UserJourneyState {
        &self.state
    }

    pub fn config(&self) -> &JourneyConfig {
        &self.config
    }

    pub fn store(&self) -> &JourneyStateStore<S> {
        &self.store
    }

    /// Derive, then persist
    fn commit(&mut self) {
        self.state = derive_metrics(&self.state, &self.config.scoring);
        self.persist();
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&mut self.state) {
            warn!("failed to persist journey {}: {}", self.state.user_id, e);
        }
    }

    fn push_event(&mut self, event_type: EventType, data: Option<serde_json::Value>) {
        self.state.analytics.push(AnalyticsEvent {
            event_type,
            timestamp: Utc::now(),
            data,
        });
        let excess = self.state.analytics.len().saturating_sub(self.config.analytics_cap);
        self.state.analytics.drain(..excess);
    }

    /// Merge profile fields; fields already set are never cleared
    pub fn update_profile(&mut self, update: UserProfile) {
        self.state.profile.merge(update);
        self.commit();
    }

    /// Store (or overwrite) a calculator result and recompute the journey
    pub fn record_calculator_completion(
        &mut self,
        inputs: CalculatorInput,
        output: &CalculatorOutput,
        session_duration_secs: Option<u64>,
    ) -> Result<(), JourneyError> {
        let kind = inputs.kind();
        if kind != output.kind() {
            return Err(JourneyError::MismatchedCalculator {
                input: kind,
                output: output.kind(),
            });
        }

        let duration = session_duration_secs.unwrap_or(0);
        let summary = output.summary();
        let primary = summary.primary_value;
        self.state.calculators.insert(
            kind,
            JourneyCalculatorResult {
                completed: true,
                completed_at: Utc::now(),
                inputs,
                results: summary,
                session_duration_secs: duration,
            },
        );
        self.state.total_session_time += duration;
        self.push_event(
            EventType::CalculatorCompleted,
            Some(serde_json::json!({ "calculator": kind, "primary_value": primary })),
        );

        self.commit();
        info!(
            "journey {}: completed {} (score {}, tier {})",
            self.state.user_id, kind, self.state.lead_score, self.state.qualification_tier
        );
        Ok(())
    }

    /// Run a calculator and record it. A failed calculation leaves the
    /// journey untouched.
    pub fn run_calculator(
        &mut self,
        inputs: CalculatorInput,
        constants: &PensionConstants,
        session_duration_secs: Option<u64>,
    ) -> Result<CalculatorOutput, JourneyError> {
        let output = calculators::run(&inputs, constants)?;
        self.record_calculator_completion(inputs, &output, session_duration_secs)?;
        Ok(output)
    }

    /// Record an analytics event and set the matching conversion flag
    pub fn track_event(&mut self, event_type: EventType, data: Option<serde_json::Value>) {
        match event_type {
            EventType::PdfDownloaded => self.state.has_downloaded_pdf = true,
            EventType::ConsultationRequested => self.state.has_requested_consultation = true,
            EventType::JourneyCompleted => self.state.has_completed_full_journey = true,
            EventType::PageView => self.state.pageviews += 1,
            _ => {}
        }
        self.push_event(event_type, data);
        self.commit();
        debug!("journey {}: event {:?}", self.state.user_id, event_type);
    }

    pub fn record_pageview(&mut self) {
        self.track_event(EventType::PageView, None);
    }

    /// Merge captured details and keep a bounded record of the submission
    pub fn capture_lead(&mut self, details: UserProfile, calculator: Option<CalculatorType>) {
        self.state.profile.merge(details);

        let profile = &self.state.profile;
        let result_value = calculator
            .and_then(|kind| self.state.calculators.get(&kind))
            .map(|r| r.results.primary_value);
        self.state.leads.push(LeadRecord {
            email: profile.email.clone(),
            name: profile.name.clone(),
            phone: profile.phone.clone(),
            age: profile.age,
            calculator,
            result_value,
            captured_at: Utc::now(),
        });
        let excess = self.state.leads.len().saturating_sub(self.config.leads_cap);
        self.state.leads.drain(..excess);

        self.push_event(
            EventType::LeadCaptured,
            calculator.map(|kind| serde_json::json!({ "calculator": kind })),
        );
        self.commit();
        info!("journey {}: lead captured", self.state.user_id);
    }

    /// Accumulate time on site (called by the session ticker)
    pub fn add_session_time(&mut self, secs: u64) {
        self.state.total_session_time += secs;
        self.commit();
    }

    /// Discard the journey and start a new one
    pub fn reset(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!("failed to clear stored journey: {}", e);
        }
        self.state = self.store.create_new_state(None, None);
        info!("journey reset, new id {}", self.state.user_id);
        self.commit();
    }

    pub fn check_gate(&self) -> GateDecision {
        check_gate(&self.state)
    }

    pub fn recommended_action(&self) -> NextAction {
        self.state
            .next_action
            .clone()
            .unwrap_or_else(|| super::recommend::recommended_action(&self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{AnnuityInput, Escalation, StatePensionInput};
    use crate::error::StoreError;
    use crate::gate::GateReason;
    use crate::journey::store::MemoryStore;
    use crate::journey::types::{QualificationTier, Temperature};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    /// Store that fails every write
    #[derive(Default)]
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(std::io::Error::other("disk full").into())
        }

        fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    fn orchestrator() -> JourneyOrchestrator<MemoryStore> {
        JourneyOrchestrator::new(MemoryStore::new(), JourneyConfig::default())
    }

    fn state_pension_input() -> CalculatorInput {
        CalculatorInput::StatePension(StatePensionInput {
            date_of_birth: NaiveDate::from_ymd_opt(1975, 3, 15).unwrap(),
            as_of: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            ni_years: 30,
            ni_gaps: 2,
            planned_contributions: 0,
            overseas_years: 0,
        })
    }

    fn annuity_input(age: u32) -> CalculatorInput {
        CalculatorInput::Annuity(AnnuityInput {
            pot_value: dec!(120000),
            age,
            joint_life: false,
            escalation: Escalation::Level,
            health_enhanced: false,
            take_tax_free_lump_sum: true,
        })
    }

    #[test]
    fn test_completion_updates_snapshot_and_metrics() {
        let mut o = orchestrator();
        let constants = PensionConstants::default();
        o.run_calculator(state_pension_input(), &constants, Some(90)).unwrap();

        let state = o.state();
        assert_eq!(state.completed_calculators, 1);
        assert_eq!(state.total_session_time, 90);
        assert_eq!(state.lead_score, 8);
        assert!(state.financial_snapshot.state_pension_amount > dec!(0));
        assert_eq!(state.analytics.len(), 1);
        assert!(o.check_gate().should_show_gate);
        assert_eq!(o.check_gate().reason, GateReason::Tier1FirstResult);

        // Persisted with the derived fields
        let stored = o.store().load().unwrap();
        assert_eq!(stored.lead_score, 8);
        assert_eq!(stored.completed_calculators, 1);
    }

    #[test]
    fn test_recompleting_overwrites() {
        let mut o = orchestrator();
        let constants = PensionConstants::default();
        o.run_calculator(annuity_input(60), &constants, None).unwrap();
        o.run_calculator(annuity_input(70), &constants, None).unwrap();

        assert_eq!(o.state().calculators.len(), 1);
        assert_eq!(o.state().completed_calculators, 1);
        let stored = &o.state().calculators[&CalculatorType::Annuity];
        // 90000 * 6.5%
        assert_eq!(stored.results.primary_value, dec!(5850));
    }

    #[test]
    fn test_failed_calculation_leaves_state_untouched() {
        let mut o = orchestrator();
        let constants = PensionConstants::default();
        o.run_calculator(annuity_input(65), &constants, None).unwrap();
        let before = o.state().clone();

        let err = o.run_calculator(annuity_input(101), &constants, None).unwrap_err();
        assert!(matches!(err, JourneyError::Calculation(_)));
        assert_eq!(o.state(), &before);
    }

    #[test]
    fn test_mismatched_output_rejected() {
        let mut o = orchestrator();
        let constants = PensionConstants::default();
        let output = calculators::run(&annuity_input(65), &constants).unwrap();

        let err = o
            .record_calculator_completion(state_pension_input(), &output, None)
            .unwrap_err();
        assert!(matches!(err, JourneyError::MismatchedCalculator { .. }));
        assert!(o.state().calculators.is_empty());
    }

    #[test]
    fn test_profile_merge_and_tiers() {
        let mut o = orchestrator();
        o.update_profile(UserProfile {
            email: Some("ash@example.com".into()),
            age: Some(52),
            ..Default::default()
        });
        assert_eq!(o.state().qualification_tier, QualificationTier::Two);

        o.update_profile(UserProfile {
            name: Some("Ash".into()),
            phone: Some("07700 900456".into()),
            ..Default::default()
        });
        let state = o.state();
        assert_eq!(state.profile.email.as_deref(), Some("ash@example.com"));
        assert_eq!(state.qualification_tier, QualificationTier::Three);
        assert_eq!(state.journey_progress, 40);
    }

    #[test]
    fn test_events_set_flags() {
        let mut o = orchestrator();
        o.record_pageview();
        o.record_pageview();
        o.track_event(EventType::PdfDownloaded, None);
        o.track_event(EventType::ConsultationRequested, Some(serde_json::json!({"slot": "am"})));

        let state = o.state();
        assert_eq!(state.pageviews, 2);
        assert!(state.has_downloaded_pdf);
        assert!(state.has_requested_consultation);
        assert_eq!(state.lead_score, 35);
        assert_eq!(state.temperature, Temperature::Hot);
    }

    #[test]
    fn test_analytics_capped() {
        let config = JourneyConfig {
            analytics_cap: 5,
            ..Default::default()
        };
        let mut o = JourneyOrchestrator::new(MemoryStore::new(), config);
        for _ in 0..8 {
            o.record_pageview();
        }
        o.track_event(EventType::GateShown, None);

        let analytics = &o.state().analytics;
        assert_eq!(analytics.len(), 5);
        assert_eq!(analytics.last().map(|e| e.event_type), Some(EventType::GateShown));
        assert_eq!(o.state().pageviews, 8);
    }

    #[test]
    fn test_capture_lead() {
        let mut o = orchestrator();
        let constants = PensionConstants::default();
        o.run_calculator(annuity_input(65), &constants, None).unwrap();
        o.capture_lead(
            UserProfile {
                email: Some("max@example.com".into()),
                ..Default::default()
            },
            Some(CalculatorType::Annuity),
        );

        let state = o.state();
        assert_eq!(state.leads.len(), 1);
        assert_eq!(state.leads[0].result_value, Some(dec!(4950)));
        assert_eq!(state.profile.email.as_deref(), Some("max@example.com"));
        assert_eq!(o.check_gate().reason, GateReason::AlreadyCaptured);
    }

    #[test]
    fn test_leads_capped() {
        let config = JourneyConfig {
            leads_cap: 3,
            ..Default::default()
        };
        let mut o = JourneyOrchestrator::new(MemoryStore::new(), config);
        for i in 0..5 {
            o.capture_lead(
                UserProfile {
                    email: Some(format!("lead{}@example.com", i)),
                    ..Default::default()
                },
                None,
            );
        }

        let leads = &o.state().leads;
        assert_eq!(leads.len(), 3);
        assert_eq!(leads[0].email.as_deref(), Some("lead2@example.com"));
        assert_eq!(leads[2].email.as_deref(), Some("lead4@example.com"));
        assert_eq!(o.store().load().map(|s| s.leads.len()), Some(3));
    }

    #[test]
    fn test_reopening_current_journey_does_not_rewrite() {
        let mut o = orchestrator();
        o.update_profile(UserProfile {
            email: Some("a@example.com".into()),
            ..Default::default()
        });
        let kv = o.store().kv().clone();
        let saved = kv.get("pension_journey_state").unwrap();

        let reopened = JourneyOrchestrator::new(kv, JourneyConfig::default());
        assert_eq!(reopened.state().user_id, o.state().user_id);
        assert_eq!(reopened.state().last_updated, o.state().last_updated);
        assert_eq!(reopened.store().kv().get("pension_journey_state").unwrap(), saved);
    }

    #[test]
    fn test_new_journey_is_persisted() {
        let o = orchestrator();
        assert_eq!(o.store().load().map(|s| s.user_id), Some(o.state().user_id));
    }

    #[test]
    fn test_persistence_failure_is_swallowed() {
        let mut o = JourneyOrchestrator::new(BrokenStore, JourneyConfig::default());
        o.track_event(EventType::PdfDownloaded, None);
        assert!(o.state().has_downloaded_pdf);
        o.reset();
        assert!(!o.state().has_downloaded_pdf);
    }

    #[test]
    fn test_reset_starts_fresh_journey() {
        let mut o = orchestrator();
        let first = o.state().user_id;
        o.update_profile(UserProfile {
            email: Some("a@example.com".into()),
            ..Default::default()
        });
        o.reset();

        assert_ne!(o.state().user_id, first);
        assert!(o.state().profile.email.is_none());
        assert_eq!(o.store().load().map(|s| s.user_id), Some(o.state().user_id));
    }

    #[test]
    fn test_session_time_accumulates() {
        let mut o = orchestrator();
        o.add_session_time(200);
        assert_eq!(o.state().lead_score, 0);
        o.add_session_time(200);
        assert_eq!(o.state().total_session_time, 400);
        assert_eq!(o.state().lead_score, 5);
    }
}
