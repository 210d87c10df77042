//! Journey configuration: storage keys, history caps, session ticking and
//! lead scoring weights

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Keys under which the journey is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub state: String,
    pub leads: String,
    pub analytics: String,
    /// Bare email string written by older versions; read once for migration
    pub legacy_email: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            state: "pension_journey_state".to_string(),
            leads: "pension_leads".to_string(),
            analytics: "pension_analytics".to_string(),
            legacy_email: "pension_user_email".to_string(),
        }
    }
}

/// Points awarded by the lead scoring engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub email: u32,
    pub name: u32,
    pub phone: u32,
    pub age: u32,
    pub income: u32,
    pub per_calculator: u32,
    pub calculator_cap: u32,
    pub session_threshold_secs: u64,
    pub session_bonus: u32,
    pub gap_medium_threshold: Decimal,
    pub gap_medium_bonus: u32,
    pub gap_large_threshold: Decimal,
    pub gap_large_bonus: u32,
    pub pot_medium_threshold: Decimal,
    pub pot_medium_bonus: u32,
    pub pot_large_threshold: Decimal,
    pub pot_large_bonus: u32,
    pub pdf_downloaded: u32,
    pub consultation_requested: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            email: 10,
            name: 5,
            phone: 15,
            age: 5,
            income: 5,
            per_calculator: 8,
            calculator_cap: 40,
            session_threshold_secs: 300,
            session_bonus: 5,
            gap_medium_threshold: dec!(10000),
            gap_medium_bonus: 5,
            gap_large_threshold: dec!(50000),
            gap_large_bonus: 10,
            pot_medium_threshold: dec!(50000),
            pot_medium_bonus: 5,
            pot_large_threshold: dec!(200000),
            pot_large_bonus: 10,
            pdf_downloaded: 10,
            consultation_requested: 25,
        }
    }
}

/// Runtime configuration of the journey engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JourneyConfig {
    pub keys: StorageKeys,
    /// Most recent analytics events kept
    pub analytics_cap: usize,
    /// Most recent lead submissions kept
    pub leads_cap: usize,
    pub session_tick_secs: u64,
    pub scoring: ScoringWeights,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            keys: StorageKeys::default(),
            analytics_cap: 100,
            leads_cap: 500,
            session_tick_secs: 30,
            scoring: ScoringWeights::default(),
        }
    }
}

impl JourneyConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn session_tick(&self) -> Duration {
        Duration::from_secs(self.session_tick_secs.max(1))
    }
}
