//! Pension Journey - UK pension calculators driving a lead-qualification journey
//!
//! This library provides:
//! - State Pension, workplace, SIPP, drawdown, annuity, tax relief and lump sum tax calculators
//! - A versioned table of tax-year constants with CSV overrides
//! - A persisted visitor journey with a derived financial snapshot
//! - Lead scoring, qualification tiers and progressive gate decisions
//! - Next-action recommendations and session-time tracking

pub mod calculators;
pub mod config;
pub mod constants;
pub mod error;
pub mod gate;
pub mod journey;
pub mod money;
pub mod scoring;

// Re-export commonly used types
pub use calculators::{run, Calculator, CalculatorInput, CalculatorOutput, CalculatorType, ResultSummary};
pub use config::JourneyConfig;
pub use constants::PensionConstants;
pub use error::{CalcError, CalcResult, JourneyError, StoreError};
pub use gate::{check_gate, GateDecision, GateReason};
pub use journey::{
    FileStore, JourneyOrchestrator, KeyValueStore, MemoryStore, SessionTicker, UserJourneyState, UserProfile,
};
