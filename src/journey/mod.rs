//! Visitor journey: state model, persistence, derivation and orchestration

mod derive;
mod orchestrator;
mod recommend;
mod snapshot;
mod store;
mod ticker;
mod types;

pub use derive::derive_metrics;
pub use orchestrator::JourneyOrchestrator;
pub use recommend::{recommended_action, CALCULATOR_SEQUENCE};
pub use snapshot::build_snapshot;
pub use store::{FileStore, JourneyStateStore, KeyValueStore, MemoryStore};
pub use ticker::SessionTicker;
pub use types::{
    ActionType, AnalyticsEvent, EmploymentStatus, EventType, FinancialSnapshot, JourneyCalculatorResult,
    LeadRecord, NextAction, Priority, QualificationTier, Temperature, UserJourneyState, UserProfile, Urgency,
    UtmParams,
};
