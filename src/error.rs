//! Error types for calculators, the journey store and the orchestrator

use thiserror::Error;

use crate::calculators::CalculatorType;

/// Result alias for calculator entry points
pub type CalcResult<T> = Result<T, CalcError>;

/// Failure of a single calculation. No partial result is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    /// An input field is outside its permitted range
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },

    /// Inputs are individually valid but contradict each other
    #[error("invalid range for {field}: {reason}")]
    InvalidRange {
        field: &'static str,
        reason: String,
    },

    /// Constants table cannot support the calculation (e.g. empty rate table)
    #[error("constants table is missing {0}")]
    MissingConstant(&'static str),
}

/// Persistence failures. Always recovered locally by the orchestrator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by journey operations
#[derive(Debug, Error)]
pub enum JourneyError {
    #[error("calculator input is for {input} but the result is for {output}")]
    MismatchedCalculator {
        input: CalculatorType,
        output: CalculatorType,
    },

    #[error(transparent)]
    Calculation(#[from] CalcError),
}

/// Error raised while loading a constants table from disk
#[derive(Debug, Error)]
pub enum ConstantsError {
    #[error("failed to read constants: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed constants file: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown constant '{0}'")]
    UnknownKey(String),

    #[error("constant '{key}' has invalid value '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Error raised while loading a journey configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message_names_field() {
        let err = CalcError::OutOfRange {
            field: "ni_years",
            value: "51".into(),
            min: "0".into(),
            max: "50".into(),
        };
        assert_eq!(err.to_string(), "ni_years must be between 0 and 50 (got 51)");
    }

    #[test]
    fn test_mismatch_message() {
        let err = JourneyError::MismatchedCalculator {
            input: CalculatorType::StatePension,
            output: CalculatorType::Sipp,
        };
        assert!(err.to_string().contains("state-pension"));
        assert!(err.to_string().contains("sipp"));
    }
}
