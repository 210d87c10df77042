//! Financial calculators
//!
//! Every calculator is a pure function of its typed input and the constants
//! table. [`run`] dispatches the tagged [`CalculatorInput`] union used by the
//! journey and the CLI.

mod common;
mod growth;
mod income_tax;
mod state_pension;
mod dc_projection;
mod tax_relief;
mod drawdown;
mod annuity;
mod sipp;
mod lump_sum_tax;

pub use common::{BreakdownItem, Calculator, CalculatorType, ProjectionPoint, ResultSummary, MAX_AMOUNT};
pub use growth::{AccumulationPlan, GrowthYear, IncomeMethod};
pub use income_tax::{employee_ni, employer_ni, tax_on_top_slice};
pub use state_pension::{
    age_on, state_pension_age, StatePensionForecaster, StatePensionInput, StatePensionResult,
};
pub use dc_projection::{DcPensionProjector, DcProjectionInput, DcProjectionResult};
pub use tax_relief::{higher_rate_reclaim, TaxReliefInput, TaxReliefOptimizer, TaxReliefResult};
pub use drawdown::{
    sustainable_withdrawal, DrawdownInput, DrawdownResult, DrawdownSimulator, DrawdownYear, Phase, RiskLevel,
    Sustainability,
};
pub use annuity::{nearest_bracket_rate, AnnuityEstimator, AnnuityInput, AnnuityResult, Escalation};
pub use sipp::{SippInput, SippProjector, SippResult};
pub use lump_sum_tax::{LumpSumTaxEstimator, LumpSumTaxInput, LumpSumTaxResult, WithdrawalMethod};

use serde::{Deserialize, Serialize};

use crate::constants::PensionConstants;
use crate::error::CalcResult;

/// Input for any calculator, tagged with its calculator type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "calculator", rename_all = "kebab-case")]
pub enum CalculatorInput {
    StatePension(StatePensionInput),
    WorkplacePension(DcProjectionInput),
    TaxRelief(TaxReliefInput),
    PensionDrawdown(DrawdownInput),
    LumpSumTax(LumpSumTaxInput),
    Sipp(SippInput),
    Annuity(AnnuityInput),
}

impl CalculatorInput {
    pub fn kind(&self) -> CalculatorType {
        match self {
            CalculatorInput::StatePension(_) => CalculatorType::StatePension,
            CalculatorInput::WorkplacePension(_) => CalculatorType::WorkplacePension,
            CalculatorInput::TaxRelief(_) => CalculatorType::TaxRelief,
            CalculatorInput::PensionDrawdown(_) => CalculatorType::PensionDrawdown,
            CalculatorInput::LumpSumTax(_) => CalculatorType::LumpSumTax,
            CalculatorInput::Sipp(_) => CalculatorType::Sipp,
            CalculatorInput::Annuity(_) => CalculatorType::Annuity,
        }
    }
}

/// Result of any calculator, tagged with its calculator type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "calculator", rename_all = "kebab-case")]
pub enum CalculatorOutput {
    StatePension(StatePensionResult),
    WorkplacePension(DcProjectionResult),
    TaxRelief(TaxReliefResult),
    PensionDrawdown(DrawdownResult),
    LumpSumTax(LumpSumTaxResult),
    Sipp(SippResult),
    Annuity(AnnuityResult),
}

impl CalculatorOutput {
    pub fn kind(&self) -> CalculatorType {
        match self {
            CalculatorOutput::StatePension(_) => CalculatorType::StatePension,
            CalculatorOutput::WorkplacePension(_) => CalculatorType::WorkplacePension,
            CalculatorOutput::TaxRelief(_) => CalculatorType::TaxRelief,
            CalculatorOutput::PensionDrawdown(_) => CalculatorType::PensionDrawdown,
            CalculatorOutput::LumpSumTax(_) => CalculatorType::LumpSumTax,
            CalculatorOutput::Sipp(_) => CalculatorType::Sipp,
            CalculatorOutput::Annuity(_) => CalculatorType::Annuity,
        }
    }

    /// Journey-scoped summary (primary value, named secondary values, breakdown)
    pub fn summary(&self) -> ResultSummary {
        match self {
            CalculatorOutput::StatePension(r) => r.summary(),
            CalculatorOutput::WorkplacePension(r) => r.summary(),
            CalculatorOutput::TaxRelief(r) => r.summary(),
            CalculatorOutput::PensionDrawdown(r) => r.summary(),
            CalculatorOutput::LumpSumTax(r) => r.summary(),
            CalculatorOutput::Sipp(r) => r.summary(),
            CalculatorOutput::Annuity(r) => r.summary(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            CalculatorOutput::StatePension(r) => &r.warnings,
            CalculatorOutput::WorkplacePension(r) => &r.warnings,
            CalculatorOutput::TaxRelief(r) => &r.warnings,
            CalculatorOutput::PensionDrawdown(r) => &r.warnings,
            CalculatorOutput::LumpSumTax(r) => &r.warnings,
            CalculatorOutput::Sipp(r) => &r.warnings,
            CalculatorOutput::Annuity(r) => &r.warnings,
        }
    }
}

/// Run the calculator matching `input`
pub fn run(input: &CalculatorInput, constants: &PensionConstants) -> CalcResult<CalculatorOutput> {
    Ok(match input {
        CalculatorInput::StatePension(i) => {
            CalculatorOutput::StatePension(StatePensionForecaster::new(constants).calculate(i)?)
        }
        CalculatorInput::WorkplacePension(i) => {
            CalculatorOutput::WorkplacePension(DcPensionProjector::new(constants).calculate(i)?)
        }
        CalculatorInput::TaxRelief(i) => CalculatorOutput::TaxRelief(TaxReliefOptimizer::new(constants).calculate(i)?),
        CalculatorInput::PensionDrawdown(i) => {
            CalculatorOutput::PensionDrawdown(DrawdownSimulator::new(constants).calculate(i)?)
        }
        CalculatorInput::LumpSumTax(i) => {
            CalculatorOutput::LumpSumTax(LumpSumTaxEstimator::new(constants).calculate(i)?)
        }
        CalculatorInput::Sipp(i) => CalculatorOutput::Sipp(SippProjector::new(constants).calculate(i)?),
        CalculatorInput::Annuity(i) => CalculatorOutput::Annuity(AnnuityEstimator::new(constants).calculate(i)?),
    })
}
