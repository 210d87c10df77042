//! Project a block of workplace pensions from a CSV file
//!
//! Each input row is one member; each output row holds the headline results
//! of their projection, or the validation error that rejected it.

use anyhow::{Context, Result};
use log::{info, warn};
use pension_journey::calculators::{Calculator, DcPensionProjector, DcProjectionInput};
use pension_journey::constants::loader::DEFAULT_CONSTANTS_PATH;
use pension_journey::PensionConstants;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;

#[derive(Parser)]
#[command(name = "batch-projection")]
#[command(about = "Project workplace pensions for every row of a CSV file")]
struct Args {
    /// Input CSV of members
    input: PathBuf,

    /// Output CSV
    #[arg(long, default_value = "batch_projection_output.csv")]
    output: PathBuf,

    /// Directory with constants.csv overrides
    #[arg(long)]
    constants: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    member_id: String,
    current_age: u32,
    retirement_age: u32,
    current_pot_value: Decimal,
    monthly_contribution: Decimal,
    #[serde(default)]
    employer_contribution: Decimal,
    #[serde(default)]
    tax_relief_at_source: bool,
    #[serde(default)]
    annual_growth_pct: Option<Decimal>,
    #[serde(default)]
    annual_charges_pct: Option<Decimal>,
}

impl MemberRow {
    fn to_input(&self) -> DcProjectionInput {
        DcProjectionInput {
            current_age: self.current_age,
            retirement_age: self.retirement_age,
            current_pot_value: self.current_pot_value,
            monthly_contribution: self.monthly_contribution,
            employer_contribution: self.employer_contribution,
            tax_relief_at_source: self.tax_relief_at_source,
            annual_growth_pct: self.annual_growth_pct,
            annual_charges_pct: self.annual_charges_pct,
            inflation_pct: None,
            lump_sum_pct: None,
            income_method: None,
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct OutputRow {
    member_id: String,
    years_to_retirement: Option<u32>,
    projected_pot: Option<Decimal>,
    real_value: Option<Decimal>,
    total_contributions: Option<Decimal>,
    total_growth: Option<Decimal>,
    tax_free_lump_sum: Option<Decimal>,
    annual_income: Option<Decimal>,
    error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let constants = match &args.constants {
        Some(dir) => PensionConstants::from_csv_path(dir)
            .with_context(|| format!("failed to load constants from {}", dir.display()))?,
        None if Path::new(DEFAULT_CONSTANTS_PATH).is_dir() => {
            PensionConstants::from_csv().context("failed to load bundled constants")?
        }
        None => PensionConstants::default(),
    };

    let start = Instant::now();
    let mut reader =
        csv::Reader::from_path(&args.input).with_context(|| format!("failed to open {}", args.input.display()))?;
    let members: Vec<MemberRow> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .context("failed to parse member rows")?;
    info!("Loaded {} members in {:?}", members.len(), start.elapsed());

    let projector = DcPensionProjector::new(&constants);
    let proj_start = Instant::now();

    // Run projections in parallel
    let rows: Vec<OutputRow> = members
        .par_iter()
        .map(|member| match projector.calculate(&member.to_input()) {
            Ok(result) => OutputRow {
                member_id: member.member_id.clone(),
                years_to_retirement: Some(result.years_to_retirement),
                projected_pot: Some(result.projected_pot),
                real_value: Some(result.real_value),
                total_contributions: Some(result.total_contributions),
                total_growth: Some(result.total_growth),
                tax_free_lump_sum: Some(result.tax_free_lump_sum),
                annual_income: Some(result.annual_income),
                error: None,
            },
            Err(e) => OutputRow {
                member_id: member.member_id.clone(),
                error: Some(e.to_string()),
                ..Default::default()
            },
        })
        .collect();
    info!("Projections complete in {:?}", proj_start.elapsed());

    let rejected = rows.iter().filter(|r| r.error.is_some()).count();
    if rejected > 0 {
        warn!("{} of {} members rejected", rejected, rows.len());
    }

    let mut writer =
        csv::Writer::from_path(&args.output).with_context(|| format!("failed to create {}", args.output.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let total: Decimal = rows.iter().filter_map(|r| r.projected_pot).sum();
    println!("Projected {} members, total pot {}", rows.len() - rejected, total.round_dp(2));
    println!("Output written to {}", args.output.display());
    Ok(())
}
