//! Pension Journey CLI
//!
//! Runs calculators and drives a visitor journey persisted in a directory

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pension_journey::calculators::{self, CalculatorInput, CalculatorType};
use pension_journey::constants::loader::DEFAULT_CONSTANTS_PATH;
use pension_journey::journey::{EventType, Urgency};
use pension_journey::{FileStore, JourneyConfig, JourneyOrchestrator, PensionConstants, SessionTicker, UserProfile};

#[derive(Parser)]
#[command(name = "pension-journey")]
#[command(about = "UK pension calculators and lead-qualification journey")]
struct Cli {
    /// Directory holding the persisted journey
    #[arg(long, default_value = ".pension_journey")]
    store_dir: PathBuf,

    /// Journey configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with constants.csv (and optionally annuity_rates.csv); defaults to data/constants when present
    #[arg(long)]
    constants: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a calculator
    Calc {
        /// Calculator slug, e.g. state-pension or workplace-pension
        kind: String,
        /// Input as inline JSON or a path to a JSON file
        #[arg(long)]
        input: String,
        /// Record the result in the journey
        #[arg(long)]
        record: bool,
        /// Seconds spent on the calculator
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Update profile fields
    Profile {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        income: Option<Decimal>,
        /// low, medium or high
        #[arg(long)]
        urgency: Option<String>,
        /// Submit as a lead capture for this calculator slug
        #[arg(long)]
        capture: Option<String>,
    },
    /// Record an analytics event, e.g. pdf_downloaded
    Event {
        event_type: String,
        /// Event payload (JSON)
        #[arg(long)]
        data: Option<String>,
    },
    /// Accumulate session time on the configured tick for a number of seconds
    Session {
        #[arg(long)]
        seconds: u64,
    },
    /// Print the journey state
    Status,
    /// Print the gate decision
    Gate,
    /// Print the recommended next action
    Next,
    /// Discard the journey and start a new one
    Reset,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a unit enum from its serde name
fn parse_name<T: DeserializeOwned>(what: &str, name: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(name.to_string()))
        .map_err(|_| anyhow!("unknown {}: {}", what, name))
}

fn parse_kind(slug: &str) -> Result<CalculatorType> {
    CalculatorType::from_slug(slug).ok_or_else(|| anyhow!("unknown calculator: {}", slug))
}

/// Read calculator input JSON and tag it with the calculator type
fn read_input(kind: CalculatorType, input: &str) -> Result<CalculatorInput> {
    let text = if Path::new(input).is_file() {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?
    } else {
        input.to_string()
    };

    let mut value: serde_json::Value = serde_json::from_str(&text).context("input is not valid JSON")?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("input must be a JSON object"))?;
    object.insert("calculator".to_string(), kind.slug().into());

    serde_json::from_value(value).with_context(|| format!("invalid input for {}", kind))
}

fn load_constants(path: Option<&Path>) -> Result<PensionConstants> {
    match path {
        Some(dir) => PensionConstants::from_csv_path(dir)
            .with_context(|| format!("failed to load constants from {}", dir.display())),
        None if Path::new(DEFAULT_CONSTANTS_PATH).is_dir() => {
            PensionConstants::from_csv()
                .with_context(|| format!("failed to load constants from {}", DEFAULT_CONSTANTS_PATH))
        }
        None => Ok(PensionConstants::default()),
    }
}

fn load_config(path: Option<&Path>) -> Result<JourneyConfig> {
    match path {
        Some(file) => JourneyConfig::from_json_path(file)
            .with_context(|| format!("failed to load config from {}", file.display())),
        None => Ok(JourneyConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let store = FileStore::new(&cli.store_dir);
    info!("journey store: {}", store.dir().display());

    match cli.command {
        Command::Calc {
            kind,
            input,
            record,
            duration,
        } => {
            let constants = load_constants(cli.constants.as_deref())?;
            let input = read_input(parse_kind(&kind)?, &input)?;
            let output = if record {
                let mut journey = JourneyOrchestrator::new(store, config);
                let output = journey.run_calculator(input, &constants, duration)?;
                info!(
                    "recorded {} (score {}, {} calculators)",
                    output.kind(),
                    journey.state().lead_score,
                    journey.state().completed_calculators
                );
                output
            } else {
                calculators::run(&input, &constants)?
            };
            for warning in output.warnings() {
                eprintln!("warning: {}", warning);
            }
            print_json(&output)?;
        }
        Command::Profile {
            email,
            name,
            phone,
            age,
            income,
            urgency,
            capture,
        } => {
            let profile = UserProfile {
                email,
                name,
                phone,
                age,
                income,
                urgency: urgency.map(|u| parse_name::<Urgency>("urgency", &u)).transpose()?,
                ..Default::default()
            };
            let mut journey = JourneyOrchestrator::new(store, config);
            match capture {
                Some(slug) => journey.capture_lead(profile, Some(parse_kind(&slug)?)),
                None => journey.update_profile(profile),
            }
            print_json(&journey.state().profile)?;
        }
        Command::Event { event_type, data } => {
            let event_type: EventType = parse_name("event type", &event_type)?;
            let data = data
                .map(|d| serde_json::from_str(&d))
                .transpose()
                .context("event data is not valid JSON")?;
            let mut journey = JourneyOrchestrator::new(store, config);
            journey.track_event(event_type, data);
            println!(
                "score {} ({}), tier {}",
                journey.state().lead_score,
                journey.state().temperature,
                journey.state().qualification_tier
            );
        }
        Command::Session { seconds } => {
            let tick = config.session_tick();
            let journey = Arc::new(tokio::sync::Mutex::new(JourneyOrchestrator::new(store, config)));
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("failed to start runtime")?;
            let total = runtime.block_on(async {
                let ticker = SessionTicker::start(Arc::clone(&journey), tick);
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                ticker.stop().await;
                journey.lock().await.state().total_session_time
            });
            println!("total session time: {}s", total);
        }
        Command::Status => {
            let journey = JourneyOrchestrator::new(store, config);
            print_json(journey.state())?;
        }
        Command::Gate => {
            let journey = JourneyOrchestrator::new(store, config);
            print_json(&journey.check_gate())?;
        }
        Command::Next => {
            let journey = JourneyOrchestrator::new(store, config);
            print_json(&journey.recommended_action())?;
        }
        Command::Reset => {
            let mut journey = JourneyOrchestrator::new(store, config);
            journey.reset();
            println!("new journey {}", journey.state().user_id);
        }
    }

    Ok(())
}
