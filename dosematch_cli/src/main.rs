use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dosematch_core::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "dosematch")]
#[command(about = "Prescription quantity and package matching", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a SIG into a structured dosing instruction
    Parse {
        /// Free-text instructions, e.g. "take 1 tablet twice daily"
        sig: String,

        /// Days of therapy to supply
        #[arg(long)]
        days: u32,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compute the total quantity to dispense for a SIG
    Quantity {
        sig: String,

        #[arg(long)]
        days: u32,
    },

    /// Recommend packages for a target quantity
    Recommend {
        /// Quantity to dispense, in canonical units
        #[arg(long)]
        target: f64,

        /// Unit of the target (any alias, e.g. tablets, ml, puffs)
        #[arg(long, default_value = "EA")]
        unit: String,

        /// Package catalog (.json or .csv)
        #[arg(long)]
        catalog: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Parse, compute quantity and recommend packages in one step
    Run {
        sig: String,

        #[arg(long)]
        days: u32,

        #[arg(long)]
        catalog: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Output of `parse --json`
#[derive(Serialize)]
struct ParseReport {
    parsed: Option<DosingInstruction>,
    abstained: Option<String>,
}

/// Output of `recommend --json`
#[derive(Serialize)]
struct RecommendReport {
    target: f64,
    unit: CanonicalUnit,
    recommendation: Recommendation,
    warnings: Vec<Warning>,
}

/// Output of `run --json`
#[derive(Serialize)]
struct RunReport {
    generated_at: DateTime<Utc>,
    elapsed_ms: u64,
    dosing: DosingInstruction,
    target_quantity: u32,
    recommendation: Recommendation,
    warnings: Vec<Warning>,
}

fn main() -> Result<()> {
    // Keep stdout clean for --json consumers
    dosematch_core::logging::init_with_level("warn");

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse { sig, days, json } => cmd_parse(&config, &sig, days, json),
        Commands::Quantity { sig, days } => cmd_quantity(&config, &sig, days),
        Commands::Recommend {
            target,
            unit,
            catalog,
            json,
        } => cmd_recommend(&config, target, &unit, &catalog, json),
        Commands::Run {
            sig,
            days,
            catalog,
            json,
        } => cmd_run(&config, &sig, days, &catalog, json),
        Commands::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn cmd_parse(config: &Config, sig: &str, days: u32, json: bool) -> Result<()> {
    let outcome = config.sig_parser().parse(sig, days);

    if json {
        let report = match outcome {
            ParseOutcome::Parsed(dosing) => ParseReport {
                parsed: Some(dosing),
                abstained: None,
            },
            ParseOutcome::Abstained(reason) => ParseReport {
                parsed: None,
                abstained: Some(describe_abstention(&reason)),
            },
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match outcome {
        ParseOutcome::Parsed(dosing) => display_dosing(&dosing),
        ParseOutcome::Abstained(reason) => {
            println!("No confident parse: {}", describe_abstention(&reason));
        }
    }
    Ok(())
}

fn cmd_quantity(config: &Config, sig: &str, days: u32) -> Result<()> {
    let dosing = resolve_dosing(&config.sig_parser(), None, sig, days);
    let total = compute_total_units(&dosing)?;

    println!("{} {}", total, dosing.unit);
    display_warnings(&sig_warnings(&dosing, config.sig.min_confidence));
    Ok(())
}

fn cmd_recommend(
    config: &Config,
    target: f64,
    unit: &str,
    catalog_path: &Path,
    json: bool,
) -> Result<()> {
    let unit = normalize(unit);
    let catalog = load_valid_catalog(catalog_path)?;
    let recommendation = recommend(target, unit, &catalog, &config.packs)?;
    let warnings = generate_warnings(&recommendation, &catalog, target);

    if json {
        let report = RecommendReport {
            target,
            unit,
            recommendation,
            warnings,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    display_recommendation(&recommendation);
    display_warnings(&warnings);
    Ok(())
}

fn cmd_run(config: &Config, sig: &str, days: u32, catalog_path: &Path, json: bool) -> Result<()> {
    let started = Instant::now();
    let generated_at = Utc::now();

    let catalog = load_valid_catalog(catalog_path)?;

    let dosing = resolve_dosing(&config.sig_parser(), None, sig, days);
    let target_quantity = compute_total_units(&dosing)?;
    let recommendation = recommend(
        f64::from(target_quantity),
        dosing.unit,
        &catalog,
        &config.packs,
    )?;

    let mut warnings = sig_warnings(&dosing, config.sig.min_confidence);
    warnings.extend(generate_warnings(
        &recommendation,
        &catalog,
        f64::from(target_quantity),
    ));

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!("Pipeline completed in {} ms", elapsed_ms);

    if json {
        let report = RunReport {
            generated_at,
            elapsed_ms,
            dosing,
            target_quantity,
            recommendation,
            warnings,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    display_dosing(&dosing);
    println!("  Target quantity: {} {}", target_quantity, dosing.unit);
    display_recommendation(&recommendation);
    display_warnings(&warnings);
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn describe_abstention(reason: &AbstainReason) -> String {
    match reason {
        AbstainReason::NoDose => "no dose found".to_string(),
        AbstainReason::LowConfidence(rejected) => {
            format!("confidence {:.2} below threshold", rejected.confidence)
        }
    }
}

fn display_dosing(dosing: &DosingInstruction) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DOSING INSTRUCTION");
    println!("╰─────────────────────────────────────────╯");
    println!();

    match dosing.amount_max {
        Some(max) => println!("  Dose: {}-{} {}", dosing.amount_per_dose, max, dosing.unit),
        None => println!("  Dose: {} {}", dosing.amount_per_dose, dosing.unit),
    }
    match dosing.frequency_max {
        Some(max) => println!("  Frequency: {}-{}x daily", dosing.frequency_per_day, max),
        None => println!("  Frequency: {}x daily", dosing.frequency_per_day),
    }
    println!("  Days supply: {}", dosing.days_supply);
    println!("  Max daily dose: {} {}", dosing.max_daily_dose, dosing.unit);

    if let Some(ref route) = dosing.route {
        println!("  Route: {}", route);
    }
    if let Some(ref duration) = dosing.duration {
        println!("  Duration: {} {:?}", duration.value, duration.unit);
    }
    if dosing.is_as_needed {
        match dosing.indication {
            Some(ref indication) => println!("  As needed for {}", indication),
            None => println!("  As needed"),
        }
    }
    println!(
        "  Confidence: {:.2} ({:?})",
        dosing.confidence, dosing.origin
    );
    println!();
}

fn display_option(option: &RecommendationOption) {
    let packs: Vec<String> = option
        .packs_used
        .iter()
        .map(|p| format!("{} x {}", p.count, p.package_id))
        .collect();

    println!(
        "  {} [{}] {} ({} {} dispensed, score {:.1})",
        option.match_type,
        option.status,
        packs.join(" + "),
        option.total_dispensed,
        option.unit,
        option.score
    );
    if !option.badges.is_empty() {
        println!("    Badges: {}", option.badges.join(", "));
    }
    println!("    {}", option.rationale);
}

fn display_recommendation(recommendation: &Recommendation) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  RECOMMENDED PACKAGE");
    println!("╰─────────────────────────────────────────╯");
    println!();
    display_option(&recommendation.recommended);

    if !recommendation.alternatives.is_empty() {
        println!();
        println!("  Alternatives:");
        for alternative in &recommendation.alternatives {
            display_option(alternative);
        }
    }
    println!();
}

fn display_warnings(warnings: &[Warning]) {
    for warning in warnings {
        println!("  ⚠ {}: {}", warning.code, warning.message);
    }
}
