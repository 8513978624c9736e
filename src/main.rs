use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::debug;

mod assembler;
mod baseline;
mod config;
mod context;
mod dataset;
mod errors;
mod features;
mod models;
mod regressor;
mod report;

use baseline::Extraction;
use config::AppConfig;
use context::AppContext;
use models::OverrideSet;

#[derive(Parser)]
#[command(name = "keep-me-engaged")]
#[command(about = "Explore how course features change predicted learner engagement", long_about = None)]
struct Cli {
    /// TOML file with data paths, column names and slider bounds
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    #[arg(long)]
    company: String,
    #[arg(long)]
    course: String,
}

#[derive(Args)]
struct Adjustments {
    /// Move one slider, e.g. --set "Content Pages=90" (repeatable)
    #[arg(long = "set", value_name = "FEATURE=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, i64)>,
    /// All seven slider values in rank order, comma separated
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        conflicts_with = "set"
    )]
    overrides: Option<Vec<i64>>,
}

#[derive(Subcommand)]
enum Commands {
    /// List companies in the dataset
    Companies,
    /// List a company's courses by engagement score
    Courses {
        #[arg(long)]
        company: String,
        /// Course to highlight
        #[arg(long)]
        course: Option<String>,
    },
    /// Show the seven adjustable features and their slider ranges
    Features,
    /// Show the current engagement score and features of a course
    Baseline {
        #[command(flatten)]
        selection: Selection,
    },
    /// Predict the engagement score after adjusting features
    Predict {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        adjustments: Adjustments,
    },
    /// Write a markdown what-if report
    Report {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        adjustments: Adjustments,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, i64), String> {
    let (name, value) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected FEATURE=VALUE, got '{raw}'"))?;
    let value = value
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not a whole number", value.trim()))?;
    Ok((name.trim().to_string(), value))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let config = AppConfig::load(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            Ok(config.resolve_paths(base))
        }
        None => Ok(AppConfig::default()),
    }
}

fn build_overrides(extraction: &Extraction, adjustments: &Adjustments) -> anyhow::Result<OverrideSet> {
    if let Some(values) = &adjustments.overrides {
        return Ok(OverrideSet {
            values: values.clone(),
        });
    }

    let mut overrides = OverrideSet::from_baseline(&extraction.baseline, &extraction.adjustable);
    for (feature, value) in &adjustments.set {
        overrides.set(&extraction.adjustable, feature, *value)?;
    }
    debug!("Slider positions: {:?}", overrides.values);
    Ok(overrides)
}

fn format_cell(value: Option<f64>) -> String {
    value.map_or_else(|| "missing".to_string(), |value| value.to_string())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let context = AppContext::load(config).context("failed to load reference data")?;

    match cli.command {
        Commands::Companies => {
            for company in context.dataset.companies() {
                println!("- {company}");
            }
        }
        Commands::Courses { company, course } => {
            let ranking = context
                .dataset
                .company_ranking(&company, course.as_deref())?;
            println!("Courses at {company} by engagement score:");
            for entry in ranking {
                println!(
                    "- {}{} score {:.0} ({} users)",
                    entry.course,
                    if entry.selected { " (selected)" } else { "" },
                    entry.display_score,
                    format_cell(entry.user_count)
                );
            }
        }
        Commands::Features => {
            println!("Adjustable features, most important first:");
            for feature in &context.adjustable {
                println!(
                    "{}. {} [{}-{}]{}{}",
                    feature.rank,
                    feature.name,
                    feature.bound.min,
                    feature.bound.max,
                    feature
                        .importance
                        .map(|importance| format!(" importance {importance:.3}"))
                        .unwrap_or_default(),
                    features::describe(&feature.name)
                        .map(|text| format!(": {text}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Baseline { selection } => {
            let extraction = context.extract(&selection.company, &selection.course)?;
            let baseline = &extraction.baseline;
            println!(
                "Current engagement score for course {} at {}: {:.0} (recorded {})",
                baseline.course, baseline.company, baseline.display_score, baseline.engagement_score
            );
            for feature in &extraction.adjustable {
                println!(
                    "- {}: {}",
                    feature.name,
                    format_cell(baseline.value(&feature.name))
                );
            }
        }
        Commands::Predict {
            selection,
            adjustments,
        } => {
            let extraction = context.extract(&selection.company, &selection.course)?;
            let overrides = build_overrides(&extraction, &adjustments)?;
            let prediction = context.predict(&extraction, &overrides)?;
            println!(
                "Updated engagement score for course {}: {:.1} (currently {:.0})",
                extraction.baseline.course, prediction.value, extraction.baseline.display_score
            );
        }
        Commands::Report {
            selection,
            adjustments,
            out,
        } => {
            let extraction = context.extract(&selection.company, &selection.course)?;
            let ranking = context
                .dataset
                .company_ranking(&selection.company, Some(selection.course.as_str()))?;
            let overrides = build_overrides(&extraction, &adjustments)?;
            let prediction = context.predict(&extraction, &overrides)?;
            let report = report::build_report(
                Utc::now().date_naive(),
                &extraction,
                &ranking,
                &overrides,
                &prediction,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
