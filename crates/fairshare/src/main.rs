//! fairshare - inspect and maintain the fairshare usage database
//!
//! Every invocation is one accounting transaction: load the settings, the
//! group file and the usage database, run one command, and write the
//! database back if the command changed it.

mod print;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fairshare_config::{Settings, load_config, load_groups};
use fairshare_core::{Accounting, FairshareTree, TrimPolicy};
use fairshare_store::{UsageFile, UsageStore};
use fairshare_util::default_config_path;
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// fairshare - fairshare usage accounting
#[derive(Parser, Debug)]
#[command(name = "fairshare", version)]
#[command(about = "Inspect and maintain the fairshare usage database", long_about = None)]
struct Args {
    /// Settings file (default: ~/.config/fairshare/fairshare.toml)
    #[arg(short, long, env = "FAIRSHARE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory override (or set FAIRSHARE_HOME env var)
    #[arg(short, long, env = "FAIRSHARE_HOME")]
    data_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Drop usage records for entities missing from the group file
    #[arg(long)]
    prune: bool,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show an entity and the path to it from the root
    Get { entity: String },

    /// Replace an entity's usage
    Set {
        entity: String,
        #[arg(allow_hyphen_values = true)]
        usage: f64,
    },

    /// Add to an entity's usage (negative values subtract)
    Add {
        entity: String,
        #[arg(allow_hyphen_values = true)]
        delta: f64,
    },

    /// Decay every entity's usage by the configured factor
    Decay,

    /// List every entity
    Print,

    /// Show the tree hierarchically
    Tree,

    /// Show which of two entities has the higher priority
    Compare { a: String, b: String },

    /// Remove usage records for entities no longer in the group file
    Trim,

    /// Validate the settings and group file without writing anything
    Check,
}

#[derive(Serialize)]
struct UsageChange<'a> {
    name: &'a str,
    previous: f64,
    usage: f64,
}

#[derive(Serialize)]
struct Comparison<'a> {
    a: &'a str,
    b: &'a str,
    ordering: &'static str,
    /// `None` when the two are equal
    higher_priority: Option<&'a str>,
}

#[derive(Serialize)]
struct CheckSummary {
    group_file: PathBuf,
    usage_file: PathBuf,
    entities: usize,
    records: usize,
    stale: Vec<String>,
    decay_factor: f64,
    decay_interval_seconds: u64,
}

fn main() -> ExitCode {
    // usage errors exit 1 like every other failure; --help and --version exit 0
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fairshare: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let settings = load_settings(args)?;

    match &args.command {
        Command::Get { entity } => {
            let acct = open_session(args, &settings)?;
            let detail = acct.detail(entity)?;
            if args.json {
                print_json(&detail)?;
            } else {
                print!("{}", print::detail(&detail, acct.usage_unit()));
            }
        }
        Command::Set { entity, usage } => {
            let mut acct = open_session(args, &settings)?;
            let previous = acct.set_usage(entity, *usage)?;
            report_change(args.json, entity, previous, *usage)?;
        }
        Command::Add { entity, delta } => {
            let mut acct = open_session(args, &settings)?;
            let previous = acct.usage(entity)?;
            let usage = acct.add_usage(entity, *delta)?;
            report_change(args.json, entity, previous, usage)?;
        }
        Command::Decay => {
            let mut acct = open_session(args, &settings)?;
            let changed = acct.decay_all()?;
            let factor = acct.decay_engine().factor().get();
            let interval = settings.fairshare.decay_interval.as_secs();
            if args.json {
                print_json(&serde_json::json!({
                    "factor": factor,
                    "changed": changed,
                    "decay_interval_seconds": interval,
                }))?;
            } else {
                println!("Decayed usage of {changed} entities by {factor}");
            }
        }
        Command::Print => {
            let acct = open_session(args, &settings)?;
            let report = acct.report();
            if args.json {
                print_json(&report)?;
            } else {
                println!("Fairshare usage units are in: {}", acct.usage_unit());
                print!("{}", print::flat(&report));
            }
        }
        Command::Tree => {
            let report = open_session(args, &settings)?.report();
            if args.json {
                print_json(&report)?;
            } else {
                print!("{}", print::tree(&report));
            }
        }
        Command::Compare { a, b } => {
            let acct = open_session(args, &settings)?;
            let (a, b) = (a.as_str(), b.as_str());
            let ordering = acct.compare(a, b)?;
            let comparison = Comparison {
                a,
                b,
                ordering: match ordering {
                    Ordering::Less => "less",
                    Ordering::Equal => "equal",
                    Ordering::Greater => "greater",
                },
                higher_priority: match ordering {
                    Ordering::Less => Some(a),
                    Ordering::Equal => None,
                    Ordering::Greater => Some(b),
                },
            };
            if args.json {
                print_json(&comparison)?;
            } else {
                match comparison.higher_priority {
                    Some(name) => println!("{name}"),
                    None => println!("{a} == {b}"),
                }
            }
        }
        Command::Trim => {
            let mut acct = open_session(args, &settings)?;
            let removed = acct.trim()?;
            if args.json {
                print_json(&serde_json::json!({ "removed": removed }))?;
            } else {
                println!("Removed {removed} stale usage records");
            }
        }
        Command::Check => check(&settings, args.json)?,
    }

    Ok(())
}

fn open_session(args: &Args, settings: &Settings) -> Result<Accounting> {
    let usage_path = settings.paths.usage_path();
    if let Some(dir) = usage_path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
    }

    let trim = TrimPolicy::from_flag(args.prune || settings.fairshare.trim_on_load);
    let acct = Accounting::load_with_settings(
        settings,
        settings.paths.group_path(),
        &usage_path,
        trim,
    )?;
    Ok(acct)
}

/// Settings from `--config`, the default location, or built-in defaults
fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                load_config(&path)
                    .with_context(|| format!("Failed to load settings from {}", path.display()))?
            } else {
                debug!(path = %path.display(), "No settings file, using defaults");
                Settings::default()
            }
        }
    };

    if let Some(dir) = &args.data_dir {
        settings.paths = settings.paths.with_data_dir(dir);
    }

    info!(
        data_dir = %settings.paths.data_dir.display(),
        decay_factor = settings.fairshare.decay_factor.get(),
        "Settings loaded"
    );
    Ok(settings)
}

fn check(settings: &Settings, json: bool) -> Result<()> {
    let group_path = settings.paths.group_path();
    let usage_path = settings.paths.usage_path();

    let decls = load_groups(&group_path)?;
    let tree = FairshareTree::build(&decls, settings.fairshare.unknown_shares)?;

    let records = UsageFile::open(&usage_path, settings.paths.touch_path())
        .load()
        .with_context(|| format!("Failed to read usage database {}", usage_path.display()))?;
    let stale: Vec<String> = records
        .iter()
        .filter(|(name, _)| tree.find(name).is_none())
        .map(|(name, _)| name.to_string())
        .collect();

    let summary = CheckSummary {
        group_file: group_path,
        usage_file: usage_path,
        entities: tree.len(),
        records: records.len(),
        stale,
        decay_factor: settings.fairshare.decay_factor.get(),
        decay_interval_seconds: settings.fairshare.decay_interval.as_secs(),
    };

    if json {
        print_json(&summary)?;
    } else {
        println!("Group file OK: {}", display(&summary.group_file));
        println!("  Entities: {}", summary.entities);
        println!("Usage database OK: {}", display(&summary.usage_file));
        println!("  Records: {}", summary.records);
        if !summary.stale.is_empty() {
            println!("  Stale records: {}", summary.stale.join(", "));
        }
        println!(
            "Decay: factor {} every {}s",
            summary.decay_factor, summary.decay_interval_seconds
        );
    }
    Ok(())
}

fn report_change(json: bool, name: &str, previous: f64, usage: f64) -> Result<()> {
    if json {
        print_json(&UsageChange {
            name,
            previous,
            usage,
        })
    } else {
        println!("{name}: {previous} -> {usage}");
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
