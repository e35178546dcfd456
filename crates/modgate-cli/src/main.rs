//! modgate
//!
//! Command-line front end for the moderation policy engine.
//!
//! Evaluates a single submission, validates a policy document, or lists the
//! policies a configuration would load. Output is JSON on stdout; logs go to
//! stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modgate_policy::{DecisionEngine, DocumentSource, KeywordBlacklist, PolicyLoader};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod config;

use config::ModerationConfig;

#[derive(Parser, Debug)]
#[command(name = "modgate")]
#[command(about = "Policy-driven content moderation", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "MODGATE_CONFIG", default_value = "modgate.yaml")]
    config: String,

    /// Policy document (overrides the configuration file)
    #[arg(short, long, global = true, env = "MODGATE_POLICY_FILE")]
    policy: Option<String>,

    /// Skip policies and use only the blacklist fallback
    #[arg(long, global = true)]
    no_policies: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decide on a submission and print the decision
    Evaluate {
        /// Submitting user
        #[arg(short, long)]
        user: String,

        /// Submitted text
        text: String,
    },

    /// Load a policy document and report what it contains
    Validate {
        /// Policy document to check
        file: PathBuf,
    },

    /// List the policies the configuration loads
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    describe_metrics();

    match &cli.command {
        Commands::Evaluate { user, text } => {
            let engine = configured_engine(&cli)?;
            print_json(&engine.evaluate(text, user))?;
        }
        Commands::Validate { file } => {
            let set = PolicyLoader::new()
                .load(&DocumentSource::file(file))
                .with_context(|| format!("Invalid policy document {}", file.display()))?;
            for skipped in set.skipped() {
                warn!(path = %skipped.path, type_tag = %skipped.type_tag, "Rule type not supported");
            }
            let report = json!({
                "file": file,
                "policies": set.summaries(),
                "skipped": set.skipped(),
            });
            print_json(&report)?;
        }
        Commands::List => {
            let engine = configured_engine(&cli)?;
            print_json(&engine.list_policies())?;
        }
    }

    Ok(())
}

/// Load the configuration and build its engine
fn configured_engine(cli: &Cli) -> Result<DecisionEngine> {
    let config = ModerationConfig::load(&cli.config, cli)?;
    build_engine(&config).with_context(|| {
        format!(
            "Failed to load policies from {}",
            config.policy_path.as_deref().unwrap_or_default()
        )
    })
}

/// Build the engine a configuration describes
fn build_engine(config: &ModerationConfig) -> modgate_core::Result<DecisionEngine> {
    let blacklist = Arc::new(KeywordBlacklist::new(config.blacklist.iter().cloned()));
    let engine = DecisionEngine::new(blacklist).with_policies_enabled(config.policies_enabled);

    match &config.policy_path {
        Some(path) => {
            let report = engine.load(&DocumentSource::file(path))?;
            info!(
                path = %path,
                policies = report.policies,
                skipped = report.skipped.len(),
                "Policies loaded"
            );
        }
        None => warn!("No policy document configured, using blacklist only"),
    }

    Ok(engine)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> modgate_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("modgate=debug,modgate_policy=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("modgate=info,modgate_policy=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Describe the engine's counters for whichever recorder the host installs
fn describe_metrics() {
    metrics::describe_counter!(
        "modgate_decisions_total",
        "Total number of moderation decisions by source and outcome"
    );
    metrics::describe_counter!(
        "modgate_policy_reloads_total",
        "Total number of policy loads by result"
    );
}
