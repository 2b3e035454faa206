//! sb - storefront bridge CLI
//!
//! Runs page scenarios against scripted collaborators and inspects config.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde_json::json;
use tracing::{debug, info};

use storefront_bridge::cli::{Cli, Command, OutputFormat, get_log_path};
use storefront_bridge::config::Config;
use storefront_bridge::signal::SignalNames;
use storefront_bridge::sim::{self, Scenario};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Simulate { scenario, format }) => cmd_simulate(&config, scenario, format).await,
        Some(Command::Config) => cmd_config(&config),
        Some(Command::Signals) => cmd_signals(&config),
        None => {
            debug!("main: no command, running demo scenario");
            cmd_simulate(&config, None, OutputFormat::Text).await
        }
    }
}

/// Run a scenario and print every frame that changed
async fn cmd_simulate(config: &Config, scenario: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let scenario = match scenario {
        Some(path) => Scenario::load(&path)?,
        None => Scenario::demo(),
    };

    match format {
        OutputFormat::Text => {
            println!("{} {} ({})", "Scenario".bold(), scenario.name.cyan(), scenario.route);
            let report = sim::run(&scenario, config, |at_ms, frame| {
                println!();
                println!("{}", format!("@ {} ms", at_ms).dimmed());
                println!("{}", frame);
            })
            .await?;

            let stats = &report.stats;
            println!();
            println!("{} {} frames", "✓".green(), report.frames);
            println!(
                "  bridge: {} after {} checks, {} identity pushes",
                stats
                    .bridge
                    .phase
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "absent".to_string())
                    .cyan(),
                stats.bridge.checks,
                report.identity_pushes.len()
            );
            println!(
                "  revalidation: generation {}, {} requested, {} stale discarded",
                stats.generation,
                stats.revalidation.revalidations_requested,
                stats.revalidation.stale_results_discarded
            );
            println!(
                "  gifts: {} live checks, {} static checks, {} customize calls",
                stats.bridge.live_gift_checks, stats.bridge.static_gift_checks, report.customize_calls
            );
            println!("  search: {} backend calls", stats.search_backend_calls);
            if !report.bundle_inits.is_empty() {
                println!("  bundle pages: {}", report.bundle_inits.join(", "));
            }
        }
        OutputFormat::Json => {
            let mut frames = Vec::new();
            let report = sim::run(&scenario, config, |at_ms, frame| {
                frames.push(json!({ "at-ms": at_ms, "frame": frame }));
            })
            .await?;
            let out = json!({ "frames": frames, "report": report });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}

/// Print the effective configuration as YAML
fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

fn cmd_signals(config: &Config) -> Result<()> {
    let names = SignalNames::from_config(&config.signals);
    println!("Signals:");
    for (name, description) in names.all() {
        println!("  {}", name.cyan());
        println!("    {}", description);
    }
    println!();
    println!("Other names pass through as custom signals.");
    Ok(())
}
