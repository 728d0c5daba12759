//! Watchdog - contact tracing device liveness monitor
//!
//! Daemon entry point.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{error, info};

use watchdog::cli::{Cli, Command, OutputFormat};
use watchdog::config::Config;
use watchdog::daemon::PidFile;
use watchdog::{HealthEvaluator, Survey, Timing, Watchdog, XmlRpcClient, open_indicator};

/// Exit status of `check` when supervisord cannot be queried
const EXIT_TRANSPORT_FAULT: u8 = 2;

fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match log_file {
        Some(path) => {
            // Write to log file, not stdout/stderr
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .context("Failed to open log file")?;

            tracing_subscriber::fmt()
                .with_writer(file)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logging comes first so config fallbacks are reported
    let daemon = matches!(cli.command, None | Some(Command::Run));
    let log_file = (daemon && !cli.debug).then(|| Config::load_log_file(cli.config.as_ref()));
    let verbose = cli.verbose || (daemon && cli.debug);
    setup_logging(verbose, log_file.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(kind) = cli.indicator {
        config.indicator.kind = kind;
    }
    config.validate().context("Invalid configuration")?;

    match &cli.command {
        None | Some(Command::Run) => cmd_run(&cli, &config),
        Some(Command::Check { format }) => cmd_check(&config, format),
    }
}

/// Run the poll loop until supervisord becomes unreachable
fn cmd_run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    info!(
        "Watchdog loaded config: socket={}, group={}, processes={:?}, database={}",
        config.supervisor.socket_path.display(),
        config.processes.group,
        config.processes.names,
        cli.database.display()
    );

    // Debug runs happen on development hosts without /run/epidose
    let _pid_file = if cli.debug {
        None
    } else {
        Some(PidFile::acquire(config.daemon.pid_file.clone())?)
    };

    let client = XmlRpcClient::unix(config.supervisor.socket_path.clone(), config.supervisor.timeout());
    let evaluator = HealthEvaluator::with_tracing(config.processes.clone());
    let indicator = open_indicator(&config.indicator).context("Failed to set up indicator")?;
    let mut watchdog = Watchdog::new(client, evaluator, indicator, Timing::from(&config.timing));

    info!("Watchdog started");
    match watchdog.run() {
        Ok(never) => match never {},
        Err(e) => {
            error!(error = %e, "Lost contact with supervisord");
            Err(e).context("Lost contact with supervisord")
        }
    }
}

/// Query supervisord once and print a report
fn cmd_check(config: &Config, format: &OutputFormat) -> Result<ExitCode> {
    let client = XmlRpcClient::unix(config.supervisor.socket_path.clone(), config.supervisor.timeout());

    let survey = match Survey::collect(&client, &config.processes) {
        Ok(survey) => survey,
        Err(e) => {
            match format {
                OutputFormat::Json => {
                    let json = serde_json::json!({ "healthy": false, "error": e.to_string() });
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Text => {
                    println!("{} supervisord unreachable: {}", "✗".red(), e);
                }
            }
            return Ok(ExitCode::from(EXIT_TRANSPORT_FAULT));
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&survey)?),
        OutputFormat::Text => print_survey(&survey, &config.processes.group),
    }

    Ok(if survey.healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_survey(survey: &Survey, group: &str) {
    println!("{:<28} {}", "supervisord", colorize_state(&survey.supervisor.statename));

    if survey.processes.is_empty() {
        println!("  {}", "process states not queried".dimmed());
    }
    for entry in &survey.processes {
        let name = format!("{}:{}", group, entry.name);
        let detail = if entry.running {
            format!("pid {}", entry.info.pid)
        } else if !entry.info.spawnerr.is_empty() {
            entry.info.spawnerr.clone()
        } else {
            entry.info.description.clone()
        };
        println!(
            "  {:<26} {} {}",
            name,
            colorize_state(&entry.info.statename),
            detail.dimmed()
        );
    }

    println!();
    if survey.healthy {
        println!("{} healthy", "✓".green());
    } else {
        println!("{} unhealthy", "✗".red());
    }
}

fn colorize_state(state: &str) -> ColoredString {
    if watchdog::health::is_running(state) {
        state.green()
    } else {
        state.red().bold()
    }
}
