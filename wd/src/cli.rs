//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::IndicatorKind;

/// Default client database location, shared with the other device daemons
pub const DEFAULT_DATABASE: &str = "/var/lib/epidose/client-database.db";

/// Contact tracing device watchdog
#[derive(Parser, Debug)]
#[command(
    name = "watchdog",
    about = "Contact tracing device watchdog: pulses the green LED while all device processes run",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Run in debug mode logging to stderr
    #[arg(short, long, global = true, help = "Run in debug mode logging to stderr (no PID file)")]
    pub debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Set verbose logging")]
    pub verbose: bool,

    /// Client database location (accepted for symmetry with the other daemons)
    #[arg(short = 'D', long, global = true, default_value = DEFAULT_DATABASE)]
    pub database: PathBuf,

    /// Override the configured indicator backend
    #[arg(short, long, global = true, value_name = "led|gpio|log")]
    pub indicator: Option<IndicatorKind>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Watch supervisord and pulse the LED (default)
    Run,

    /// Query supervisord once and print a report
    Check {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for the check command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["watchdog"]).unwrap();
        assert!(!cli.debug);
        assert!(!cli.verbose);
        assert_eq!(cli.database, PathBuf::from(DEFAULT_DATABASE));
        assert!(cli.indicator.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_daemon_flags() {
        let cli = Cli::try_parse_from(["watchdog", "-d", "-v", "-D", "/tmp/db.sqlite"]).unwrap();
        assert!(cli.debug);
        assert!(cli.verbose);
        assert_eq!(cli.database, PathBuf::from("/tmp/db.sqlite"));
    }

    #[test]
    fn test_check_subcommand_with_format() {
        let cli = Cli::try_parse_from(["watchdog", "check", "--format", "json", "-i", "log"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Check {
                format: OutputFormat::Json
            })
        );
        assert_eq!(cli.indicator, Some(IndicatorKind::Log));
    }

    #[test]
    fn test_rejects_unknown_indicator() {
        assert!(Cli::try_parse_from(["watchdog", "--indicator", "blink"]).is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
