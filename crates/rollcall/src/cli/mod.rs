//! Command-line interface for rollcall.
//!
//! This module provides the CLI structure for the `rollcall` binary; the
//! handlers live in the binary itself.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, HistoryCommand, MarkCommand, MonthCommand, ReportCommand, ShowCommand,
    WeekCommand,
};

use crate::logging::Verbosity;

/// rollcall - Daily attendance for a daycare roster
///
/// Mark children present or absent for a day, review histories and
/// monthly presence, and render per-child PDF reports.
#[derive(Debug, Parser)]
#[command(name = "rollcall")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show attendance for a date
    Show(ShowCommand),

    /// Mark attendance for a date and save it
    Mark(MarkCommand),

    /// Show one child's attendance history and statistics
    History(HistoryCommand),

    /// Show per-day presence for a month
    Month(MonthCommand),

    /// Show per-day presence for a week
    Week(WeekCommand),

    /// Render a PDF attendance report for one child
    Report(ReportCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "rollcall");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["rollcall", "-q", "show"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["rollcall", "show"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["rollcall", "-v", "show"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["rollcall", "-vv", "show"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_show() {
        let cli = parse(&["rollcall", "show", "2024-03-01", "--json"]);
        match cli.command {
            Command::Show(cmd) => {
                assert_eq!(cmd.date, NaiveDate::from_ymd_opt(2024, 3, 1));
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_show_rejects_bad_date() {
        assert!(Cli::try_parse_from(["rollcall", "show", "yesterday"]).is_err());
    }

    #[test]
    fn test_parse_mark() {
        let cli = parse(&[
            "rollcall",
            "mark",
            "2024-03-01",
            "--present",
            "1,2",
            "--absent",
            "3",
            "--reason",
            "3=sick",
            "--class",
            "7",
        ]);
        match cli.command {
            Command::Mark(cmd) => {
                assert_eq!(cmd.present, vec![1, 2]);
                assert_eq!(cmd.absent, vec![3]);
                assert_eq!(cmd.reason, vec![(3, "sick".to_string())]);
                assert_eq!(cmd.class, Some(7));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_month_range() {
        assert!(matches!(
            parse(&["rollcall", "month", "2024", "3"]).command,
            Command::Month(_)
        ));
        assert!(Cli::try_parse_from(["rollcall", "month", "2024", "13"]).is_err());
    }

    #[test]
    fn test_parse_report() {
        let cli = parse(&[
            "rollcall", "report", "4", "2024-03-01", "2024-03-31", "-o", "/tmp/out",
        ]);
        match cli.command {
            Command::Report(cmd) => {
                assert_eq!(cmd.child_id, 4);
                assert_eq!(cmd.output, Some(PathBuf::from("/tmp/out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = parse(&["rollcall", "config", "validate", "--file", "/tmp/c.toml"]);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["rollcall", "-c", "/custom/config.toml", "week"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}
