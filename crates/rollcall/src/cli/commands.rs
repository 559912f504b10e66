//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};

use crate::record::{parse_date, ChildId, ClassId};

/// Parse a `YYYY-MM-DD` command-line date.
fn date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

/// Parse `ID=REASON`.
fn reason_arg(value: &str) -> Result<(ChildId, String), String> {
    let (id, reason) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid reason '{value}', expected ID=REASON"))?;
    let id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid child id '{id}'"))?;
    Ok((id, reason.trim().to_string()))
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Date to show (defaults to today)
    #[arg(value_parser = date_arg)]
    pub date: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Mark command arguments.
#[derive(Debug, Args)]
pub struct MarkCommand {
    /// Date to mark
    #[arg(value_parser = date_arg)]
    pub date: NaiveDate,

    /// Children to mark present
    #[arg(short, long, value_delimiter = ',', value_name = "ID")]
    pub present: Vec<ChildId>,

    /// Children to mark absent
    #[arg(short, long, value_delimiter = ',', value_name = "ID")]
    pub absent: Vec<ChildId>,

    /// Absence reason for a child, as ID=REASON (repeatable)
    #[arg(short, long, value_parser = reason_arg, value_name = "ID=REASON")]
    pub reason: Vec<(ChildId, String)>,

    /// Only save children in this class
    #[arg(long, value_name = "CLASS")]
    pub class: Option<ClassId>,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Child to show
    pub child_id: ChildId,

    /// First date to include
    #[arg(long, value_parser = date_arg)]
    pub since: Option<NaiveDate>,

    /// Last date to include
    #[arg(long, value_parser = date_arg)]
    pub until: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Month command arguments.
#[derive(Debug, Args)]
pub struct MonthCommand {
    /// Year
    pub year: i32,

    /// Month (1-12)
    #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: u32,

    /// Include weekend days
    #[arg(long)]
    pub all_days: bool,

    /// Roster size denominator limited to this class
    #[arg(long, value_name = "CLASS")]
    pub class: Option<ClassId>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Week command arguments.
#[derive(Debug, Args)]
pub struct WeekCommand {
    /// Any day of the week to show (defaults to today)
    #[arg(value_parser = date_arg)]
    pub date: Option<NaiveDate>,

    /// Roster size denominator limited to this class
    #[arg(long, value_name = "CLASS")]
    pub class: Option<ClassId>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Report command arguments.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Child to report on
    pub child_id: ChildId,

    /// First date of the report window
    #[arg(value_parser = date_arg)]
    pub start: NaiveDate,

    /// Last date of the report window
    #[arg(value_parser = date_arg)]
    pub end: NaiveDate,

    /// Directory to write the PDF to
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_arg() {
        assert_eq!(
            date_arg("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(date_arg("03/01/2024").unwrap_err().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_reason_arg() {
        assert_eq!(reason_arg("4=sick").unwrap(), (4, "sick".to_string()));
        assert_eq!(
            reason_arg(" 4 = doctor = dentist ").unwrap(),
            (4, "doctor = dentist".to_string())
        );
        assert!(reason_arg("sick").is_err());
        assert!(reason_arg("x=sick").is_err());
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
