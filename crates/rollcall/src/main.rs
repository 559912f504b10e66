//! `rollcall` - CLI for daycare attendance
//!
//! This binary marks and reviews attendance against the configured
//! attendance service and renders per-child reports.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Datelike, Days, Local, NaiveDate};
use clap::Parser;

use rollcall::analytics::{filter_window, DayPercentage};
use rollcall::cli::{
    Cli, Command, ConfigCommand, HistoryCommand, MarkCommand, MonthCommand, ReportCommand,
    ShowCommand, WeekCommand,
};
use rollcall::config::Backend;
use rollcall::roster::{RosterFile, StaticIdentity};
use rollcall::service::{HttpAttendanceService, SqliteAttendanceService};
use rollcall::{
    init_logging, AggregationEngine, AttendanceService, AttendanceSession, Config, Error,
    MonthlySummary, ReportPipeline, RosterProvider,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Config commands must work even when the file does not validate.
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(cli.config, config_cmd),
        command => command,
    };

    // Load configuration
    let config = Config::load_from(cli.config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    runtime.block_on(async {
        let mut session = open_session(&config)?;
        match command {
            Command::Show(cmd) => handle_show(&mut session, &cmd).await,
            Command::Mark(cmd) => handle_mark(&config, &mut session, &cmd).await,
            Command::History(cmd) => handle_history(&config, &mut session, &cmd).await,
            Command::Month(cmd) => handle_month(&config, &session, &cmd).await,
            Command::Week(cmd) => handle_week(&config, &session, &cmd).await,
            Command::Report(cmd) => handle_report(&config, &mut session, &cmd).await,
            Command::Config(_) => Ok(()),
        }
    })
}

fn open_service(config: &Config) -> anyhow::Result<Arc<dyn AttendanceService>> {
    let service: Arc<dyn AttendanceService> = match config.service.backend {
        Backend::Sqlite => Arc::new(SqliteAttendanceService::open(config.database_path())?),
        Backend::Http => {
            let base_url = config
                .service
                .base_url
                .clone()
                .context("service.base_url is not set")?;
            Arc::new(HttpAttendanceService::new(
                base_url,
                config.timeout(),
                config.service.token.clone(),
            )?)
        }
    };
    Ok(service)
}

fn open_session(config: &Config) -> anyhow::Result<AttendanceSession> {
    let service = open_service(config)?;
    let roster = Arc::new(RosterFile::new(config.roster_path()));
    let identity = Arc::new(StaticIdentity(config.identity.staff_id));
    Ok(AttendanceSession::new(service, roster, identity).with_strategy(config.submit_strategy()))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn status_label(present: bool) -> &'static str {
    if present {
        "present"
    } else {
        "absent"
    }
}

async fn handle_show(session: &mut AttendanceSession, cmd: &ShowCommand) -> anyhow::Result<()> {
    let date = cmd.date.unwrap_or_else(today);
    let snapshot = session.load_date(date).await?;
    let roster = session.roster().active(None).await?;

    if cmd.json {
        let rows: Vec<_> = roster
            .iter()
            .filter_map(|child| {
                snapshot.entry(child.id).map(|entry| {
                    serde_json::json!({
                        "childId": child.id,
                        "name": child.full_name(),
                        "isPresent": entry.is_present,
                        "recordId": entry.record_id,
                        "absenceReason": snapshot.reason(child.id),
                    })
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "date": date, "children": rows }))?
        );
        return Ok(());
    }

    println!("Attendance for {} ({})", date, rollcall::analytics::weekday_name(date));
    println!("{:>6}  {:<28} {:<8} {}", "ID", "Name", "Status", "Reason");
    for child in &roster {
        if let Some(entry) = snapshot.entry(child.id) {
            println!(
                "{:>6}  {:<28} {:<8} {}",
                child.id,
                child.full_name(),
                status_label(entry.is_present),
                snapshot.reason(child.id)
            );
        }
    }
    println!();
    println!("{} of {} present", snapshot.present_count(), snapshot.len());
    Ok(())
}

async fn handle_mark(
    config: &Config,
    session: &mut AttendanceSession,
    cmd: &MarkCommand,
) -> anyhow::Result<()> {
    session.load_date(cmd.date).await?;

    for child_id in &cmd.present {
        session.set_present(*child_id, true)?;
    }
    for child_id in &cmd.absent {
        session.set_present(*child_id, false)?;
    }
    for (child_id, reason) in &cmd.reason {
        session.set_reason(*child_id, reason.clone())?;
    }

    let class_filter = cmd.class.or(config.roster.class_filter);
    let report = session.save(class_filter).await?;

    println!(
        "Saved {}: {} created, {} updated, {} failed",
        report.date(),
        report.created().len(),
        report.updated().len(),
        report.failures().len()
    );
    for failure in report.failures() {
        println!("  child {}: {}", failure.child_id, failure.error);
    }

    if !report.succeeded() {
        bail!(
            "{} of {} submissions failed",
            report.failures().len(),
            report.attempted()
        );
    }
    Ok(())
}

async fn handle_history(
    config: &Config,
    session: &mut AttendanceSession,
    cmd: &HistoryCommand,
) -> anyhow::Result<()> {
    let mut records = session.child_history(cmd.child_id).await?;
    if cmd.since.is_some() || cmd.until.is_some() {
        records = filter_window(
            &records,
            cmd.since.unwrap_or(NaiveDate::MIN),
            cmd.until.unwrap_or(NaiveDate::MAX),
        );
    }
    let summary = AggregationEngine::new(config.weekend()).summarize(&records);

    if cmd.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "childId": cmd.child_id,
                "summary": summary,
                "records": records,
            }))?
        );
        return Ok(());
    }

    println!("History for child {}", cmd.child_id);
    for record in &records {
        println!(
            "  {}  {:<9}  {:<8} {}",
            record.date,
            rollcall::analytics::weekday_name(record.date),
            status_label(record.is_present),
            record.stated_reason().unwrap_or("")
        );
    }
    println!();
    println!(
        "Present {} / Absent {} ({}%)",
        summary.present_count, summary.absent_count, summary.percentage
    );
    println!(
        "Longest streak {}, current streak {}, trend {}",
        summary.longest_present_streak, summary.current_streak, summary.current_trend
    );
    for (reason, count) in &summary.absence_reason_tally {
        println!("  {reason}: {count}");
    }
    Ok(())
}

fn print_days(days: &[DayPercentage], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(days)?);
        return Ok(());
    }
    for day in days {
        println!(
            "  {}  {:<9}  {:>4} present  {:>3}%",
            day.date, day.weekday, day.present_count, day.percentage
        );
    }
    println!();
    println!("Average: {}%", AggregationEngine::average_percentage(days));
    Ok(())
}

async fn roster_size(
    config: &Config,
    session: &AttendanceSession,
    class: Option<rollcall::record::ClassId>,
) -> anyhow::Result<usize> {
    let class_filter = class.or(config.roster.class_filter);
    Ok(session.roster().active(class_filter).await?.len())
}

async fn handle_month(
    config: &Config,
    session: &AttendanceSession,
    cmd: &MonthCommand,
) -> anyhow::Result<()> {
    let summary = session.monthly_summary(cmd.year, cmd.month).await?;
    let size = roster_size(config, session, cmd.class).await?;
    let engine = AggregationEngine::new(config.weekend());

    let days = if cmd.all_days {
        engine.day_percentages(&summary, size)
    } else {
        engine.month_view(&summary, size)
    };
    if !cmd.json {
        println!("{}-{:02} ({} children)", cmd.year, cmd.month, size);
    }
    print_days(&days, cmd.json)
}

async fn handle_week(
    config: &Config,
    session: &AttendanceSession,
    cmd: &WeekCommand,
) -> anyhow::Result<()> {
    let day = cmd.date.unwrap_or_else(today);
    let monday = day
        .checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))
        .context("date out of range")?;
    let sunday = monday
        .checked_add_days(Days::new(6))
        .context("date out of range")?;

    // A week can straddle two months.
    let mut summaries: Vec<MonthlySummary> =
        vec![session.monthly_summary(monday.year(), monday.month()).await?];
    if (sunday.year(), sunday.month()) != (monday.year(), monday.month()) {
        summaries.push(session.monthly_summary(sunday.year(), sunday.month()).await?);
    }

    let size = roster_size(config, session, cmd.class).await?;
    let engine = AggregationEngine::new(config.weekend());
    let mut days = engine.week_view(&summaries[0], day, size);
    for summary in &summaries[1..] {
        for (merged, other) in days.iter_mut().zip(engine.week_view(summary, day, size)) {
            if summary.contains_date(other.date) {
                *merged = other;
            }
        }
    }

    if !cmd.json {
        println!("Week of {monday} ({size} children)");
    }
    print_days(&days, cmd.json)
}

async fn handle_report(
    config: &Config,
    session: &mut AttendanceSession,
    cmd: &ReportCommand,
) -> anyhow::Result<()> {
    let child = session
        .roster()
        .find(cmd.child_id)
        .await?
        .ok_or(Error::UnknownChild(cmd.child_id))?;
    let records = session.child_history(cmd.child_id).await?;

    let pipeline = ReportPipeline::new(config.report_options())
        .with_engine(AggregationEngine::new(config.weekend()));
    let artifact = pipeline.render(&child, &records, cmd.start, cmd.end).await?;

    let dir = cmd.output.clone().unwrap_or_else(|| config.output_dir());
    let path = artifact.write_to(&dir).await?;
    println!(
        "Wrote {} ({} page{})",
        path.display(),
        artifact.pages(),
        if artifact.pages() == 1 { "" } else { "s" }
    );
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Service]");
                println!("  Backend:        {:?}", config.service.backend);
                match config.service.backend {
                    Backend::Sqlite => {
                        println!("  Database path:  {}", config.database_path().display());
                    }
                    Backend::Http => println!(
                        "  Base URL:       {}",
                        config.service.base_url.as_deref().unwrap_or("")
                    ),
                }
                println!("  Timeout:        {}s", config.service.timeout_secs);
                println!();
                println!("[Sync]");
                println!("  Strategy:       {}", config.submit_strategy());
                println!();
                println!("[Roster]");
                println!("  Path:           {}", config.roster_path().display());
                if let Some(class) = config.roster.class_filter {
                    println!("  Class filter:   {class}");
                }
                println!("  Staff id:       {}", config.identity.staff_id);
                println!();
                println!("[Report]");
                println!("  Output dir:     {}", config.output_dir().display());
                println!("  Page width:     {}px", config.report.page_width_px);
                println!("  Page format:    {}", config.report.page_format);
                println!();
                println!("[Analytics]");
                println!("  Weekend days:   {:?}", config.analytics.weekend_days);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
