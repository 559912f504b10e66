//! Reports and aggregate views built from session data.

mod common;

use chrono::Weekday;

use common::{date, five_children, session_with, small_roster, FakeService};
use rollcall::analytics::{filter_window, Trend};
use rollcall::record::AttendanceRecord;
use rollcall::report::{PageFormat, ReportOptions};
use rollcall::roster::RosterEntry;
use rollcall::{AggregationEngine, Error, ReportPipeline, WeekendDays};

fn seeded_history(service: &FakeService) {
    // Feb 29 and Mar 8 fall outside the window used below.
    for (day, present, reason) in [
        (date(2024, 2, 29), true, ""),
        (date(2024, 3, 1), true, ""),
        (date(2024, 3, 4), false, "flu"),
        (date(2024, 3, 5), false, "flu"),
        (date(2024, 3, 6), true, ""),
        (date(2024, 3, 7), true, ""),
        (date(2024, 3, 8), false, "trip"),
    ] {
        service.seed(AttendanceRecord::new(1, day, present, reason, 7));
    }
}

#[tokio::test]
async fn test_render_includes_both_window_ends_only() {
    let service = FakeService::new();
    seeded_history(&service);
    let mut session = session_with(service, small_roster());
    let child = RosterEntry::new(1, "Ada", "Lovelace");

    let history = session.child_history(1).await.unwrap();
    let artifact = ReportPipeline::default()
        .render(&child, &history, date(2024, 3, 1), date(2024, 3, 7))
        .await
        .unwrap();
    let summary = artifact.summary();

    // Mar 1 and Mar 7 are counted, Feb 29 and Mar 8 are not.
    assert_eq!(summary.present_count, 3);
    assert_eq!(summary.absent_count, 2);
    assert_eq!(summary.percentage, 60);
    assert_eq!(summary.longest_present_streak, 2);
    assert_eq!(summary.current_streak, 2);
    assert_eq!(summary.current_trend, Trend::Improving);
    assert_eq!(summary.absence_reason_tally.get("flu"), Some(&2));
    assert!(!summary.absence_reason_tally.contains_key("trip"));

    let window = filter_window(&history, date(2024, 3, 1), date(2024, 3, 7));
    assert_eq!(*summary, AggregationEngine::default().summarize(&window));
}

#[tokio::test]
async fn test_render_single_day_window() {
    let service = FakeService::new();
    seeded_history(&service);
    let mut session = session_with(service, small_roster());
    let child = RosterEntry::new(1, "Ada", "Lovelace");

    let history = session.child_history(1).await.unwrap();
    let artifact = ReportPipeline::default()
        .render(&child, &history, date(2024, 3, 8), date(2024, 3, 8))
        .await
        .unwrap();

    assert_eq!(artifact.summary().absent_count, 1);
    assert_eq!(artifact.summary().present_count, 0);
    assert_eq!(artifact.summary().absence_reason_tally.get("trip"), Some(&1));
}

#[tokio::test]
async fn test_render_rejects_reversed_window() {
    let child = RosterEntry::new(1, "Ada", "Lovelace");

    let err = ReportPipeline::default()
        .render(&child, &[], date(2024, 3, 8), date(2024, 3, 7))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ReportGeneration { .. }));
}

#[tokio::test]
async fn test_report_written_to_directory() {
    let service = FakeService::new();
    seeded_history(&service);
    let mut session = session_with(service, small_roster());
    let child = RosterEntry::new(1, "Ada", "Lovelace");

    let history = session.child_history(1).await.unwrap();
    let pipeline = ReportPipeline::new(ReportOptions {
        page_format: PageFormat::Letter,
        ..ReportOptions::default()
    });
    let artifact = pipeline
        .render(&child, &history, date(2024, 3, 1), date(2024, 3, 7))
        .await
        .unwrap();

    assert_eq!(
        artifact.file_name(),
        "Ada_Lovelace_attendance_2024-03-01_2024-03-07.pdf"
    );
    assert!(artifact.pages() >= 1);

    let dir = tempfile::tempdir().unwrap();
    let path = artifact.write_to(dir.path().join("reports")).await.unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    let document = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(document.get_pages().len(), artifact.pages());
}

#[tokio::test]
async fn test_report_for_child_without_records() {
    let service = FakeService::new();
    let mut session = session_with(service, small_roster());
    let child = RosterEntry::new(2, "Grace", "Hopper");

    let history = session.child_history(2).await.unwrap();
    let artifact = ReportPipeline::default()
        .render(&child, &history, date(2024, 3, 1), date(2024, 3, 31))
        .await
        .unwrap();

    assert!(artifact.pages() >= 1);
    assert_eq!(
        artifact.file_name(),
        "Grace_Hopper_attendance_2024-03-01_2024-03-31.pdf"
    );
}

#[tokio::test]
async fn test_month_view_skips_weekends() {
    let service = FakeService::new();
    for id in 1..=4 {
        service.seed(AttendanceRecord::new(id, date(2024, 3, 1), true, "", 7));
    }
    service.seed(AttendanceRecord::new(5, date(2024, 3, 1), false, "", 7));
    service.seed(AttendanceRecord::new(1, date(2024, 3, 2), true, "", 7));
    let session = session_with(service, five_children());

    let summary = session.monthly_summary(2024, 3).await.unwrap();
    let engine = AggregationEngine::default();
    let days = engine.month_view(&summary, 5);

    // March 2024 has 21 weekdays.
    assert_eq!(days.len(), 21);
    assert_eq!(days[0].date, date(2024, 3, 1));
    assert_eq!(days[0].weekday, "Friday");
    assert_eq!(days[0].percentage, 80);
    assert_eq!(days[1].date, date(2024, 3, 4));

    // Saturday counts show up when weekends are included.
    let all = engine.day_percentages(&summary, 5);
    assert_eq!(all.len(), 31);
    assert_eq!(all[1].present_count, 1);
}

#[tokio::test]
async fn test_custom_weekend() {
    let service = FakeService::new();
    let session = session_with(service, five_children());

    let summary = session.monthly_summary(2024, 3).await.unwrap();
    let engine = AggregationEngine::new(WeekendDays::new(Weekday::Fri, Weekday::Sat));
    let week = engine.week_view(&summary, date(2024, 3, 13), 5);

    let dates: Vec<_> = week.iter().map(|d| d.date).collect();
    assert_eq!(
        dates,
        vec![
            date(2024, 3, 11),
            date(2024, 3, 12),
            date(2024, 3, 13),
            date(2024, 3, 14),
            date(2024, 3, 17),
        ]
    );
    assert_eq!(AggregationEngine::average_percentage(&week), 0);
}
