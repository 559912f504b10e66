//! Fixed-width report layout.
//!
//! Positions text runs and filled boxes on a canvas of a fixed pixel
//! width; the height follows from the content. Text is measured in 8x8
//! glyph cells multiplied by an integer scale.

use chrono::NaiveDate;

use crate::analytics::{weekday_name, AttendanceSummary, TrendPoint};
use crate::error::{Error, Result};
use crate::record::AttendanceRecord;
use crate::roster::RosterEntry;

/// An RGB color.
pub type Color = [u8; 3];

pub const WHITE: Color = [255, 255, 255];
pub const INK: Color = [33, 37, 41];
pub const MUTED: Color = [108, 117, 125];
pub const RULE: Color = [206, 212, 218];
pub const STRIPE: Color = [241, 243, 245];
pub const PRESENT: Color = [46, 160, 67];
pub const ABSENT: Color = [207, 34, 46];
pub const NO_RECORD: Color = [173, 181, 189];

/// Side length of one glyph cell at scale 1.
pub const GLYPH_SIZE: u32 = 8;

const MARGIN: u32 = 32;
const MIN_WIDTH: u32 = 320;
const TREND_CELL_MIN: u32 = 4;
const TREND_CELL_MAX: u32 = 24;
const TREND_CELL_HEIGHT: u32 = 20;

/// Something to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A single line of text; `(x, y)` is the top-left corner.
    Text {
        x: u32,
        y: u32,
        scale: u32,
        color: Color,
        text: String,
    },
    /// A filled rectangle.
    Rect {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        color: Color,
    },
}

impl Element {
    /// Top edge in pixels.
    #[must_use]
    pub fn top(&self) -> u32 {
        match self {
            Self::Text { y, .. } | Self::Rect { y, .. } => *y,
        }
    }
}

/// A laid-out page of elements, ordered top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    width: u32,
    height: u32,
    elements: Vec<Element>,
}

impl Layout {
    /// Canvas width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Elements in drawing order.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

/// Everything shown in one report.
#[derive(Debug)]
pub struct ReportContent<'a> {
    pub child: &'a RosterEntry,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: &'a AttendanceSummary,
    pub trend: &'a [TrendPoint],
    /// Records in the window, sorted by date.
    pub rows: &'a [AttendanceRecord],
}

/// Vertical flow of elements between the side margins.
struct Flow {
    width: u32,
    y: u32,
    elements: Vec<Element>,
}

impl Flow {
    fn new(width: u32) -> Self {
        Self {
            width,
            y: MARGIN,
            elements: Vec::new(),
        }
    }

    fn inner_width(&self) -> u32 {
        self.width - 2 * MARGIN
    }

    /// Characters of `scale` that fit in `width` pixels.
    fn columns(width: u32, scale: u32) -> usize {
        usize::try_from(width / (GLYPH_SIZE * scale)).unwrap_or(usize::MAX)
    }

    fn text_at(&mut self, x: u32, scale: u32, color: Color, text: &str, max_width: u32) {
        self.elements.push(Element::Text {
            x,
            y: self.y,
            scale,
            color,
            text: truncate(text, Self::columns(max_width, scale)),
        });
    }

    fn line(&mut self, scale: u32, color: Color, text: &str) {
        self.text_at(MARGIN, scale, color, text, self.inner_width());
        self.advance(GLYPH_SIZE * scale + scale * 4);
    }

    fn rect(&mut self, x: u32, width: u32, height: u32, color: Color) {
        self.elements.push(Element::Rect {
            x,
            y: self.y,
            width,
            height,
            color,
        });
    }

    fn rule(&mut self) {
        self.advance(6);
        self.rect(MARGIN, self.inner_width(), 2, RULE);
        self.advance(14);
    }

    fn advance(&mut self, pixels: u32) {
        self.y += pixels;
    }

    fn finish(self) -> Layout {
        Layout {
            width: self.width,
            height: self.y + MARGIN,
            elements: self.elements,
        }
    }
}

/// Shorten `text` to at most `columns` characters, marking the cut.
fn truncate(text: &str, columns: usize) -> String {
    if text.chars().count() <= columns {
        return text.to_string();
    }
    if columns <= 3 {
        return text.chars().take(columns).collect();
    }
    let mut cut: String = text.chars().take(columns - 3).collect();
    cut.push_str("...");
    cut
}

/// Lay out a report at the given canvas width.
///
/// # Errors
///
/// Returns a report error if the width is too narrow for the layout.
pub fn build(content: &ReportContent<'_>, width: u32) -> Result<Layout> {
    if width < MIN_WIDTH {
        return Err(Error::report(format!(
            "page width {width}px is below the minimum of {MIN_WIDTH}px"
        )));
    }

    let mut flow = Flow::new(width);
    header(&mut flow, content);
    flow.rule();
    summary(&mut flow, content.summary);
    flow.rule();
    reasons(&mut flow, content.summary);
    flow.rule();
    trend_strip(&mut flow, content.trend);
    flow.rule();
    status_table(&mut flow, content.rows);
    Ok(flow.finish())
}

fn header(flow: &mut Flow, content: &ReportContent<'_>) {
    let days = (content.end - content.start).num_days() + 1;
    flow.line(3, INK, "Attendance Report");
    flow.line(2, INK, &content.child.full_name());
    flow.line(
        2,
        MUTED,
        &format!("{} to {} ({} days)", content.start, content.end, days),
    );
}

fn summary(flow: &mut Flow, summary: &AttendanceSummary) {
    flow.line(2, INK, "Summary");
    flow.line(
        2,
        INK,
        &format!(
            "Present: {}   Absent: {}   Attendance: {}%",
            summary.present_count, summary.absent_count, summary.percentage
        ),
    );
    flow.line(
        2,
        INK,
        &format!(
            "Longest streak: {}   Current streak: {}",
            summary.longest_present_streak, summary.current_streak
        ),
    );
    flow.line(2, INK, &format!("Trend: {}", summary.current_trend));
}

fn reasons(flow: &mut Flow, summary: &AttendanceSummary) {
    flow.line(2, INK, "Absence reasons");
    if summary.absence_reason_tally.is_empty() {
        flow.line(2, MUTED, "No absences recorded");
        return;
    }
    for (reason, count) in &summary.absence_reason_tally {
        flow.line(2, INK, &format!("{reason}: {count}"));
    }
}

fn trend_strip(flow: &mut Flow, trend: &[TrendPoint]) {
    flow.line(2, INK, "Daily trend");
    if trend.is_empty() {
        return;
    }

    let inner = flow.inner_width();
    let count = u32::try_from(trend.len()).unwrap_or(u32::MAX);
    let cell = (inner / count).clamp(TREND_CELL_MIN, TREND_CELL_MAX);
    let per_row = (inner / cell).max(1) as usize;

    for row in trend.chunks(per_row) {
        let mut x = MARGIN;
        for point in row {
            let color = match (point.has_record, point.is_present) {
                (_, true) => PRESENT,
                (true, false) => ABSENT,
                (false, false) => NO_RECORD,
            };
            flow.rect(x, cell - 1, TREND_CELL_HEIGHT, color);
            x += cell;
        }
        flow.advance(TREND_CELL_HEIGHT + 4);
    }

    flow.advance(6);
    let mut x = MARGIN;
    for (color, label) in [
        (PRESENT, "Present"),
        (ABSENT, "Absent"),
        (NO_RECORD, "No record"),
    ] {
        flow.rect(x, 12, 12, color);
        let label_width = GLYPH_SIZE * 13;
        flow.text_at(x + 18, 1, MUTED, label, label_width);
        x += 18 + label_width;
    }
    flow.advance(20);
}

fn status_table(flow: &mut Flow, rows: &[AttendanceRecord]) {
    flow.line(2, INK, "Daily status");
    if rows.is_empty() {
        flow.line(2, MUTED, "No records in this period");
        return;
    }

    let scale = if flow.width >= 640 { 2 } else { 1 };
    let cell = GLYPH_SIZE * scale;
    let row_height = cell + 8;
    let inner = flow.inner_width();
    let columns = [0, 12 * cell, 23 * cell, 32 * cell];
    let reason_width = inner.saturating_sub(columns[3]);

    let cells = |flow: &mut Flow, color: Color, values: [&str; 4]| {
        for (index, value) in values.iter().enumerate() {
            let width = if index == 3 {
                reason_width
            } else {
                columns[index + 1] - columns[index]
            };
            flow.text_at(MARGIN + columns[index] + 4, scale, color, value, width);
        }
    };

    cells(flow, MUTED, ["Date", "Weekday", "Status", "Reason"]);
    flow.advance(row_height);

    for (index, record) in rows.iter().enumerate() {
        if index % 2 == 0 {
            flow.rect(MARGIN, inner, row_height, STRIPE);
        }
        let (status, color) = if record.is_present {
            ("Present", PRESENT)
        } else {
            ("Absent", ABSENT)
        };
        flow.advance(4);
        let date = record.date.to_string();
        let reason = record.stated_reason().unwrap_or("");
        cells(flow, INK, [date.as_str(), weekday_name(record.date), "", reason]);
        flow.text_at(MARGIN + columns[2] + 4, scale, color, status, columns[3] - columns[2]);
        flow.advance(row_height - 4);
    }
}
