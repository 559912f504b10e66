//! Per-child attendance reports.
//!
//! [`ReportPipeline::render`] turns a child, a date window and that
//! child's records into a PDF in four stages:
//!
//! 1. filter the records to the inclusive window and summarize them
//! 2. lay the report out at a fixed pixel width
//! 3. rasterize the layout into one RGB image
//! 4. embed the image into one or more PDF pages
//!
//! The artifact is built entirely in memory. [`ReportArtifact::write_to`]
//! writes through a temporary sibling file so a failed write never leaves
//! a partial report behind.

mod layout;
mod pdf;
mod raster;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub use pdf::PageFormat;

use crate::analytics::{daily_trend, filter_window, AggregationEngine, AttendanceSummary};
use crate::error::{Error, Result};
use crate::record::AttendanceRecord;
use crate::roster::RosterEntry;

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Layout width in pixels. 794 is A4 at 96 dpi.
    pub page_width_px: u32,
    /// Output page size.
    pub page_format: PageFormat,
    /// Page margin in points.
    pub margin_pt: f32,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            page_width_px: 794,
            page_format: PageFormat::A4,
            margin_pt: 36.0,
        }
    }
}

/// A rendered report.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    file_name: String,
    bytes: Vec<u8>,
    pages: usize,
    summary: AttendanceSummary,
}

impl ReportArtifact {
    /// Deterministic output file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The PDF document.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of pages in the document.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Summary of the records inside the report window.
    #[must_use]
    pub fn summary(&self) -> &AttendanceSummary {
        &self.summary
    }

    /// Write the report into `dir` under its file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| Error::DirectoryCreate {
                path: dir.to_path_buf(),
                source,
            })?;

        let path = dir.join(&self.file_name);
        let partial = dir.join(format!(".{}.part", self.file_name));
        let written = match tokio::fs::write(&partial, &self.bytes).await {
            Ok(()) => tokio::fs::rename(&partial, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            discard_partial(&partial).await;
            return Err(e.into());
        }

        info!("Wrote report to {}", path.display());
        Ok(path)
    }
}

async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => debug!("Removed {}", partial.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", partial.display(), e),
    }
}

fn non_alphanumeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("[^A-Za-z0-9]+").expect("Invalid regex pattern"))
}

fn sanitize(part: &str) -> String {
    non_alphanumeric()
        .replace_all(part.trim(), "_")
        .trim_matches('_')
        .to_string()
}

/// `<first>_<last>_attendance_<start>_<end>.pdf`, with runs of
/// non-alphanumeric characters in the names collapsed to `_`.
#[must_use]
pub fn report_file_name(child: &RosterEntry, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{}_{}_attendance_{}_{}.pdf",
        sanitize(&child.first_name),
        sanitize(&child.last_name),
        start,
        end
    )
}

/// Renders per-child attendance reports.
#[derive(Debug, Clone, Default)]
pub struct ReportPipeline {
    options: ReportOptions,
    engine: AggregationEngine,
}

impl ReportPipeline {
    /// Create a pipeline with the given options.
    #[must_use]
    pub fn new(options: ReportOptions) -> Self {
        Self {
            options,
            engine: AggregationEngine::default(),
        }
    }

    /// Use a specific aggregation engine for the summary header.
    #[must_use]
    pub fn with_engine(mut self, engine: AggregationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// The options in use.
    #[must_use]
    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Render a report for `child` over `[start, end]`.
    ///
    /// Records of other children and records outside the window are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns a report error if `start` is after `end` or any rendering
    /// stage fails.
    #[instrument(skip(self, child, records), fields(child_id = child.id))]
    pub async fn render(
        &self,
        child: &RosterEntry,
        records: &[AttendanceRecord],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReportArtifact> {
        if start > end {
            return Err(Error::report(format!(
                "start date {start} is after end date {end}"
            )));
        }

        let own: Vec<AttendanceRecord> = records
            .iter()
            .filter(|record| record.child_id == child.id)
            .cloned()
            .collect();
        let mut rows = filter_window(&own, start, end);
        rows.sort_by_key(|record| record.date);
        debug!(
            "{} of {} records fall within the window",
            rows.len(),
            records.len()
        );

        let summary = self.engine.summarize(&rows);
        let trend = daily_trend(&rows, start, end);
        let layout = layout::build(
            &layout::ReportContent {
                child,
                start,
                end,
                summary: &summary,
                trend: &trend,
                rows: &rows,
            },
            self.options.page_width_px,
        )?;
        let image = raster::rasterize(&layout).await?;
        let title = format!("Attendance report for {}", child.full_name());
        let output = pdf::build_pdf(
            &image,
            self.options.page_format,
            self.options.margin_pt,
            &title,
        )?;

        let artifact = ReportArtifact {
            file_name: report_file_name(child, start, end),
            bytes: output.bytes,
            pages: output.pages,
            summary,
        };
        info!(
            "Rendered {} ({} pages, {}x{} px)",
            artifact.file_name,
            artifact.pages,
            image.width(),
            image.height()
        );
        Ok(artifact)
    }
}
