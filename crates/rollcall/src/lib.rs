//! `rollcall` - Daycare attendance tracking
//!
//! This library keeps a per-date edit buffer of attendance in step with a
//! remote attendance service: it reconciles server records into the buffer,
//! saves buffered edits back as one batch, aggregates presence statistics,
//! and renders per-child PDF reports.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analytics;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod roster;
pub mod service;
pub mod session;
pub mod store;
pub mod sync;

pub use analytics::{AggregationEngine, AttendanceSummary, MonthlySummary, WeekendDays};
pub use buffer::{EditBuffer, EditBufferSnapshot};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use reconcile::ReconciliationEngine;
pub use record::AttendanceRecord;
pub use report::{ReportArtifact, ReportPipeline};
pub use roster::{RosterEntry, RosterProvider};
pub use service::AttendanceService;
pub use session::{AttendanceSession, SessionEvent};
pub use store::RecordStore;
pub use sync::{SaveReport, SubmitStrategy, SyncEngine};
