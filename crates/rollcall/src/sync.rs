//! Batch synchronization of buffered attendance.
//!
//! A save resubmits every target child on the open date: children with a
//! known record id are updated, the rest are created. Per-record failures
//! are collected rather than aborting the batch.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::buffer::EditBuffer;
use crate::error::{Error, Result};
use crate::record::{AttendanceRecord, ChildId, RecordId, StaffId};
use crate::roster::RosterEntry;
use crate::service::AttendanceService;
use crate::store::RecordStore;

/// How the submissions of one save are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitStrategy {
    /// One request at a time, in roster order.
    #[default]
    Sequential,
    /// At most `n` requests in flight; results are still reported in
    /// roster order.
    Bounded(usize),
}

impl SubmitStrategy {
    /// Maximum number of requests in flight.
    #[must_use]
    pub fn concurrency(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Bounded(n) => n.max(1),
        }
    }
}

impl fmt::Display for SubmitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Bounded(n) => write!(f, "bounded({n})"),
        }
    }
}

/// Whether a submission creates a record or updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    /// `POST` a new record.
    Create,
    /// `PUT` over the record with this id.
    Update(RecordId),
}

/// One record waiting to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    /// Create or update.
    pub action: SubmitAction,
    /// The record body.
    pub record: AttendanceRecord,
}

/// A submission that did not go through.
#[derive(Debug)]
pub struct SubmitFailure {
    /// Child whose record failed.
    pub child_id: ChildId,
    /// What was attempted.
    pub action: SubmitAction,
    /// Why it failed.
    pub error: Error,
}

/// Outcome of one save.
#[derive(Debug)]
pub struct SaveReport {
    date: NaiveDate,
    created: Vec<AttendanceRecord>,
    updated: Vec<AttendanceRecord>,
    failures: Vec<SubmitFailure>,
}

impl SaveReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            created: Vec::new(),
            updated: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// The date that was saved.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// True only if every submission succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Records created by this save, as returned by the service.
    #[must_use]
    pub fn created(&self) -> &[AttendanceRecord] {
        &self.created
    }

    /// Records updated by this save, as returned by the service.
    #[must_use]
    pub fn updated(&self) -> &[AttendanceRecord] {
        &self.updated
    }

    /// Submissions that failed.
    #[must_use]
    pub fn failures(&self) -> &[SubmitFailure] {
        &self.failures
    }

    /// Total number of submissions attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.created.len() + self.updated.len() + self.failures.len()
    }

    /// Surface the first catastrophic failure as an error.
    ///
    /// # Errors
    ///
    /// Returns the first failure that cannot be treated as a per-record
    /// submit error, such as a malformed response.
    pub fn into_result(mut self) -> Result<Self> {
        match self.failures.iter().position(|f| f.error.is_catastrophic()) {
            Some(index) => Err(self.failures.swap_remove(index).error),
            None => Ok(self),
        }
    }
}

/// Build the submissions for one save.
///
/// `targets` is the roster slice being saved; every active child in it is
/// submitted once, in roster order. A child without a buffer entry is
/// submitted absent.
#[must_use]
pub fn plan(
    date: NaiveDate,
    targets: &[RosterEntry],
    buffer: &EditBuffer,
    store: &RecordStore,
    reported_by: StaffId,
) -> Vec<PendingSubmission> {
    let mut seen = BTreeSet::new();

    targets
        .iter()
        .filter(|child| child.is_active && seen.insert(child.id))
        .map(|child| {
            let record_id = buffer
                .record_id(child.id, date)
                .or_else(|| store.record_id(child.id, date));
            let is_present = buffer.is_present(child.id, date);
            let record = AttendanceRecord::new(
                child.id,
                date,
                is_present,
                buffer.reason(child.id),
                reported_by,
            );

            match record_id {
                Some(id) => PendingSubmission {
                    action: SubmitAction::Update(id),
                    record: AttendanceRecord {
                        record_id: Some(id),
                        ..record
                    },
                },
                None => PendingSubmission {
                    action: SubmitAction::Create,
                    record,
                },
            }
        })
        .collect()
}

/// Dispatches planned submissions to the attendance service.
#[derive(Clone)]
pub struct SyncEngine {
    service: Arc<dyn AttendanceService>,
    strategy: SubmitStrategy,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("service", &self.service.name())
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl SyncEngine {
    /// Create an engine with the given dispatch strategy.
    pub fn new(service: Arc<dyn AttendanceService>, strategy: SubmitStrategy) -> Self {
        Self { service, strategy }
    }

    /// The dispatch strategy in use.
    #[must_use]
    pub fn strategy(&self) -> SubmitStrategy {
        self.strategy
    }

    /// Submit every planned record and collect the outcomes.
    pub async fn submit(&self, date: NaiveDate, plan: Vec<PendingSubmission>) -> SaveReport {
        let total = plan.len();
        debug!("Submitting {} records for {} ({})", total, date, self.strategy);

        let outcomes: Vec<(PendingSubmission, Result<AttendanceRecord>)> = match self.strategy {
            SubmitStrategy::Sequential => {
                let mut outcomes = Vec::with_capacity(total);
                for pending in plan {
                    let result = self.submit_one(&pending).await;
                    outcomes.push((pending, result));
                }
                outcomes
            }
            SubmitStrategy::Bounded(_) => {
                stream::iter(plan)
                    .map(|pending| async move {
                        let result = self.submit_one(&pending).await;
                        (pending, result)
                    })
                    .buffered(self.strategy.concurrency())
                    .collect()
                    .await
            }
        };

        let mut report = SaveReport::new(date);
        for (pending, result) in outcomes {
            match (pending.action, result) {
                (SubmitAction::Create, Ok(record)) => report.created.push(record),
                (SubmitAction::Update(_), Ok(record)) => report.updated.push(record),
                (action, Err(error)) => {
                    warn!(
                        "Failed to submit attendance for child {} on {}: {}",
                        pending.record.child_id, date, error
                    );
                    report.failures.push(SubmitFailure {
                        child_id: pending.record.child_id,
                        action,
                        error,
                    });
                }
            }
        }

        info!(
            "Saved {}: {} created, {} updated, {} failed",
            date,
            report.created.len(),
            report.updated.len(),
            report.failures.len()
        );
        report
    }

    async fn submit_one(&self, pending: &PendingSubmission) -> Result<AttendanceRecord> {
        match pending.action {
            SubmitAction::Create => self.service.create(&pending.record).await,
            SubmitAction::Update(id) => self.service.update(id, &pending.record).await,
        }
    }
}
