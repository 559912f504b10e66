//! Rebuilding the edit buffer from server truth.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::buffer::{BufferEntry, EditBuffer, EditBufferSnapshot};
use crate::error::Result;
use crate::record::{AttendanceRecord, ChildId};
use crate::roster::{RosterEntry, RosterProvider};
use crate::service::AttendanceService;
use crate::store::RecordStore;

/// Fetches a date from the attendance service and derives a fresh buffer.
#[derive(Clone)]
pub struct ReconciliationEngine {
    service: Arc<dyn AttendanceService>,
    roster: Arc<dyn RosterProvider>,
}

impl fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("service", &self.service.name())
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Create an engine over the given service and roster.
    pub fn new(service: Arc<dyn AttendanceService>, roster: Arc<dyn RosterProvider>) -> Self {
        Self { service, roster }
    }

    /// Fetch everything needed to reconcile `date`.
    ///
    /// Nothing is committed here; see [`Reconciliation::commit`].
    ///
    /// # Errors
    ///
    /// Returns a fetch error if the records or the roster cannot be read.
    pub async fn fetch(&self, date: NaiveDate) -> Result<Reconciliation> {
        let records = self.service.fetch_by_date(date).await.inspect_err(|e| {
            warn!("Failed to fetch attendance for {}: {}", date, e);
        })?;
        let active = self.roster.active(None).await?;
        debug!(
            "Fetched {} records and {} active children for {}",
            records.len(),
            active.len(),
            date
        );

        Ok(Reconciliation {
            date,
            records,
            active,
        })
    }
}

/// The result of fetching one date, ready to be committed.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    date: NaiveDate,
    records: Vec<AttendanceRecord>,
    active: Vec<RosterEntry>,
}

impl Reconciliation {
    /// The date that was fetched.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Commit the fetched records into the store and, if `date` is still
    /// the open date, replace the buffer with a freshly derived one.
    ///
    /// Returns the new snapshot, or `None` when the result was stale and
    /// only the store was refreshed.
    pub fn commit(
        self,
        open_date: Option<NaiveDate>,
        store: &mut RecordStore,
        buffer: &mut EditBuffer,
    ) -> Option<EditBufferSnapshot> {
        store.replace_date(self.date, self.records);

        if open_date != Some(self.date) {
            debug!(
                "Discarding stale reconciliation for {} (open date is {:?})",
                self.date, open_date
            );
            return None;
        }

        *buffer = reconcile(self.date, &self.active, store);
        let snapshot = buffer.snapshot(self.date);
        info!(
            "Loaded {}: {} of {} children present",
            self.date,
            snapshot.present_count(),
            snapshot.len()
        );
        Some(snapshot)
    }
}

/// Derive a buffer for `date` from the active roster and the store.
///
/// Every active child starts absent with no record id. Cached records then
/// overlay presence and identity; a non-empty reason on an absent record
/// seeds the reason map. Records of children off the active roster stay in
/// the store but never reach the buffer.
#[must_use]
pub fn reconcile(date: NaiveDate, active: &[RosterEntry], store: &RecordStore) -> EditBuffer {
    let mut buffer = EditBuffer::new();
    let mut seen: BTreeSet<ChildId> = BTreeSet::new();

    for child in active.iter().filter(|entry| entry.is_active) {
        if !seen.insert(child.id) {
            continue;
        }
        buffer.seed(child.id, date, BufferEntry::absent());
    }

    for record in store.records_for_date(date) {
        if !seen.contains(&record.child_id) {
            debug!(
                "Record {:?} for child {} is not on the active roster",
                record.record_id, record.child_id
            );
            continue;
        }
        buffer.seed(
            record.child_id,
            date,
            BufferEntry {
                is_present: record.is_present,
                record_id: record.record_id,
            },
        );
        if let Some(reason) = record.stated_reason() {
            buffer.seed_reason(record.child_id, reason);
        }
    }

    buffer
}
