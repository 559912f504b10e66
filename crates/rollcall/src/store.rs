//! In-memory cache of server-confirmed attendance records.
//!
//! The [`RecordStore`] is the only place that holds "last known server
//! truth". It is refreshed wholesale per date (or per child) from remote
//! fetches and never edited by the user-facing side.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::record::{AttendanceRecord, ChildId, RecordId};

/// Normalized record cache indexed by `(child, date)` and by date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    records: BTreeMap<(ChildId, NaiveDate), AttendanceRecord>,
    by_date: BTreeMap<NaiveDate, BTreeSet<ChildId>>,
}

impl RecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything cached for `date` with a fresh fetch result.
    ///
    /// Records dated elsewhere are ignored. When the fetch holds more than
    /// one record for a child, the last one wins.
    pub fn replace_date(&mut self, date: NaiveDate, records: Vec<AttendanceRecord>) {
        if let Some(children) = self.by_date.remove(&date) {
            for child_id in children {
                self.records.remove(&(child_id, date));
            }
        }

        for record in records {
            if record.date != date {
                warn!(
                    "Ignoring record for child {} dated {} in fetch for {}",
                    record.child_id, record.date, date
                );
                continue;
            }
            self.insert(record);
        }
        debug!(
            "Record store holds {} records for {}",
            self.by_date.get(&date).map_or(0, BTreeSet::len),
            date
        );
    }

    /// Replace everything cached for one child with a fresh history fetch.
    ///
    /// Records for other children are ignored; duplicates per date resolve
    /// last-wins.
    pub fn replace_child(&mut self, child_id: ChildId, records: Vec<AttendanceRecord>) {
        let dates: Vec<NaiveDate> = self
            .records
            .range((child_id, NaiveDate::MIN)..=(child_id, NaiveDate::MAX))
            .map(|((_, date), _)| *date)
            .collect();
        for date in dates {
            self.remove(child_id, date);
        }

        for record in records {
            if record.child_id == child_id {
                self.insert(record);
            }
        }
    }

    /// Insert or overwrite one record.
    pub fn insert(&mut self, record: AttendanceRecord) {
        let key = (record.child_id, record.date);
        if self.records.contains_key(&key) {
            debug!(
                "Duplicate record for child {} on {}, keeping the later one",
                key.0, key.1
            );
        }
        self.by_date.entry(record.date).or_default().insert(record.child_id);
        self.records.insert(key, record);
    }

    fn remove(&mut self, child_id: ChildId, date: NaiveDate) {
        self.records.remove(&(child_id, date));
        if let Some(children) = self.by_date.get_mut(&date) {
            children.remove(&child_id);
            if children.is_empty() {
                self.by_date.remove(&date);
            }
        }
    }

    /// The cached record for a child on a date.
    #[must_use]
    pub fn get(&self, child_id: ChildId, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.records.get(&(child_id, date))
    }

    /// The persisted id for a child on a date, if any.
    #[must_use]
    pub fn record_id(&self, child_id: ChildId, date: NaiveDate) -> Option<RecordId> {
        self.get(child_id, date).and_then(|record| record.record_id)
    }

    /// All cached records on a date, in child id order.
    #[must_use]
    pub fn records_for_date(&self, date: NaiveDate) -> Vec<&AttendanceRecord> {
        self.by_date
            .get(&date)
            .into_iter()
            .flatten()
            .filter_map(|child_id| self.records.get(&(*child_id, date)))
            .collect()
    }

    /// All cached records of a child, in ascending date order.
    #[must_use]
    pub fn records_for_child(&self, child_id: ChildId) -> Vec<&AttendanceRecord> {
        self.records
            .range((child_id, NaiveDate::MIN)..=(child_id, NaiveDate::MAX))
            .map(|(_, record)| record)
            .collect()
    }

    /// Every cached record, ordered by child then date.
    pub fn records(&self) -> impl Iterator<Item = &AttendanceRecord> {
        self.records.values()
    }

    /// Dates with at least one cached record.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every cached record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_date.clear();
    }
}
