//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use rollcall::logging::Verbosity;
use rollcall::record::{AttendanceRecord, ChildId, RecordId};
use rollcall::roster::{RosterEntry, StaticIdentity, StaticRoster};
use rollcall::{AttendanceService, AttendanceSession, Error, MonthlySummary, Result};

/// Staff id used for every submission in tests.
pub const STAFF: i64 = 900;

/// Route crate events at debug level to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(Verbosity::Verbose.env_filter())
        .with_test_writer()
        .try_init();
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// In-memory attendance service that counts calls and fails on demand.
#[derive(Debug, Default)]
pub struct FakeService {
    records: Mutex<Vec<AttendanceRecord>>,
    next_id: AtomicUsize,
    failing_children: Mutex<HashSet<ChildId>>,
    fail_fetches: AtomicBool,
    malformed_creates: AtomicBool,
    pub fetches: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicUsize::new(100),
            ..Self::default()
        })
    }

    /// Store a record as if it had been persisted earlier.
    pub fn seed(&self, record: AttendanceRecord) -> RecordId {
        let id = self.allocate_id();
        self.records.lock().unwrap().push(record.with_id(id));
        id
    }

    /// Make every submission for `child_id` fail.
    pub fn fail_child(&self, child_id: ChildId) {
        self.failing_children.lock().unwrap().insert(child_id);
    }

    /// Make every read fail, or succeed again.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Make creates answer with an undecodable payload.
    pub fn malformed_creates(&self) {
        self.malformed_creates.store(true, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.fetches.store(0, Ordering::SeqCst);
        self.creates.store(0, Ordering::SeqCst);
        self.updates.store(0, Ordering::SeqCst);
    }

    /// Every stored record, ordered by child then date.
    pub fn stored(&self) -> Vec<AttendanceRecord> {
        let mut records = self.records.lock().unwrap().clone();
        records.sort_by_key(|r| (r.child_id, r.date));
        records
    }

    pub fn stored_for(&self, child_id: ChildId, on: NaiveDate) -> Vec<AttendanceRecord> {
        self.stored()
            .into_iter()
            .filter(|r| r.child_id == child_id && r.date == on)
            .collect()
    }

    fn allocate_id(&self) -> RecordId {
        self.next_id.fetch_add(1, Ordering::SeqCst) as RecordId
    }

    fn check_fetch(&self, what: &str) -> Result<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(Error::fetch(what, "injected failure"));
        }
        Ok(())
    }

    fn check_submit(&self, record: &AttendanceRecord) -> Result<()> {
        if self.failing_children.lock().unwrap().contains(&record.child_id) {
            return Err(Error::submit(record.child_id, record.date, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceService for FakeService {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_by_date(&self, on: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        self.check_fetch("attendance by date")?;
        Ok(self
            .stored()
            .into_iter()
            .filter(|r| r.date == on)
            .collect())
    }

    async fn fetch_by_child(&self, child_id: ChildId) -> Result<Vec<AttendanceRecord>> {
        self.check_fetch("attendance by child")?;
        Ok(self
            .stored()
            .into_iter()
            .filter(|r| r.child_id == child_id)
            .collect())
    }

    async fn monthly_summary(&self, year: i32, month: u32) -> Result<MonthlySummary> {
        self.check_fetch("attendance summary")?;
        let records: Vec<AttendanceRecord> = self
            .stored()
            .into_iter()
            .filter(|r| r.date.year() == year && r.date.month() == month)
            .collect();
        Ok(MonthlySummary::from_records(year, month, &records))
    }

    async fn create(&self, record: &AttendanceRecord) -> Result<AttendanceRecord> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check_submit(record)?;
        if self.malformed_creates.load(Ordering::SeqCst) {
            return Err(Error::malformed("POST attendance", "expected value at line 1"));
        }
        let stored = record.clone().with_id(self.allocate_id());
        self.records.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        record_id: RecordId,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check_submit(record)?;
        let mut records = self.records.lock().unwrap();
        let slot = records
            .iter_mut()
            .find(|r| r.record_id == Some(record_id))
            .ok_or_else(|| Error::submit(record.child_id, record.date, "no such record"))?;
        *slot = record.clone().with_id(record_id);
        Ok(slot.clone())
    }
}

/// Children 1 and 2 active, 3 inactive.
pub fn small_roster() -> Vec<RosterEntry> {
    vec![
        RosterEntry::new(1, "Ada", "Lovelace").in_class(10),
        RosterEntry::new(2, "Grace", "Hopper").in_class(20),
        RosterEntry::new(3, "Alan", "Turing").inactive(),
    ]
}

/// Five active children with ids 1..=5.
pub fn five_children() -> Vec<RosterEntry> {
    (1..=5)
        .map(|id| RosterEntry::new(id, format!("Child{id}"), "Test"))
        .collect()
}

pub fn session_with(service: Arc<FakeService>, roster: Vec<RosterEntry>) -> AttendanceSession {
    init_tracing();
    AttendanceSession::new(
        service,
        Arc::new(StaticRoster::new(roster)),
        Arc::new(StaticIdentity(STAFF)),
    )
}
