//! Attendance session: the open date, its record store and edit buffer.
//!
//! An [`AttendanceSession`] wires the engines together and is the only
//! thing front-ends talk to. Every mutating operation takes `&mut self`, so
//! a load and a save on the same session can never interleave; share a
//! session across tasks behind a `tokio::sync::Mutex`.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::analytics::MonthlySummary;
use crate::buffer::{EditBuffer, EditBufferSnapshot};
use crate::error::{Error, Result};
use crate::record::{AttendanceRecord, ChildId, ClassId};
use crate::reconcile::ReconciliationEngine;
use crate::roster::{IdentityProvider, RosterProvider};
use crate::service::AttendanceService;
use crate::store::RecordStore;
use crate::sync::{self, SaveReport, SubmitStrategy, SyncEngine};

/// Change notifications published by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Nothing has happened yet.
    Idle,
    /// A date is being fetched.
    Loading(NaiveDate),
    /// A date was loaded and the buffer rebuilt.
    Loaded(NaiveDate),
    /// Fetching a date failed.
    LoadFailed(NaiveDate),
    /// A child's buffered state was edited.
    Edited {
        /// The open date.
        date: NaiveDate,
        /// The edited child.
        child_id: ChildId,
    },
    /// A save is in progress.
    Saving(NaiveDate),
    /// A save finished and the date was reloaded.
    Saved {
        /// The saved date.
        date: NaiveDate,
        /// Whether every submission went through.
        succeeded: bool,
    },
}

/// One user's working state over the attendance service.
pub struct AttendanceSession {
    service: Arc<dyn AttendanceService>,
    roster: Arc<dyn RosterProvider>,
    identity: Arc<dyn IdentityProvider>,
    reconciler: ReconciliationEngine,
    sync: SyncEngine,
    store: RecordStore,
    buffer: EditBuffer,
    open_date: Option<NaiveDate>,
    events: watch::Sender<SessionEvent>,
}

impl fmt::Debug for AttendanceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttendanceSession")
            .field("service", &self.service.name())
            .field("strategy", &self.sync.strategy())
            .field("open_date", &self.open_date)
            .field("records", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl AttendanceSession {
    /// Create a session with sequential submission.
    pub fn new(
        service: Arc<dyn AttendanceService>,
        roster: Arc<dyn RosterProvider>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let (events, _) = watch::channel(SessionEvent::Idle);
        Self {
            reconciler: ReconciliationEngine::new(service.clone(), roster.clone()),
            sync: SyncEngine::new(service.clone(), SubmitStrategy::Sequential),
            service,
            roster,
            identity,
            store: RecordStore::new(),
            buffer: EditBuffer::new(),
            open_date: None,
            events,
        }
    }

    /// Use a different submission strategy for saves.
    #[must_use]
    pub fn with_strategy(mut self, strategy: SubmitStrategy) -> Self {
        self.sync = SyncEngine::new(self.service.clone(), strategy);
        self
    }

    /// Receive change notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: SessionEvent) {
        self.events.send_replace(event);
    }

    /// The date currently open for editing.
    #[must_use]
    pub fn open_date(&self) -> Option<NaiveDate> {
        self.open_date
    }

    /// Server-confirmed records fetched so far.
    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Unsaved edits for the open date.
    #[must_use]
    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    /// The roster backing this session.
    #[must_use]
    pub fn roster(&self) -> &Arc<dyn RosterProvider> {
        &self.roster
    }

    /// Snapshot of the open date, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<EditBufferSnapshot> {
        self.open_date.map(|date| self.buffer.snapshot(date))
    }

    /// Open `date` and rebuild the edit buffer from server truth.
    ///
    /// On failure the error is returned. If `date` differs from the date
    /// that was open, the buffer is cleared and `date` becomes the open,
    /// empty date; reloading the same date keeps its unsaved edits.
    ///
    /// # Errors
    ///
    /// Returns a fetch error if the records or the roster cannot be read.
    #[instrument(skip(self))]
    pub async fn load_date(&mut self, date: NaiveDate) -> Result<EditBufferSnapshot> {
        let previous = self.open_date.replace(date);
        self.notify(SessionEvent::Loading(date));

        let reconciliation = match self.reconciler.fetch(date).await {
            Ok(reconciliation) => reconciliation,
            Err(e) => {
                if previous != Some(date) {
                    debug!("Clearing edit buffer after failed load of {}", date);
                    self.buffer.clear();
                } else {
                    warn!("Reload of {} failed, keeping unsaved edits", date);
                }
                self.notify(SessionEvent::LoadFailed(date));
                return Err(e);
            }
        };

        let snapshot = reconciliation
            .commit(self.open_date, &mut self.store, &mut self.buffer)
            .unwrap_or_else(|| self.buffer.snapshot(date));
        self.notify(SessionEvent::Loaded(date));
        Ok(snapshot)
    }

    fn require_open_date(&self) -> Result<NaiveDate> {
        self.open_date.ok_or(Error::NoOpenDate)
    }

    /// Mark a child present or absent on the open date.
    ///
    /// # Errors
    ///
    /// Returns an error if no date is open or the child is not in the buffer.
    pub fn set_present(&mut self, child_id: ChildId, present: bool) -> Result<()> {
        let date = self.require_open_date()?;
        self.buffer.set_present(child_id, date, present)?;
        self.notify(SessionEvent::Edited { date, child_id });
        Ok(())
    }

    /// Flip a child's presence on the open date and return the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if no date is open or the child is not in the buffer.
    pub fn toggle(&mut self, child_id: ChildId) -> Result<bool> {
        let date = self.require_open_date()?;
        let present = self.buffer.toggle(child_id, date)?;
        self.notify(SessionEvent::Edited { date, child_id });
        Ok(present)
    }

    /// Set a child's absence reason for the open date.
    ///
    /// # Errors
    ///
    /// Returns an error if no date is open or the child is not in the buffer.
    pub fn set_reason(&mut self, child_id: ChildId, reason: impl Into<String>) -> Result<()> {
        let date = self.require_open_date()?;
        self.buffer.set_reason(child_id, reason)?;
        self.notify(SessionEvent::Edited { date, child_id });
        Ok(())
    }

    /// Persist the open date, then reload it once.
    ///
    /// Every active child (optionally narrowed to one class) is submitted.
    /// Individual submit failures are collected in the report; check
    /// [`SaveReport::succeeded`].
    ///
    /// # Errors
    ///
    /// Returns an error if no date is open, the roster cannot be read, the
    /// reload fails, or a submission failed catastrophically.
    #[instrument(skip(self))]
    pub async fn save(&mut self, class_filter: Option<ClassId>) -> Result<SaveReport> {
        let date = self.require_open_date()?;
        let targets = self.roster.active(class_filter).await?;
        self.notify(SessionEvent::Saving(date));

        let plan = sync::plan(
            date,
            &targets,
            &self.buffer,
            &self.store,
            self.identity.staff_id(),
        );
        let report = self.sync.submit(date, plan).await;

        self.load_date(date).await?;

        let succeeded = report.succeeded();
        self.notify(SessionEvent::Saved { date, succeeded });
        if succeeded {
            info!("Saved attendance for {}", date);
        } else {
            warn!(
                "Saved attendance for {} with {} of {} submissions failing",
                date,
                report.failures().len(),
                report.attempted()
            );
        }
        report.into_result()
    }

    /// Fetch one child's full history and cache it.
    ///
    /// # Errors
    ///
    /// Returns a fetch error if the history cannot be read.
    pub async fn child_history(&mut self, child_id: ChildId) -> Result<Vec<AttendanceRecord>> {
        let records = self.service.fetch_by_child(child_id).await?;
        self.store.replace_child(child_id, records);
        Ok(self
            .store
            .records_for_child(child_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Fetch the per-day present counts for a month.
    ///
    /// # Errors
    ///
    /// Returns a fetch error if the summary cannot be read.
    pub async fn monthly_summary(&self, year: i32, month: u32) -> Result<MonthlySummary> {
        self.service.monthly_summary(year, month).await
    }
}
