//! Unsaved attendance edits.
//!
//! An [`EditBuffer`] overlays presence toggles on top of the record store,
//! keyed by child and date, plus one free-text absence reason per child.
//! It is rebuilt in full whenever a date is loaded and only changes
//! otherwise through explicit edits.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::record::{ChildId, RecordId};

/// Presence state of one child on one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferEntry {
    /// Whether the child is marked present.
    pub is_present: bool,
    /// Persisted identity of the underlying record, if any.
    pub record_id: Option<RecordId>,
}

impl BufferEntry {
    /// A default-absent entry with no backing record.
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            is_present: false,
            record_id: None,
        }
    }
}

/// Mutable overlay of in-progress attendance edits.
#[derive(Debug, Clone, Default)]
pub struct EditBuffer {
    entries: BTreeMap<ChildId, BTreeMap<NaiveDate, BufferEntry>>,
    reasons: BTreeMap<ChildId, String>,
    dirty: bool,
}

impl EditBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry during reconciliation. Does not mark the buffer dirty.
    pub fn seed(&mut self, child_id: ChildId, date: NaiveDate, entry: BufferEntry) {
        self.entries.entry(child_id).or_default().insert(date, entry);
    }

    /// Seed an absence reason during reconciliation.
    pub fn seed_reason(&mut self, child_id: ChildId, reason: impl Into<String>) {
        self.reasons.insert(child_id, reason.into());
    }

    /// The entry for a child on a date.
    #[must_use]
    pub fn entry(&self, child_id: ChildId, date: NaiveDate) -> Option<&BufferEntry> {
        self.entries.get(&child_id).and_then(|dates| dates.get(&date))
    }

    fn entry_mut(&mut self, child_id: ChildId, date: NaiveDate) -> Result<&mut BufferEntry> {
        self.entries
            .get_mut(&child_id)
            .and_then(|dates| dates.get_mut(&date))
            .ok_or(Error::UnknownChild(child_id))
    }

    /// Whether the child is marked present. Missing entries read as absent.
    #[must_use]
    pub fn is_present(&self, child_id: ChildId, date: NaiveDate) -> bool {
        self.entry(child_id, date).is_some_and(|entry| entry.is_present)
    }

    /// The record id carried for a child on a date.
    #[must_use]
    pub fn record_id(&self, child_id: ChildId, date: NaiveDate) -> Option<RecordId> {
        self.entry(child_id, date).and_then(|entry| entry.record_id)
    }

    /// Mark a child present or absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChild`] if the child has no entry on `date`.
    pub fn set_present(&mut self, child_id: ChildId, date: NaiveDate, present: bool) -> Result<()> {
        let entry = self.entry_mut(child_id, date)?;
        if entry.is_present != present {
            entry.is_present = present;
            self.dirty = true;
        }
        Ok(())
    }

    /// Flip a child's presence and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChild`] if the child has no entry on `date`.
    pub fn toggle(&mut self, child_id: ChildId, date: NaiveDate) -> Result<bool> {
        let entry = self.entry_mut(child_id, date)?;
        entry.is_present = !entry.is_present;
        let present = entry.is_present;
        self.dirty = true;
        Ok(present)
    }

    /// Replace a child's absence reason. An empty reason removes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChild`] if the child is not in the buffer.
    pub fn set_reason(&mut self, child_id: ChildId, reason: impl Into<String>) -> Result<()> {
        if !self.entries.contains_key(&child_id) {
            return Err(Error::UnknownChild(child_id));
        }
        let reason = reason.into();
        if reason.is_empty() {
            self.reasons.remove(&child_id);
        } else {
            self.reasons.insert(child_id, reason);
        }
        self.dirty = true;
        Ok(())
    }

    /// The buffered absence reason for a child, empty if none.
    #[must_use]
    pub fn reason(&self, child_id: ChildId) -> &str {
        self.reasons.get(&child_id).map_or("", String::as_str)
    }

    /// Children with an entry on `date`, in id order.
    pub fn children_on(&self, date: NaiveDate) -> impl Iterator<Item = ChildId> + '_ {
        self.entries
            .iter()
            .filter(move |(_, dates)| dates.contains_key(&date))
            .map(|(child_id, _)| *child_id)
    }

    /// Whether any edit happened since the buffer was built.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Check if the buffer holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard every entry and reason.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.reasons.clear();
        self.dirty = false;
    }

    /// Immutable copy of the buffer content for one date.
    #[must_use]
    pub fn snapshot(&self, date: NaiveDate) -> EditBufferSnapshot {
        let entries: BTreeMap<ChildId, BufferEntry> = self
            .entries
            .iter()
            .filter_map(|(child_id, dates)| dates.get(&date).map(|entry| (*child_id, *entry)))
            .collect();
        let reasons = self
            .reasons
            .iter()
            .filter(|(child_id, _)| entries.contains_key(child_id))
            .map(|(child_id, reason)| (*child_id, reason.clone()))
            .collect();

        EditBufferSnapshot {
            date,
            entries,
            reasons,
        }
    }
}

/// Comparable copy of the buffer for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBufferSnapshot {
    date: NaiveDate,
    entries: BTreeMap<ChildId, BufferEntry>,
    reasons: BTreeMap<ChildId, String>,
}

impl EditBufferSnapshot {
    /// An empty snapshot for `date`.
    #[must_use]
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            entries: BTreeMap::new(),
            reasons: BTreeMap::new(),
        }
    }

    /// The date this snapshot describes.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// The entry for a child.
    #[must_use]
    pub fn entry(&self, child_id: ChildId) -> Option<&BufferEntry> {
        self.entries.get(&child_id)
    }

    /// The absence reason for a child, empty if none.
    #[must_use]
    pub fn reason(&self, child_id: ChildId) -> &str {
        self.reasons.get(&child_id).map_or("", String::as_str)
    }

    /// Entries in child id order.
    pub fn iter(&self) -> impl Iterator<Item = (ChildId, &BufferEntry)> {
        self.entries.iter().map(|(child_id, entry)| (*child_id, entry))
    }

    /// Number of children in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of children marked present.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_present).count()
    }
}
