//! Roster and identity collaborators.
//!
//! The roster and the acting staff identity are owned outside the
//! attendance core; this module defines the read-only views the engines
//! need, plus simple providers for tests and the command-line front-end.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{ChildId, ClassId, StaffId};

/// One child on the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    /// Child identifier.
    pub id: ChildId,
    /// Whether the child is currently enrolled.
    pub is_active: bool,
    /// Class the child is assigned to.
    #[serde(default)]
    pub class_id: Option<ClassId>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl RosterEntry {
    /// Create an active roster entry.
    #[must_use]
    pub fn new(id: ChildId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            is_active: true,
            class_id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Assign the entry to a class.
    #[must_use]
    pub fn in_class(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Mark the entry inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Display name, `First Last`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Check whether the entry belongs to the given class filter.
    ///
    /// `None` matches every class.
    #[must_use]
    pub fn matches_class(&self, class_filter: Option<ClassId>) -> bool {
        class_filter.map_or(true, |class| self.class_id == Some(class))
    }
}

/// Source of the child roster.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// All roster entries, active and inactive, in roster order.
    ///
    /// # Errors
    ///
    /// Returns an error if the roster cannot be read.
    async fn entries(&self) -> Result<Vec<RosterEntry>>;

    /// Active roster entries, optionally narrowed to one class.
    ///
    /// # Errors
    ///
    /// Returns an error if the roster cannot be read.
    async fn active(&self, class_filter: Option<ClassId>) -> Result<Vec<RosterEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| entry.is_active && entry.matches_class(class_filter))
            .collect())
    }

    /// Look up one child by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the roster cannot be read.
    async fn find(&self, child_id: ChildId) -> Result<Option<RosterEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .find(|entry| entry.id == child_id))
    }
}

/// Provider of the acting staff member's identity.
pub trait IdentityProvider: Send + Sync {
    /// The staff id recorded as `reportedBy` on submissions.
    fn staff_id(&self) -> StaffId;
}

/// A fixed in-memory roster.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    entries: Vec<RosterEntry>,
}

impl StaticRoster {
    /// Create a roster from entries in roster order.
    #[must_use]
    pub fn new(entries: Vec<RosterEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl RosterProvider for StaticRoster {
    async fn entries(&self) -> Result<Vec<RosterEntry>> {
        Ok(self.entries.clone())
    }
}

/// A roster read from a JSON array of entries on disk.
///
/// The file is re-read on every call so edits made by the owning
/// application are picked up without a restart.
#[derive(Debug, Clone)]
pub struct RosterFile {
    path: PathBuf,
}

impl RosterFile {
    /// Create a provider for the given file.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the roster file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RosterProvider for RosterFile {
    async fn entries(&self) -> Result<Vec<RosterEntry>> {
        debug!("Reading roster from {}", self.path.display());
        let raw = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::malformed(self.path.display().to_string(), e.to_string()))
    }
}

/// A fixed staff identity, typically taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIdentity(pub StaffId);

impl IdentityProvider for StaticIdentity {
    fn staff_id(&self) -> StaffId {
        self.0
    }
}
