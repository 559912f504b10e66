//! Configuration management for rollcall.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Weekday;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::analytics::WeekendDays;
use crate::error::{Error, Result};
use crate::record::{ClassId, StaffId};
use crate::report::{PageFormat, ReportOptions};
use crate::sync::SubmitStrategy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "rollcall";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "attendance.db";

/// Default roster file name.
const ROSTER_FILE_NAME: &str = "roster.json";

/// Accepted layout widths in pixels.
const PAGE_WIDTH_RANGE: std::ops::RangeInclusive<u32> = 320..=4096;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ROLLCALL_`, sections split on `__`)
/// 2. TOML config file at `~/.config/rollcall/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Attendance service configuration.
    pub service: ServiceConfig,
    /// Save behavior.
    pub sync: SyncConfig,
    /// Roster source.
    pub roster: RosterConfig,
    /// Acting staff identity.
    pub identity: IdentityConfig,
    /// Report rendering.
    pub report: ReportConfig,
    /// Aggregation settings.
    pub analytics: AnalyticsConfig,
}

/// Which attendance service implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local `SQLite` database.
    #[default]
    Sqlite,
    /// Remote HTTP API.
    Http,
}

/// Attendance service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Backend to talk to.
    pub backend: Backend,
    /// API root for the HTTP backend.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Bearer token for the HTTP backend.
    pub token: Option<String>,
    /// Path to the database file for the `SQLite` backend.
    /// Defaults to `~/.local/share/rollcall/attendance.db`
    pub database_path: Option<PathBuf>,
}

/// How submissions are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// One request at a time.
    #[default]
    Sequential,
    /// Up to `max_in_flight` concurrent requests.
    Bounded,
}

/// Save configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Submission strategy.
    pub strategy: StrategyKind,
    /// Concurrency limit for the bounded strategy.
    pub max_in_flight: usize,
}

/// Roster configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Path to the JSON roster file.
    /// Defaults to `~/.local/share/rollcall/roster.json`
    pub path: Option<PathBuf>,
    /// Restrict saves to one class.
    pub class_filter: Option<ClassId>,
}

/// Identity configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Staff id recorded on submitted records.
    pub staff_id: StaffId,
}

/// Report configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory reports are written to. Defaults to the current directory.
    pub output_dir: Option<PathBuf>,
    /// Layout width in pixels.
    pub page_width_px: u32,
    /// Output page size.
    pub page_format: PageFormat,
    /// Page margin in points.
    pub margin_pt: f32,
}

/// Aggregation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// The two weekdays excluded from working-day views.
    pub weekend_days: Vec<Weekday>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            base_url: None,
            timeout_secs: 30,
            token: None,
            database_path: None, // Will be resolved to default at runtime
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Sequential,
            max_in_flight: 4,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        let options = ReportOptions::default();
        Self {
            output_dir: None,
            page_width_px: options.page_width_px,
            page_format: options.page_format,
            margin_pt: options.margin_pt,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            weekend_days: vec![Weekday::Sat, Weekday::Sun],
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `ROLLCALL_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("ROLLCALL_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::ConfigValidation { message });

        if self.service.backend == Backend::Http
            && self
                .service
                .base_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            return invalid("the http backend requires service.base_url".to_string());
        }

        if self.service.timeout_secs == 0 {
            return invalid("timeout_secs must be greater than 0".to_string());
        }

        if self.sync.strategy == StrategyKind::Bounded && self.sync.max_in_flight == 0 {
            return invalid(
                "max_in_flight must be greater than 0 for the bounded strategy".to_string(),
            );
        }

        if !PAGE_WIDTH_RANGE.contains(&self.report.page_width_px) {
            return invalid(format!(
                "page_width_px ({}) must be between {} and {}",
                self.report.page_width_px,
                PAGE_WIDTH_RANGE.start(),
                PAGE_WIDTH_RANGE.end()
            ));
        }

        let (page_width, page_height) = self.report.page_format.size_pt();
        if !self.report.margin_pt.is_finite()
            || self.report.margin_pt < 0.0
            || self.report.margin_pt * 2.0 >= page_width.min(page_height)
        {
            return invalid(format!(
                "margin_pt ({}) leaves no printable area on {} pages",
                self.report.margin_pt, self.report.page_format
            ));
        }

        match self.analytics.weekend_days.as_slice() {
            [first, second] if first != second => {}
            days => {
                return invalid(format!(
                    "weekend_days must name exactly two distinct days, got {days:?}"
                ));
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.service
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the roster file path, resolving defaults if not set.
    #[must_use]
    pub fn roster_path(&self) -> PathBuf {
        self.roster
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(ROSTER_FILE_NAME))
    }

    /// Get the report output directory, resolving defaults if not set.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.report
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    /// The configured submission strategy.
    #[must_use]
    pub fn submit_strategy(&self) -> SubmitStrategy {
        match self.sync.strategy {
            StrategyKind::Sequential => SubmitStrategy::Sequential,
            StrategyKind::Bounded => SubmitStrategy::Bounded(self.sync.max_in_flight),
        }
    }

    /// The configured weekend, Saturday and Sunday if unset.
    #[must_use]
    pub fn weekend(&self) -> WeekendDays {
        match self.analytics.weekend_days.as_slice() {
            [first, second] => WeekendDays::new(*first, *second),
            _ => WeekendDays::default(),
        }
    }

    /// Rendering options for the report pipeline.
    #[must_use]
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            page_width_px: self.report.page_width_px,
            page_format: self.report.page_format,
            margin_pt: self.report.margin_pt,
        }
    }
}
