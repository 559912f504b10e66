//! Core attendance record types for rollcall.
//!
//! This module defines the attendance record as it travels between the
//! remote data service and the engines, along with the date handling that
//! keeps every comparison on a date-only value.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a child on the roster.
pub type ChildId = i64;

/// Surrogate identity of a persisted attendance record.
pub type RecordId = i64;

/// Identifier of the staff member reporting attendance.
pub type StaffId = i64;

/// Identifier of a class (group) on the roster.
pub type ClassId = i64;

/// Canonical wire and display format for attendance dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One child's presence status for one calendar date.
///
/// On the wire the record uses camelCase field names. A `recordId` of `0`,
/// `null` or a missing field all mean "not yet persisted" and decode to
/// `None`; `None` is omitted when the record is serialized as a create body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Identity assigned by the remote store, `None` until persisted.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_record_id"
    )]
    pub record_id: Option<RecordId>,

    /// The child this record belongs to.
    pub child_id: ChildId,

    /// The attendance date, time of day stripped.
    #[serde(with = "wire_date")]
    pub date: NaiveDate,

    /// Whether the child was present.
    pub is_present: bool,

    /// Free-text reason, meaningful only when absent. Always empty when present.
    #[serde(default, deserialize_with = "deserialize_reason")]
    pub absence_reason: String,

    /// Staff member who submitted the record.
    #[serde(default)]
    pub reported_by: StaffId,
}

impl AttendanceRecord {
    /// Create an unpersisted record.
    ///
    /// The absence reason is cleared when the child is present.
    #[must_use]
    pub fn new(
        child_id: ChildId,
        date: NaiveDate,
        is_present: bool,
        absence_reason: impl Into<String>,
        reported_by: StaffId,
    ) -> Self {
        let absence_reason = if is_present {
            String::new()
        } else {
            absence_reason.into()
        };
        Self {
            record_id: None,
            child_id,
            date,
            is_present,
            absence_reason,
            reported_by,
        }
    }

    /// Attach a record identity.
    #[must_use]
    pub fn with_id(mut self, record_id: RecordId) -> Self {
        self.record_id = (record_id != 0).then_some(record_id);
        self
    }

    /// Check if this record has been persisted remotely.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.record_id.is_some()
    }

    /// The absence reason if the child is absent and a reason was given.
    #[must_use]
    pub fn stated_reason(&self) -> Option<&str> {
        let reason = self.absence_reason.trim();
        (!self.is_present && !reason.is_empty()).then_some(reason)
    }
}

/// Parse a wire or user supplied date, dropping any time component.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`
/// timestamps.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok())
}

/// Format a date in the canonical `YYYY-MM-DD` form.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn deserialize_record_id<'de, D>(deserializer: D) -> Result<Option<RecordId>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<RecordId>::deserialize(deserializer)?;
    Ok(id.filter(|id| *id != 0))
}

fn deserialize_reason<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde adapter for the canonical date format.
pub mod wire_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize a date as `YYYY-MM-DD`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&date.format(super::DATE_FORMAT))
    }

    /// Deserialize a date, accepting timestamps and truncating them.
    ///
    /// # Errors
    ///
    /// Fails when the value is not a recognizable date.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_clears_reason_when_present() {
        let record = AttendanceRecord::new(1, date(2024, 3, 1), true, "sick", 9);
        assert!(record.absence_reason.is_empty());
        assert!(record.record_id.is_none());

        let record = AttendanceRecord::new(1, date(2024, 3, 1), false, "sick", 9);
        assert_eq!(record.absence_reason, "sick");
    }

    #[test]
    fn test_with_id_zero_means_unpersisted() {
        let record = AttendanceRecord::new(1, date(2024, 3, 1), true, "", 9).with_id(0);
        assert!(!record.is_persisted());

        let record = record.with_id(15);
        assert_eq!(record.record_id, Some(15));
    }

    #[test]
    fn test_stated_reason() {
        let absent = AttendanceRecord::new(1, date(2024, 3, 1), false, "  flu ", 9);
        assert_eq!(absent.stated_reason(), Some("flu"));

        let blank = AttendanceRecord::new(1, date(2024, 3, 1), false, "   ", 9);
        assert_eq!(blank.stated_reason(), None);

        let present = AttendanceRecord::new(1, date(2024, 3, 1), true, "flu", 9);
        assert_eq!(present.stated_reason(), None);
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("2024-03-01"), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("2024-03-01T00:00:00"), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("2024-03-01T17:45:12.250"), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("2024-03-01T23:30:00+02:00"), Some(date(2024, 3, 1)));
        assert_eq!(parse_date(" 2024-03-01 "), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(date(2024, 1, 5)), "2024-01-05");
    }

    #[test]
    fn test_deserialize_wire_record() {
        let json = r#"{
            "recordId": 12,
            "childId": 3,
            "date": "2024-03-01T00:00:00",
            "isPresent": false,
            "absenceReason": "dentist",
            "reportedBy": 5
        }"#;
        let record: AttendanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.record_id, Some(12));
        assert_eq!(record.date, date(2024, 3, 1));
        assert_eq!(record.absence_reason, "dentist");
    }

    #[test]
    fn test_deserialize_zero_id_and_null_reason() {
        let json = r#"{"recordId":0,"childId":3,"date":"2024-03-01","isPresent":true,"absenceReason":null}"#;
        let record: AttendanceRecord = serde_json::from_str(json).unwrap();
        assert!(record.record_id.is_none());
        assert_eq!(record.absence_reason, "");
        assert_eq!(record.reported_by, 0);
    }

    #[test]
    fn test_deserialize_rejects_bad_date() {
        let json = r#"{"childId":3,"date":"March","isPresent":true}"#;
        assert!(serde_json::from_str::<AttendanceRecord>(json).is_err());
    }

    #[test]
    fn test_serialize_create_body_omits_id() {
        let record = AttendanceRecord::new(3, date(2024, 3, 1), false, "", 5);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("recordId").is_none());
        assert_eq!(json["date"], "2024-03-01");
        assert_eq!(json["absenceReason"], "");
        assert_eq!(json["isPresent"], false);
    }
}
