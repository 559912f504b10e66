//! HTTP attendance service.
//!
//! Talks to the remote attendance API over JSON:
//!
//! | Operation | Request |
//! |---|---|
//! | records on a date | `GET attendance?date=YYYY-MM-DD` |
//! | records of a child | `GET attendance?childId=C` |
//! | monthly summary | `GET attendance/summary?year=Y&month=M` |
//! | create | `POST attendance` |
//! | update | `PUT attendance/{id}` |

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use super::AttendanceService;
use crate::analytics::MonthlySummary;
use crate::error::{Error, Result};
use crate::record::{format_date, parse_date, AttendanceRecord, ChildId, RecordId};

/// Longest response body excerpt carried into error messages.
const MAX_ERROR_BODY: usize = 200;

/// Attendance service backed by the remote HTTP API.
#[derive(Debug, Clone)]
pub struct HttpAttendanceService {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl HttpAttendanceService {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token,
        })
    }

    /// The API root this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Read a response body, failing on non-success status.
    async fn success_body(response: Response) -> std::result::Result<Vec<u8>, String> {
        let status = response.status();
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            let text = String::from_utf8_lossy(&body);
            let excerpt: String = text.chars().take(MAX_ERROR_BODY).collect();
            Err(format!("HTTP {status}: {excerpt}"))
        }
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T> {
        serde_json::from_slice(body).map_err(|e| Error::malformed(endpoint, e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        let endpoint = format!("GET {path}");
        trace!(?query, "{}", endpoint);

        let response = self
            .authorize(self.client.get(self.url(path)).query(query))
            .send()
            .await
            .map_err(|e| Error::fetch(what, e.to_string()))?;
        let body = Self::success_body(response)
            .await
            .map_err(|message| Error::fetch(what, message))?;
        Self::decode(&endpoint, &body)
    }

    async fn send_record(
        &self,
        request: RequestBuilder,
        endpoint: &str,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord> {
        let fail = |message: String| Error::submit(record.child_id, record.date, message);

        let response = self
            .authorize(request.json(record))
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let body = Self::success_body(response).await.map_err(fail)?;
        Self::decode(endpoint, &body)
    }
}

#[async_trait]
impl AttendanceService for HttpAttendanceService {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self))]
    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let records: Vec<AttendanceRecord> = self
            .get_json(
                "attendance",
                &[("date", format_date(date))],
                &format!("attendance for {date}"),
            )
            .await?;
        debug!("Fetched {} records", records.len());
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn fetch_by_child(&self, child_id: ChildId) -> Result<Vec<AttendanceRecord>> {
        let records: Vec<AttendanceRecord> = self
            .get_json(
                "attendance",
                &[("childId", child_id.to_string())],
                &format!("attendance for child {child_id}"),
            )
            .await?;
        debug!("Fetched {} records", records.len());
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn monthly_summary(&self, year: i32, month: u32) -> Result<MonthlySummary> {
        let raw: BTreeMap<String, u32> = self
            .get_json(
                "attendance/summary",
                &[("year", year.to_string()), ("month", month.to_string())],
                &format!("attendance summary for {year}-{month:02}"),
            )
            .await?;

        let mut summary = MonthlySummary::new(year, month);
        for (key, count) in raw {
            let date = parse_date(&key).ok_or_else(|| {
                Error::malformed("GET attendance/summary", format!("invalid date key: {key}"))
            })?;
            summary.set(date, count);
        }
        Ok(summary)
    }

    async fn create(&self, record: &AttendanceRecord) -> Result<AttendanceRecord> {
        let mut body = record.clone();
        body.record_id = None;
        debug!(child_id = body.child_id, date = %body.date, "POST attendance");
        self.send_record(self.client.post(self.url("attendance")), "POST attendance", &body)
            .await
    }

    async fn update(
        &self,
        record_id: RecordId,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord> {
        let path = format!("attendance/{record_id}");
        debug!(child_id = record.child_id, date = %record.date, "PUT {}", path);
        self.send_record(self.client.put(self.url(&path)), &format!("PUT {path}"), record)
            .await
    }
}
