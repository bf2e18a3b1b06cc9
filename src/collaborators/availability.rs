//! Staff availability lookup against the user status service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::AvailabilityChecker;
use crate::error::CollaboratorError;
use crate::pipeline::types::{AvailabilityReport, AvailabilityStatus};

/// `GET {url}?email=...` returning `{status, active_task_count, message}`.
///
/// Without a URL every lookup reports `Unknown`, which the engine treats as
/// unavailable.
pub struct HttpAvailabilityChecker {
    client: reqwest::Client,
    url: Option<String>,
}

impl HttpAvailabilityChecker {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

#[derive(Debug, Deserialize)]
struct StatusRecord {
    #[serde(default)]
    status: String,
    #[serde(default)]
    active_task_count: u32,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl AvailabilityChecker for HttpAvailabilityChecker {
    async fn check(&self, assignee_email: &str) -> Result<AvailabilityReport, CollaboratorError> {
        let Some(url) = self.url.as_deref() else {
            return Ok(AvailabilityReport::unknown("USER_STATUS_URL not configured"));
        };

        let resp = self
            .client
            .get(url)
            .query(&[("email", assignee_email)])
            .send()
            .await
            .map_err(|e| CollaboratorError::Failed {
                collaborator: "availability",
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(assignee = %assignee_email, status = %status, "Status lookup failed");
            return Err(CollaboratorError::Failed {
                collaborator: "availability",
                reason: format!("HTTP {status}"),
            });
        }

        let raw = resp.text().await.map_err(|e| CollaboratorError::Failed {
            collaborator: "availability",
            reason: e.to_string(),
        })?;
        debug!(assignee = %assignee_email, "Status lookup answered");
        Ok(parse_status(&raw))
    }
}

/// Parse a status payload. An array yields its first record; anything
/// else that is not a recognizable record comes back as `Unknown`.
fn parse_status(raw: &str) -> AvailabilityReport {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => return AvailabilityReport::unknown(format!("unparseable status: {e}")),
    };

    let value = match value {
        serde_json::Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return AvailabilityReport::unknown("empty status list"),
        },
        other => other,
    };

    let record: StatusRecord = match serde_json::from_value(value) {
        Ok(record) => record,
        Err(e) => return AvailabilityReport::unknown(format!("unparseable status: {e}")),
    };

    let status = match record.status.trim().to_ascii_lowercase().as_str() {
        "available" => AvailabilityStatus::Available,
        "vacation" => AvailabilityStatus::Vacation,
        "overloaded" => AvailabilityStatus::Overloaded,
        other => {
            return AvailabilityReport::unknown(format!("unknown status '{other}'"));
        }
    };

    AvailabilityReport {
        status,
        active_task_count: record.active_task_count,
        message: record.message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_record() {
        let report = parse_status(r#"{"status": "Available", "active_task_count": 2}"#);
        assert_eq!(report.status, AvailabilityStatus::Available);
        assert_eq!(report.active_task_count, 2);
    }

    #[test]
    fn unwraps_single_element_array() {
        let report = parse_status(r#"[{"status": "Vacation", "message": "back Monday"}]"#);
        assert_eq!(report.status, AvailabilityStatus::Vacation);
        assert_eq!(report.message, "back Monday");
    }

    #[test]
    fn multi_element_array_uses_first_record() {
        let report = parse_status(r#"[{"status": "Overloaded"}, {"status": "Available"}]"#);
        assert_eq!(report.status, AvailabilityStatus::Overloaded);
    }

    #[test]
    fn empty_array_is_unknown() {
        assert_eq!(parse_status("[]").status, AvailabilityStatus::Unknown);
    }

    #[test]
    fn unrecognized_status_is_unknown() {
        assert_eq!(
            parse_status(r#"{"status": "busy-ish"}"#).status,
            AvailabilityStatus::Unknown
        );
        assert_eq!(parse_status("<html>").status, AvailabilityStatus::Unknown);
    }

    #[tokio::test]
    async fn missing_url_reports_unknown() {
        let checker = HttpAvailabilityChecker::new(reqwest::Client::new(), None);
        let report = checker.check("kim@uni.edu").await.unwrap();
        assert_eq!(report.status, AvailabilityStatus::Unknown);
    }
}
