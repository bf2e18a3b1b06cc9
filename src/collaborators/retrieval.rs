//! Department knowledge retrieval adapters.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Retrieved, Retriever};
use crate::error::CollaboratorError;

/// Queries a department search service over HTTP.
///
/// `POST {url}` with `{"query": ...}`; the service answers
/// `{"context": "..."}`, or `{"found": false}` / an empty context when it has
/// nothing relevant.
pub struct HttpRetriever {
    client: reqwest::Client,
    url: String,
    dept_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    context: String,
    #[serde(default = "default_found")]
    found: bool,
}

fn default_found() -> bool {
    true
}

impl HttpRetriever {
    pub fn new(client: reqwest::Client, url: impl Into<String>, dept_id: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            dept_id: dept_id.into(),
        }
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str) -> Result<Retrieved, CollaboratorError> {
        debug!(dept = %self.dept_id, query = %query, "Searching department knowledge");

        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| CollaboratorError::Failed {
                collaborator: "retriever",
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(dept = %self.dept_id, status = %status, "Department search failed");
            return Err(CollaboratorError::Failed {
                collaborator: "retriever",
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: SearchResponse =
            resp.json().await.map_err(|e| CollaboratorError::Malformed {
                collaborator: "retriever",
                reason: e.to_string(),
            })?;

        Ok(into_retrieved(parsed))
    }
}

fn into_retrieved(response: SearchResponse) -> Retrieved {
    if !response.found || response.context.trim().is_empty() {
        Retrieved::NotFound
    } else {
        Retrieved::Found(response.context)
    }
}

/// Returns a fixed answer. Used for departments without a search service.
pub struct StaticRetriever {
    text: Option<String>,
}

impl StaticRetriever {
    pub fn found(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn not_found() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Retrieved, CollaboratorError> {
        Ok(match &self.text {
            Some(text) => Retrieved::Found(text.clone()),
            None => Retrieved::NotFound,
        })
    }
}
