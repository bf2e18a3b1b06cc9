//! Error types for triage-desk.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single collaborator call.
///
/// The engine never propagates these; each stage maps them to its own
/// fallback.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} call failed: {reason}")]
    Failed {
        collaborator: &'static str,
        reason: String,
    },

    #[error("{collaborator} returned malformed output: {reason}")]
    Malformed {
        collaborator: &'static str,
        reason: String,
    },

    #[error("{collaborator} timed out after {timeout:?}")]
    Timeout {
        collaborator: &'static str,
        timeout: Duration,
    },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Errors from the terminal task-board / webhook calls.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("No URL configured for {endpoint}")]
    NotConfigured { endpoint: &'static str },

    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed {
        endpoint: &'static str,
        reason: String,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
}
