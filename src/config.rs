//! Configuration types.
//!
//! Everything is read from the environment once at process start and is
//! immutable afterwards.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::pipeline::types::Assignee;

/// Workflow engine bounds and fallbacks.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Assignee used when routing fails or the routed person is unavailable.
    pub default_manager: Assignee,
    /// Routing collaborator calls per run.
    pub max_routing_attempts: u32,
    /// Cross-department retrieval retries after the initial lookup.
    pub max_retrieval_retries: u32,
    /// Draft/validate iterations on the simple inquiry path.
    pub max_draft_attempts: u32,
    /// Upper bound on any single collaborator call.
    pub call_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            default_manager: Assignee {
                name: "General Manager".to_string(),
                email: "manager@university.edu".to_string(),
            },
            max_routing_attempts: 3,
            max_retrieval_retries: 3,
            max_draft_attempts: 2,
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl FlowConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            default_manager: Assignee {
                name: lookup("DEFAULT_MANAGER_NAME").unwrap_or(defaults.default_manager.name),
                email: lookup("DEFAULT_MANAGER_EMAIL").unwrap_or(defaults.default_manager.email),
            },
            max_routing_attempts: parse_min(
                lookup,
                "TRIAGE_MAX_ROUTING_ATTEMPTS",
                defaults.max_routing_attempts,
                1,
            )?,
            max_retrieval_retries: parse_min(
                lookup,
                "TRIAGE_MAX_RETRIEVAL_RETRIES",
                defaults.max_retrieval_retries,
                0,
            )?,
            max_draft_attempts: parse_min(
                lookup,
                "TRIAGE_MAX_DRAFT_ATTEMPTS",
                defaults.max_draft_attempts,
                1,
            )?,
            call_timeout: Duration::from_secs(parse_min(
                lookup,
                "TRIAGE_CALL_TIMEOUT_SECS",
                60u64,
                1,
            )?),
        })
    }
}

/// Outbound endpoints for terminal actions and availability lookups.
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    pub task_board_url: Option<String>,
    pub auto_reply_url: Option<String>,
    pub spam_url: Option<String>,
    pub user_status_url: Option<String>,
    /// Search endpoints for the built-in departments' retrievers.
    pub software_college_search_url: Option<String>,
    pub scholarship_team_search_url: Option<String>,
}

impl EndpointConfig {
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            task_board_url: non_empty(lookup("TASK_BOARD_WEBHOOK_URL")),
            auto_reply_url: non_empty(lookup("AUTO_REPLY_WEBHOOK_URL")),
            spam_url: non_empty(lookup("SPAM_WEBHOOK_URL")),
            user_status_url: non_empty(lookup("USER_STATUS_URL")),
            software_college_search_url: non_empty(lookup("SOFTWARE_COLLEGE_SEARCH_URL")),
            scholarship_team_search_url: non_empty(lookup("SCHOLARSHIP_TEAM_SEARCH_URL")),
        }
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub flow: FlowConfig,
    pub endpoints: EndpointConfig,
    /// Timeout for the shared outbound HTTP client.
    pub http_timeout: Duration,
    pub departments_path: Option<PathBuf>,
    pub staff_path: Option<PathBuf>,
    pub port: u16,
    /// Directory for the daily rolling log file, if any.
    pub log_dir: Option<PathBuf>,
    /// Sender regexes that always reach the classifier model.
    pub always_classify: Vec<String>,
}

impl TriageConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            flow: FlowConfig::from_lookup(lookup)?,
            endpoints: EndpointConfig::from_lookup(lookup),
            http_timeout: Duration::from_secs(parse_min(
                lookup,
                "TRIAGE_HTTP_TIMEOUT_SECS",
                10u64,
                1,
            )?),
            departments_path: non_empty(lookup("TRIAGE_DEPARTMENTS_PATH")).map(PathBuf::from),
            staff_path: non_empty(lookup("TRIAGE_STAFF_PATH")).map(PathBuf::from),
            port: parse_min(lookup, "TRIAGE_PORT", 8000u16, 1)?,
            log_dir: non_empty(lookup("TRIAGE_LOG_DIR")).map(PathBuf::from),
            always_classify: split_list(lookup("TRIAGE_ALWAYS_CLASSIFY")),
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a numeric key, falling back to `default` when unset and rejecting
/// garbage or values below `min`.
fn parse_min<T>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    min: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_empty(lookup(key)) else {
        return Ok(default);
    };
    let value: T = raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })?;
    if value < min {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be at least {min}, got {value}"),
        });
    }
    Ok(value)
}
