//! Shared types for the email triage pipeline.

use serde::{Deserialize, Serialize};

// ── Inbound email ───────────────────────────────────────────────────

/// One inbound email, as posted to the trigger endpoint.
///
/// Created once per request and never mutated. `message_id` is the key
/// downstream sinks use to de-duplicate actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailInput {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

// ── Classification ──────────────────────────────────────────────────

/// Triage category for an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Needs staff work: routed, researched and put on the task board.
    Task,
    /// Answerable directly with a short front-desk reply.
    SimpleInquiry,
    /// Spam or irrelevant mail.
    Other,
}

impl Category {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Task => "TASK",
            Self::SimpleInquiry => "SIMPLE_INQUIRY",
            Self::Other => "OTHER",
        }
    }

    /// Parse a category label as produced by a classifier.
    ///
    /// Case-insensitive; accepts the older `Directory_Inquiry` label and
    /// `SPAM` as aliases.
    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "TASK" => Some(Self::Task),
            "SIMPLE_INQUIRY" | "DIRECTORY_INQUIRY" => Some(Self::SimpleInquiry),
            "OTHER" | "SPAM" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub category: Category,
    pub summary: String,
    pub reasoning: String,
}

impl AnalysisResult {
    /// The result used when classification fails: the cheapest path.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            category: Category::Other,
            summary: "N/A".to_string(),
            reasoning: reason.into(),
        }
    }
}

// ── Department selection ────────────────────────────────────────────

/// Primary department decision for a TASK email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentDecision {
    pub primary_dept_id: String,
    #[serde(default)]
    pub is_spam: bool,
}

impl DepartmentDecision {
    /// Used when the department matcher fails.
    pub fn fallback() -> Self {
        Self {
            primary_dept_id: "OTHER".to_string(),
            is_spam: false,
        }
    }
}

// ── Routing ─────────────────────────────────────────────────────────

/// A named person who can own a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub name: String,
    pub email: String,
}

/// Outcome flag of a routing attempt or final assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingStatus {
    Success,
    Failed,
}

/// One routing collaborator answer. Only the accepted one survives the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingAttempt {
    pub assignee_name: String,
    pub assignee_email: String,
    pub status: RoutingStatus,
    #[serde(default)]
    pub reasoning: String,
}

impl RoutingAttempt {
    /// Well-formed but carrying no usable candidate.
    pub fn is_empty_candidate(&self) -> bool {
        self.assignee_name.trim().is_empty() || self.assignee_email.trim().is_empty()
    }
}

/// The assignee referenced by the task sink. Exactly one per TASK run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAssignee {
    pub name: String,
    pub email: String,
    pub status: RoutingStatus,
    pub reasoning: String,
}

impl FinalAssignee {
    pub fn new(assignee: &Assignee, status: RoutingStatus, reasoning: impl Into<String>) -> Self {
        Self {
            name: assignee.name.clone(),
            email: assignee.email.clone(),
            status,
            reasoning: reasoning.into(),
        }
    }
}

// ── Availability ────────────────────────────────────────────────────

/// Live availability of a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    Available,
    Vacation,
    Overloaded,
    /// Lookup failed or returned something unparseable.
    Unknown,
}

impl AvailabilityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Vacation => "Vacation",
            Self::Overloaded => "Overloaded",
            Self::Unknown => "Unknown",
        }
    }
}

/// Availability lookup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub status: AvailabilityStatus,
    #[serde(default)]
    pub active_task_count: u32,
    #[serde(default)]
    pub message: String,
}

impl AvailabilityReport {
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: AvailabilityStatus::Unknown,
            active_task_count: 0,
            message: message.into(),
        }
    }
}

// ── Drafting and validation ─────────────────────────────────────────

/// Where the current draft stands within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftStatus {
    Pending,
    Completed,
    NeedsInfo,
}

/// Inputs to one drafting call.
#[derive(Debug, Clone, Default)]
pub struct DraftRequest {
    /// Reply-style persona of the answering department.
    pub persona: String,
    /// Retrieved context (or a canned instruction on the simple path).
    pub context: String,
    /// Original email body.
    pub body: String,
    /// Classifier summary, when available.
    pub summary: Option<String>,
    /// Critique from a failed validation of the previous draft.
    pub critique: Option<String>,
}

/// Drafting collaborator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftOutput {
    Completed {
        content: String,
    },
    NeedsInfo {
        /// Follow-up search query.
        query: String,
        /// Free-text hint naming the department likely to know.
        dept_hint: String,
    },
}

impl DraftOutput {
    pub fn status(&self) -> DraftStatus {
        match self {
            Self::Completed { .. } => DraftStatus::Completed,
            Self::NeedsInfo { .. } => DraftStatus::NeedsInfo,
        }
    }
}

/// Validation collaborator output. `passed` is the only gating signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub passed: bool,
    #[serde(default)]
    pub factuality_score: f32,
    #[serde(default)]
    pub relevance_score: f32,
    #[serde(default)]
    pub tone_score: f32,
    #[serde(default)]
    pub critique: String,
}

impl Validation {
    /// Clamp scores into 0.0–1.0.
    pub fn normalized(mut self) -> Self {
        self.factuality_score = self.factuality_score.clamp(0.0, 1.0);
        self.relevance_score = self.relevance_score.clamp(0.0, 1.0);
        self.tone_score = self.tone_score.clamp(0.0, 1.0);
        self
    }

    /// A failed validation carrying only a critique.
    pub fn failed(critique: impl Into<String>) -> Self {
        Self {
            passed: false,
            factuality_score: 0.0,
            relevance_score: 0.0,
            tone_score: 0.0,
            critique: critique.into(),
        }
    }
}
