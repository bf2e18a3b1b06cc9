//! Collaborator contracts used by the workflow engine, plus their adapters.
//!
//! Each trait is one fixed input/output contract. The engine owns every
//! retry and fallback policy; adapters just make the call and report
//! failure as `CollaboratorError`.

pub mod availability;
pub mod classifier;
pub mod departments;
pub mod drafting;
pub mod retrieval;
pub mod staff;

pub use availability::HttpAvailabilityChecker;
pub use classifier::LlmClassifier;
pub use departments::{Department, DepartmentRegistry, DepartmentSpec, LlmDepartmentMatcher};
pub use drafting::{LlmDrafter, LlmValidator};
pub use retrieval::{HttpRetriever, StaticRetriever};
pub use staff::{LlmAssigneeRouter, StaffDirectory, StaffMember};

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::pipeline::types::{
    AnalysisResult, AvailabilityReport, DepartmentDecision, DraftOutput, DraftRequest, EmailInput,
    RoutingAttempt, Validation,
};

/// Assigns a category and summary to an email.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, email: &EmailInput) -> Result<AnalysisResult, CollaboratorError>;
}

/// Picks the primary department for an email and finds supporting ones.
#[async_trait]
pub trait DepartmentMatcher: Send + Sync {
    async fn primary_department(&self, body: &str)
    -> Result<DepartmentDecision, CollaboratorError>;

    /// Department id able to answer `query`, or `None` if nobody fits.
    async fn supporting_department(
        &self,
        query: &str,
        hint: &str,
    ) -> Result<Option<String>, CollaboratorError>;
}

/// Suggests a staff member for an email.
#[async_trait]
pub trait AssigneeRouter: Send + Sync {
    /// `excluded` holds emails rejected earlier in the same run; they must
    /// not be suggested again. `Ok(None)` means no candidate at all.
    async fn route(
        &self,
        email: &EmailInput,
        summary: &str,
        excluded: &[String],
    ) -> Result<Option<RoutingAttempt>, CollaboratorError>;
}

/// Looks up whether a staff member can take new work.
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    async fn check(&self, assignee_email: &str) -> Result<AvailabilityReport, CollaboratorError>;
}

/// Result of a department knowledge lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieved {
    Found(String),
    NotFound,
}

/// Answers free-text queries for one department.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Retrieved, CollaboratorError>;
}

/// Writes a reply draft, or asks for more information.
#[async_trait]
pub trait Drafter: Send + Sync {
    async fn draft(&self, request: &DraftRequest) -> Result<DraftOutput, CollaboratorError>;
}

/// Grades a reply draft against the original email.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, draft: &str, body: &str) -> Result<Validation, CollaboratorError>;
}
