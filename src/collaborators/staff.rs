//! Staff directory (organization chart) and the LLM assignee router.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AssigneeRouter;
use crate::error::{CollaboratorError, ConfigError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, parse_json};
use crate::pipeline::types::{EmailInput, RoutingAttempt, RoutingStatus};

/// One row of the organization chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: String,
    /// Duties this person owns, as free text.
    #[serde(default)]
    pub duties: String,
}

/// The candidate pool the router chooses from.
#[derive(Debug, Clone, Default)]
pub struct StaffDirectory {
    members: Vec<StaffMember>,
}

impl StaffDirectory {
    pub fn new(members: Vec<StaffMember>) -> Self {
        Self { members }
    }

    /// Load a JSON array of staff members. No path means an empty directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        let members: Vec<StaffMember> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        info!(path = %path.display(), count = members.len(), "Loaded staff directory");
        Ok(Self { members })
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains_email(&self, email: &str) -> bool {
        self.members
            .iter()
            .any(|m| m.email.eq_ignore_ascii_case(email.trim()))
    }

    /// Members not on the exclusion list.
    pub fn candidates(&self, excluded: &[String]) -> Vec<&StaffMember> {
        self.members
            .iter()
            .filter(|m| !excluded.iter().any(|e| e.eq_ignore_ascii_case(&m.email)))
            .collect()
    }
}

const ROUTE_MAX_TOKENS: u32 = 512;
const ROUTE_TEMPERATURE: f32 = 0.1;

/// Picks an assignee from the staff directory with an LLM.
pub struct LlmAssigneeRouter {
    llm: Arc<dyn LlmProvider>,
    staff: Arc<StaffDirectory>,
}

impl LlmAssigneeRouter {
    pub fn new(llm: Arc<dyn LlmProvider>, staff: Arc<StaffDirectory>) -> Self {
        Self { llm, staff }
    }
}

#[async_trait]
impl AssigneeRouter for LlmAssigneeRouter {
    async fn route(
        &self,
        email: &EmailInput,
        summary: &str,
        excluded: &[String],
    ) -> Result<Option<RoutingAttempt>, CollaboratorError> {
        let candidates = self.staff.candidates(excluded);
        if !self.staff.is_empty() && candidates.is_empty() {
            warn!(excluded = excluded.len(), "Every staff member has been excluded");
            return Ok(None);
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_route_system_prompt()),
            ChatMessage::user(build_route_user_prompt(email, summary, excluded, &candidates)),
        ])
        .with_temperature(ROUTE_TEMPERATURE)
        .with_max_tokens(ROUTE_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        let attempt = parse_route_response(&response.content)?;

        Ok(attempt.map(|attempt| self.check_known(attempt)))
    }
}

impl LlmAssigneeRouter {
    /// Demote a suggestion that names someone outside the directory.
    fn check_known(&self, attempt: RoutingAttempt) -> RoutingAttempt {
        if attempt.status == RoutingStatus::Success
            && !self.staff.is_empty()
            && !attempt.is_empty_candidate()
            && !self.staff.contains_email(&attempt.assignee_email)
        {
            return RoutingAttempt {
                status: RoutingStatus::Failed,
                reasoning: format!(
                    "{} is not in the staff directory ({})",
                    attempt.assignee_email, attempt.reasoning
                ),
                ..attempt
            };
        }
        attempt
    }
}

fn build_route_system_prompt() -> String {
    "You assign university administration emails to the responsible staff member.\n\
     Choose exactly one person from the staff list whose duties match the email. \
     Never choose anyone on the excluded list.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"assignee_name\": \"...\", \"assignee_email\": \"...\", \"status\": \"Success\", \"reasoning\": \"...\"}\n\
     Use \"status\": \"Failed\" when the best candidate is a poor fit, and \
     {\"assignee_name\": \"\", \"assignee_email\": \"\", \"status\": \"Failed\"} when nobody fits."
        .to_string()
}

fn build_route_user_prompt(
    email: &EmailInput,
    summary: &str,
    excluded: &[String],
    candidates: &[&StaffMember],
) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(&format!("From: {}\nSubject: {}\n", email.sender, email.subject));
    prompt.push_str(&format!("Summary: {summary}\n"));
    if !excluded.is_empty() {
        prompt.push_str(&format!("Excluded: {}\n", excluded.join(", ")));
    }

    if !candidates.is_empty() {
        prompt.push_str("\nStaff:\n");
        for member in candidates {
            prompt.push_str(&format!(
                "- {} <{}> [{}] {}\n",
                member.name, member.email, member.department, member.duties
            ));
        }
    }

    let body_preview: String = email.body.chars().take(1500).collect();
    prompt.push_str(&format!("\nEmail:\n{body_preview}"));
    prompt
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    assignee_name: String,
    #[serde(default)]
    assignee_email: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    reasoning: String,
}

fn parse_route_response(raw: &str) -> Result<Option<RoutingAttempt>, CollaboratorError> {
    let response: RouteResponse = parse_json(raw).map_err(|e| CollaboratorError::Malformed {
        collaborator: "router",
        reason: e.to_string(),
    })?;

    let status = match response.status.trim().to_ascii_lowercase().as_str() {
        "success" => RoutingStatus::Success,
        "failed" | "failure" => RoutingStatus::Failed,
        other => {
            return Err(CollaboratorError::Malformed {
                collaborator: "router",
                reason: format!("unknown routing status '{other}'"),
            });
        }
    };

    if response.assignee_name.trim().is_empty() && response.assignee_email.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(RoutingAttempt {
        assignee_name: response.assignee_name.trim().to_string(),
        assignee_email: response.assignee_email.trim().to_string(),
        status,
        reasoning: response.reasoning,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
            })
        }
    }

    fn directory() -> Arc<StaffDirectory> {
        Arc::new(StaffDirectory::new(vec![
            StaffMember {
                name: "Kim".into(),
                email: "kim@uni.edu".into(),
                department: "SOFTWARE_COLLEGE".into(),
                duties: "leave of absence, graduation".into(),
            },
            StaffMember {
                name: "Lee".into(),
                email: "lee@uni.edu".into(),
                department: "SCHOLARSHIP_TEAM".into(),
                duties: "scholarships".into(),
            },
        ]))
    }

    fn email() -> EmailInput {
        EmailInput {
            message_id: "m-1".into(),
            sender: "student@uni.edu".into(),
            subject: "Leave".into(),
            body: "I want to take a leave of absence.".into(),
        }
    }

    #[test]
    fn candidates_skip_excluded_case_insensitively() {
        let dir = directory();
        let candidates = dir.candidates(&["KIM@uni.edu".to_string()]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Lee");
    }

    #[test]
    fn parse_success() {
        let raw = r#"{"assignee_name": "Kim", "assignee_email": "kim@uni.edu", "status": "Success", "reasoning": "handles leave"}"#;
        let attempt = parse_route_response(raw).unwrap().unwrap();
        assert_eq!(attempt.status, RoutingStatus::Success);
        assert_eq!(attempt.assignee_email, "kim@uni.edu");
    }

    #[test]
    fn parse_empty_candidate_is_none() {
        let raw = r#"{"assignee_name": "", "assignee_email": "", "status": "Failed"}"#;
        assert!(parse_route_response(raw).unwrap().is_none());
    }

    #[test]
    fn parse_unknown_status_is_malformed() {
        let raw = r#"{"assignee_name": "Kim", "assignee_email": "kim@uni.edu", "status": "maybe"}"#;
        assert!(parse_route_response(raw).is_err());
    }

    #[test]
    fn user_prompt_lists_exclusions_and_candidates() {
        let dir = directory();
        let excluded = vec!["kim@uni.edu".to_string()];
        let candidates = dir.candidates(&excluded);
        let prompt = build_route_user_prompt(&email(), "leave request", &excluded, &candidates);
        assert!(prompt.contains("Excluded: kim@uni.edu"));
        assert!(prompt.contains("Lee <lee@uni.edu>"));
        assert!(!prompt.contains("Kim <kim@uni.edu>"));
    }

    #[tokio::test]
    async fn unknown_assignee_is_demoted_to_failed() {
        let router = LlmAssigneeRouter::new(
            Arc::new(FixedLlm(
                r#"{"assignee_name": "Park", "assignee_email": "park@uni.edu", "status": "Success"}"#,
            )),
            directory(),
        );
        let attempt = router.route(&email(), "leave", &[]).await.unwrap().unwrap();
        assert_eq!(attempt.status, RoutingStatus::Failed);
        assert!(attempt.reasoning.contains("not in the staff directory"));
    }

    #[tokio::test]
    async fn fully_excluded_directory_yields_no_candidate() {
        let router = LlmAssigneeRouter::new(Arc::new(FixedLlm("{}")), directory());
        let excluded = vec!["kim@uni.edu".to_string(), "lee@uni.edu".to_string()];
        assert!(router.route(&email(), "leave", &excluded).await.unwrap().is_none());
    }
}
