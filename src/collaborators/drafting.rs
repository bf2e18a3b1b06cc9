//! Reply drafting and draft validation adapters.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{Drafter, Validator};
use crate::error::CollaboratorError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, parse_json};
use crate::pipeline::types::{DraftOutput, DraftRequest, Validation};

const DRAFT_MAX_TOKENS: u32 = 1024;
const DRAFT_TEMPERATURE: f32 = 0.3;
const VALIDATE_MAX_TOKENS: u32 = 512;
const VALIDATE_TEMPERATURE: f32 = 0.0;

/// LLM drafter. Answers only from the supplied context and asks for more
/// information when the context is insufficient.
pub struct LlmDrafter {
    llm: Arc<dyn LlmProvider>,
}

impl LlmDrafter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Drafter for LlmDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<DraftOutput, CollaboratorError> {
        let completion = CompletionRequest::new(vec![
            ChatMessage::system(build_draft_system_prompt(&request.persona)),
            ChatMessage::user(build_draft_user_prompt(request)),
        ])
        .with_temperature(DRAFT_TEMPERATURE)
        .with_max_tokens(DRAFT_MAX_TOKENS);

        let response = self.llm.complete(completion).await?;
        parse_draft(&response.content).map_err(|reason| {
            warn!(error = %reason, "Failed to parse draft response");
            CollaboratorError::Malformed {
                collaborator: "drafter",
                reason,
            }
        })
    }
}

fn build_draft_system_prompt(persona: &str) -> String {
    format!(
        "{persona}\n\n\
         Write a reply to the email using ONLY the reference context. \
         If the context does not contain what the reply needs, do not guess: \
         ask for the missing information instead.\n\n\
         Respond with ONLY a JSON object, either\n\
         {{\"status\": \"COMPLETED\", \"draft_content\": \"...\"}}\n\
         or\n\
         {{\"status\": \"NEEDS_INFO\", \"missing_info_query\": \"...\", \"target_dept_hint\": \"...\"}}"
    )
}

fn build_draft_user_prompt(request: &DraftRequest) -> String {
    let mut prompt = String::with_capacity(request.context.len() + request.body.len() + 256);
    prompt.push_str(&format!("[Reference context]\n{}\n\n", request.context));
    if let Some(summary) = &request.summary {
        prompt.push_str(&format!("[Summary]\n{summary}\n\n"));
    }
    prompt.push_str(&format!("[Email]\n{}", request.body));
    if let Some(critique) = &request.critique {
        prompt.push_str(&format!(
            "\n\n[Reviewer feedback on the previous draft]\n{critique}\nFix these issues."
        ));
    }
    prompt
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    status: String,
    #[serde(default)]
    draft_content: Option<String>,
    #[serde(default)]
    missing_info_query: Option<String>,
    #[serde(default)]
    target_dept_hint: Option<String>,
}

fn parse_draft(raw: &str) -> Result<DraftOutput, String> {
    let response: DraftResponse = parse_json(raw).map_err(|e| format!("JSON parse error: {e}"))?;

    match response.status.trim().to_ascii_uppercase().as_str() {
        "COMPLETED" => {
            let content = response.draft_content.unwrap_or_default();
            if content.trim().is_empty() {
                return Err("COMPLETED draft without content".into());
            }
            Ok(DraftOutput::Completed { content })
        }
        "NEEDS_INFO" => {
            let query = response.missing_info_query.unwrap_or_default();
            if query.trim().is_empty() {
                return Err("NEEDS_INFO without a follow-up query".into());
            }
            Ok(DraftOutput::NeedsInfo {
                query,
                dept_hint: response.target_dept_hint.unwrap_or_default(),
            })
        }
        other => Err(format!("unknown draft status: '{other}'")),
    }
}

/// LLM validator scoring factuality, relevance and tone.
pub struct LlmValidator {
    llm: Arc<dyn LlmProvider>,
}

impl LlmValidator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Validator for LlmValidator {
    async fn validate(&self, draft: &str, body: &str) -> Result<Validation, CollaboratorError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You review reply drafts written by a university office.\n\
                 Score factuality, relevance to the original email and politeness of tone, \
                 each between 0.0 and 1.0, and decide whether the draft can be sent.\n\n\
                 Respond with ONLY a JSON object:\n\
                 {\"passed\": true, \"factuality_score\": 0.0, \"relevance_score\": 0.0, \
                 \"tone_score\": 0.0, \"critique\": \"...\"}",
            ),
            ChatMessage::user(format!("[Original email]\n{body}\n\n[Draft]\n{draft}")),
        ])
        .with_temperature(VALIDATE_TEMPERATURE)
        .with_max_tokens(VALIDATE_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        parse_json::<Validation>(&response.content)
            .map(Validation::normalized)
            .map_err(|e| CollaboratorError::Malformed {
                collaborator: "validator",
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    /// Records the last request so prompt assembly can be checked.
    struct RecordingLlm {
        response: &'static str,
        last_user: Mutex<String>,
    }

    impl RecordingLlm {
        fn new(response: &'static str) -> Arc<Self> {
            Arc::new(Self {
                response,
                last_user: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.last_user.lock().unwrap() = request.user_prompt();
            Ok(CompletionResponse {
                content: self.response.to_string(),
            })
        }
    }

    #[test]
    fn parse_completed_draft() {
        let out = parse_draft(r#"{"status": "COMPLETED", "draft_content": "Dear student, ..."}"#)
            .unwrap();
        assert_eq!(
            out,
            DraftOutput::Completed {
                content: "Dear student, ...".into()
            }
        );
    }

    #[test]
    fn parse_needs_info() {
        let out = parse_draft(
            r#"{"status": "needs_info", "missing_info_query": "refund deadline", "target_dept_hint": "finance"}"#,
        )
        .unwrap();
        assert_eq!(
            out,
            DraftOutput::NeedsInfo {
                query: "refund deadline".into(),
                dept_hint: "finance".into()
            }
        );
    }

    #[test]
    fn parse_rejects_empty_completed_and_unknown_status() {
        assert!(parse_draft(r#"{"status": "COMPLETED", "draft_content": ""}"#).is_err());
        assert!(parse_draft(r#"{"status": "NEEDS_INFO"}"#).is_err());
        assert!(parse_draft(r#"{"status": "MAYBE"}"#).is_err());
    }

    #[tokio::test]
    async fn critique_reaches_the_prompt() {
        let llm = RecordingLlm::new(r#"{"status": "COMPLETED", "draft_content": "ok"}"#);
        let drafter = LlmDrafter::new(llm.clone());
        let request = DraftRequest {
            persona: "You are the front desk.".into(),
            context: "Office hours are 9-5.".into(),
            body: "When are you open?".into(),
            summary: Some("office hours".into()),
            critique: Some("Too curt".into()),
        };

        drafter.draft(&request).await.unwrap();
        let prompt = llm.last_user.lock().unwrap().clone();
        assert!(prompt.contains("Office hours are 9-5."));
        assert!(prompt.contains("[Summary]\noffice hours"));
        assert!(prompt.contains("Too curt"));
    }

    #[tokio::test]
    async fn validator_clamps_scores() {
        let llm = RecordingLlm::new(
            r#"{"passed": true, "factuality_score": 3, "relevance_score": 0.9, "tone_score": 0.8}"#,
        );
        let v = LlmValidator::new(llm).validate("draft", "body").await.unwrap();
        assert!(v.passed);
        assert_eq!(v.factuality_score, 1.0);
    }

    #[tokio::test]
    async fn validator_garbage_is_malformed() {
        let llm = RecordingLlm::new("looks fine to me");
        let err = LlmValidator::new(llm).validate("draft", "body").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Malformed { .. }));
    }
}
