//! Email classifier. Rules fast path first, then an LLM call.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::Classifier;
use crate::error::CollaboratorError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, parse_json};
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{AnalysisResult, Category, EmailInput};

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 512;

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// LLM-backed classifier with a pre-LLM spam rules engine.
pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
    rules: RulesEngine,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, rules: RulesEngine) -> Self {
        Self { llm, rules }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, email: &EmailInput) -> Result<AnalysisResult, CollaboratorError> {
        if let Some(result) = self.rules.evaluate(email) {
            debug!(
                message_id = %email.message_id,
                "Rules engine matched, skipping LLM classification"
            );
            return Ok(result);
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classify_system_prompt()),
            ChatMessage::user(build_classify_user_prompt(email)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;

        parse_classification(&response.content).map_err(|reason| {
            warn!(
                raw_response = %response.content,
                error = %reason,
                "Failed to parse classification response"
            );
            CollaboratorError::Malformed {
                collaborator: "classifier",
                reason,
            }
        })
    }
}

fn build_classify_system_prompt() -> String {
    "You triage email sent to a university administrative office. \
     Classify each email into exactly one category.\n\n\
     Categories:\n\
     - \"TASK\": requires staff action or a researched answer (applications, approvals, \
       regulations, graduation, registration, scholarships, complaints).\n\
     - \"SIMPLE_INQUIRY\": a short question answerable with a polite acknowledgement \
       (office hours, contact details, where to find a form).\n\
     - \"OTHER\": spam, advertising, or mail unrelated to the office.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"category\": \"...\", \"summary\": \"...\", \"reasoning\": \"...\"}\n\n\
     Rules:\n\
     - summary is one sentence; use \"N/A\" for OTHER\n\
     - reasoning is one short sentence"
        .to_string()
}

fn build_classify_user_prompt(email: &EmailInput) -> String {
    let body_preview: String = email.body.chars().take(2000).collect();
    format!(
        "From: {}\nSubject: {}\n\nBody:\n{}",
        email.sender, email.subject, body_preview
    )
}

#[derive(Debug, serde::Deserialize)]
struct ClassifyResponse {
    category: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    reasoning: String,
}

fn parse_classification(raw: &str) -> Result<AnalysisResult, String> {
    let response: ClassifyResponse =
        parse_json(raw).map_err(|e| format!("JSON parse error: {e}"))?;

    let category = Category::parse_label(&response.category)
        .ok_or_else(|| format!("unknown category: '{}'", response.category))?;

    Ok(AnalysisResult {
        category,
        summary: if response.summary.is_empty() {
            "N/A".into()
        } else {
            response.summary
        },
        reasoning: response.reasoning,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    struct MockLlm {
        response: String,
        calls: AtomicUsize,
    }

    impl MockLlm {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-classifier"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse {
                content: self.response.clone(),
            })
        }
    }

    fn email(sender: &str, body: &str) -> EmailInput {
        EmailInput {
            message_id: "m-1".into(),
            sender: sender.into(),
            subject: "Question".into(),
            body: body.into(),
        }
    }

    #[test]
    fn parse_task_response() {
        let raw = r#"{"category": "TASK", "summary": "Leave of absence request", "reasoning": "needs approval"}"#;
        let result = parse_classification(raw).unwrap();
        assert_eq!(result.category, Category::Task);
        assert_eq!(result.summary, "Leave of absence request");
    }

    #[test]
    fn parse_legacy_inquiry_label() {
        let raw = r#"{"category": "Directory_Inquiry", "summary": "office hours"}"#;
        let result = parse_classification(raw).unwrap();
        assert_eq!(result.category, Category::SimpleInquiry);
    }

    #[test]
    fn parse_empty_summary_gets_default() {
        let raw = r#"{"category": "OTHER"}"#;
        let result = parse_classification(raw).unwrap();
        assert_eq!(result.summary, "N/A");
    }

    #[test]
    fn parse_unknown_category_fails() {
        let raw = r#"{"category": "URGENT", "summary": "x"}"#;
        assert!(parse_classification(raw).is_err());
    }

    #[test]
    fn parse_markdown_wrapped_response() {
        let raw = "Here you go:\n```json\n{\"category\": \"SIMPLE_INQUIRY\", \"summary\": \"hours\"}\n```";
        let result = parse_classification(raw).unwrap();
        assert_eq!(result.category, Category::SimpleInquiry);
    }

    #[test]
    fn user_prompt_truncates_body() {
        let prompt = build_classify_user_prompt(&email("a@uni.edu", &"x".repeat(5000)));
        assert!(prompt.len() < 2200);
        assert!(prompt.contains("a@uni.edu"));
    }

    #[tokio::test]
    async fn rules_short_circuit_llm() {
        let llm = MockLlm::new(r#"{"category": "TASK", "summary": "x"}"#);
        let classifier = LlmClassifier::new(llm.clone(), RulesEngine::default_rules());

        let result = classifier
            .classify(&email("noreply@ads.com", "Big sale"))
            .await
            .unwrap();
        assert_eq!(result.category, Category::Other);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn llm_classifies_when_rules_pass() {
        let llm = MockLlm::new(r#"{"category": "TASK", "summary": "Graduation audit"}"#);
        let classifier = LlmClassifier::new(llm.clone(), RulesEngine::default_rules());

        let result = classifier
            .classify(&email("student@uni.edu", "Can you check my graduation credits?"))
            .await
            .unwrap();
        assert_eq!(result.category, Category::Task);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn garbage_response_is_malformed_error() {
        let llm = MockLlm::new("I think this is a task.");
        let classifier = LlmClassifier::new(llm, RulesEngine::default_rules());

        let err = classifier
            .classify(&email("student@uni.edu", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Malformed { .. }));
    }
}
