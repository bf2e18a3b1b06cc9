//! Draft/validate loop for simple inquiries.

use super::engine::EmailFlow;
use super::state::FlowState;
use crate::pipeline::types::{DraftOutput, DraftRequest, DraftStatus, Validation};

const FRONT_DESK_PERSONA: &str = "You are a friendly university administration front desk.";

const FRONT_DESK_CONTEXT: &str = "This is a simple information request. Reply kindly that \
                                  the office will check and get back to the sender soon.";

/// Result of the draft/validate loop.
pub(super) struct DraftLoopResult {
    /// Last draft produced, validated or not.
    pub draft: Option<String>,
    pub validated: bool,
}

impl EmailFlow {
    pub(super) async fn draft_and_validate(&self, state: &mut FlowState) -> DraftLoopResult {
        let max = self.config.max_draft_attempts.max(1);
        let summary = state
            .analysis
            .as_ref()
            .map(|a| format!("[{}] {}", a.category, a.summary));
        let mut critique: Option<String> = None;
        let mut last_draft: Option<String> = None;

        for attempt in 1..=max {
            state
                .log
                .info(format!("Drafting reply (attempt {attempt}/{max})"));
            let request = DraftRequest {
                persona: FRONT_DESK_PERSONA.to_string(),
                context: FRONT_DESK_CONTEXT.to_string(),
                body: state.email.body.clone(),
                summary: summary.clone(),
                critique: critique.clone(),
            };

            let result = self
                .call("drafter", self.deps.drafter.draft(&request))
                .await;
            let content = match result {
                Ok(DraftOutput::Completed { content }) => {
                    state.draft_status = DraftStatus::Completed;
                    content
                }
                Ok(DraftOutput::NeedsInfo { query, .. }) => {
                    state.draft_status = DraftStatus::NeedsInfo;
                    state
                        .log
                        .warn(format!("Drafter asked for more information: {query}"));
                    critique = Some(format!(
                        "Do not ask for more information ({query}); reply from the given context."
                    ));
                    continue;
                }
                Err(e) => {
                    state.log.error(format!("Drafting failed: {e}"));
                    continue;
                }
            };

            let validation = self.validate(state, &content).await;
            last_draft = Some(content);
            if validation.passed {
                return DraftLoopResult {
                    draft: last_draft,
                    validated: true,
                };
            }
            critique = Some(validation.critique);
        }

        DraftLoopResult {
            draft: last_draft,
            validated: false,
        }
    }

    async fn validate(&self, state: &mut FlowState, draft: &str) -> Validation {
        let result = self
            .call(
                "validator",
                self.deps.validator.validate(draft, &state.email.body),
            )
            .await;

        let validation = match result {
            Ok(v) => v,
            Err(e) => {
                state.log.warn(format!("Validation failed to run: {e}"));
                Validation::failed(e.to_string())
            }
        };
        state.log.info(format!(
            "Validation {} (factuality {:.2}, relevance {:.2}, tone {:.2})",
            if validation.passed { "passed" } else { "failed" },
            validation.factuality_score,
            validation.relevance_score,
            validation.tone_score
        ));
        if !validation.passed && !validation.critique.is_empty() {
            state.log.info(format!("Critique: {}", validation.critique));
        }
        validation
    }
}
