//! Cross-department retrieval and drafting on the task path.

use super::engine::EmailFlow;
use super::state::FlowState;
use crate::collaborators::Retrieved;
use crate::pipeline::types::{DraftOutput, DraftRequest, DraftStatus};

/// Characters of gathered context quoted in the holding reply.
const APOLOGY_CONTEXT_CHARS: usize = 200;

enum Drafted {
    Completed(String),
    NeedsInfo { query: String, hint: String },
    Failed(String),
}

impl EmailFlow {
    /// Retrieve from the primary department, draft, and fan out to
    /// supporting departments while the drafter needs more information.
    pub(super) async fn gather_and_draft(&self, state: &mut FlowState) -> Option<String> {
        state.target_dept = Some(state.primary_dept().to_string());
        state.search_query = state.email.body.clone();

        loop {
            self.retrieve_info(state).await;

            let (query, hint) = match self.draft_from_context(state).await {
                Drafted::Completed(content) => {
                    self.advisory_validation(state, &content).await;
                    return Some(content);
                }
                Drafted::Failed(reason) => {
                    return Some(format!(
                        "An error occurred while drafting the reply: {reason}"
                    ));
                }
                Drafted::NeedsInfo { query, hint } => (query, hint),
            };

            state.search_query = query;
            if state.retry_count >= self.config.max_retrieval_retries {
                state.log.warn(format!(
                    "Retrieval retries exhausted ({}); sending a holding reply",
                    state.retry_count
                ));
                return Some(apology(state.context()));
            }

            match self.supporting_department(state, &hint).await {
                Some(dept) => {
                    state.target_dept = Some(dept);
                    state.retry_count += 1;
                }
                None => {
                    state
                        .log
                        .warn("No supporting department found; sending a holding reply");
                    return Some(apology(state.context()));
                }
            }
        }
    }

    async fn retrieve_info(&self, state: &mut FlowState) {
        let target = state
            .target_dept
            .clone()
            .unwrap_or_else(|| state.primary_dept().to_string());
        state.retrievals += 1;

        if state.retry_count == 0 {
            state
                .log
                .info(format!("Step 4: initial retrieval from [{target}]"));
        } else {
            state.log.info(format!(
                "Step 4: additional retrieval (attempt {}) from [{target}]",
                state.retry_count
            ));
        }

        let Some(dept) = self.deps.registry.get(&target) else {
            state
                .log
                .warn(format!("Department {target} is not registered"));
            state.append_context(
                "System",
                &format!("department id '{target}' is not registered"),
            );
            return;
        };

        let result = self
            .call("retriever", dept.retriever.retrieve(&state.search_query))
            .await;

        match result {
            Ok(Retrieved::Found(text)) => state.append_context(&target, &text),
            Ok(Retrieved::NotFound) => {
                state
                    .log
                    .info(format!("{target} had nothing relevant"));
                state.append_context(&target, "No relevant information found.");
            }
            Err(e) => {
                state
                    .log
                    .error(format!("Retrieval from {target} failed: {e}"));
                state.append_context("System", &format!("{target} retrieval failed: {e}"));
            }
        }
    }

    async fn draft_from_context(&self, state: &mut FlowState) -> Drafted {
        state.log.info(format!(
            "Step 5: drafting (retry {})",
            state.retry_count
        ));
        let request = DraftRequest {
            persona: self.deps.registry.persona(state.primary_dept()).to_string(),
            context: state.context().to_string(),
            body: state.email.body.clone(),
            summary: Some(state.summary().to_string()),
            critique: None,
        };

        let result = self
            .call("drafter", self.deps.drafter.draft(&request))
            .await;

        match result {
            Ok(output) => {
                state.draft_status = output.status();
                match output {
                    DraftOutput::Completed { content } => Drafted::Completed(content),
                    DraftOutput::NeedsInfo { query, dept_hint } => {
                        state.log.warn(format!("Missing information: {query}"));
                        Drafted::NeedsInfo {
                            query,
                            hint: dept_hint,
                        }
                    }
                }
            }
            Err(e) => {
                state.draft_status = DraftStatus::Pending;
                state.log.error(format!("Drafting failed: {e}"));
                Drafted::Failed(e.to_string())
            }
        }
    }

    /// Registered department able to answer the pending query, if any.
    async fn supporting_department(&self, state: &mut FlowState, hint: &str) -> Option<String> {
        state.log.info("Identifying supporting department");
        let result = self
            .call(
                "department matcher",
                self.deps
                    .matcher
                    .supporting_department(&state.search_query, hint),
            )
            .await;

        match result {
            Ok(Some(dept)) if self.deps.registry.contains(&dept) => {
                state.log.info(format!("Supporting department: {dept}"));
                Some(dept)
            }
            Ok(Some(dept)) => {
                state
                    .log
                    .warn(format!("Supporting department {dept} is not registered"));
                None
            }
            Ok(None) => None,
            Err(e) => {
                state
                    .log
                    .warn(format!("Supporting department lookup failed: {e}"));
                None
            }
        }
    }

    /// Validation on the task path only feeds the log; a human reviews the
    /// draft on the board.
    async fn advisory_validation(&self, state: &mut FlowState, draft: &str) {
        let result = self
            .call(
                "validator",
                self.deps.validator.validate(draft, &state.email.body),
            )
            .await;

        match result {
            Ok(v) => state.log.info(format!(
                "Validation {} (factuality {:.2}, relevance {:.2}, tone {:.2}) {}",
                if v.passed { "passed" } else { "failed" },
                v.factuality_score,
                v.relevance_score,
                v.tone_score,
                v.critique
            )),
            Err(e) => state.log.warn(format!("Validation unavailable: {e}")),
        }
    }
}

/// Holding reply quoting the start of what was gathered so far.
fn apology(context: &str) -> String {
    let prefix: String = context.chars().take(APOLOGY_CONTEXT_CHARS).collect();
    format!(
        "We apologize for the delay. Confirming the details internally is taking longer \
         than expected.\nThe staff member in charge will review your request and get back \
         to you shortly.\n\n(Information confirmed so far: {prefix}...)"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apology_quotes_context_prefix() {
        let context = "x".repeat(500);
        let text = apology(&context);
        assert!(text.contains(&"x".repeat(200)));
        assert!(!text.contains(&"x".repeat(201)));
    }

    #[test]
    fn apology_handles_multibyte_context() {
        let text = apology("휴학 신청은 학기 시작 전까지 가능합니다");
        assert!(text.contains("휴학 신청"));
    }
}
