//! The email workflow engine.
//!
//! One call to [`EmailFlow::run`] takes one email from classification to
//! exactly one sink action. Collaborator failures never escape a run: each
//! stage maps them to its own fallback.

use std::sync::Arc;

use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::state::FlowState;
use crate::collaborators::{
    AssigneeRouter, AvailabilityChecker, Classifier, DepartmentMatcher, DepartmentRegistry,
    Drafter, Validator,
};
use crate::config::FlowConfig;
use crate::error::{CollaboratorError, SinkError};
use crate::pipeline::types::{
    AnalysisResult, Category, EmailInput, FinalAssignee, RoutingStatus,
};
use crate::sink::{Sink, TaskRequest};

/// Collaborators shared by every run.
#[derive(Clone)]
pub struct FlowDeps {
    pub classifier: Arc<dyn Classifier>,
    pub matcher: Arc<dyn DepartmentMatcher>,
    pub router: Arc<dyn AssigneeRouter>,
    pub availability: Arc<dyn AvailabilityChecker>,
    pub registry: Arc<DepartmentRegistry>,
    pub drafter: Arc<dyn Drafter>,
    pub validator: Arc<dyn Validator>,
    pub sink: Arc<dyn Sink>,
}

/// The terminal action a run ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    TaskCreated,
    AutoReplied,
    SpamReported,
}

/// What a run did. Returned for callers and tests; never persisted.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub message_id: String,
    pub category: Category,
    pub action: RunAction,
    /// Whether the sink accepted the action.
    pub delivered: bool,
    pub final_assignee: Option<FinalAssignee>,
    pub draft: Option<String>,
    /// Log snapshot taken before the sink call.
    pub logs: String,
    pub retrievals: u32,
    pub excluded: Vec<String>,
}

pub struct EmailFlow {
    pub(super) deps: FlowDeps,
    pub(super) config: FlowConfig,
}

impl EmailFlow {
    pub fn new(deps: FlowDeps, config: FlowConfig) -> Self {
        Self { deps, config }
    }

    /// Process one email end to end.
    pub async fn run(&self, email: EmailInput) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("email_run", run_id = %run_id, message_id = %email.message_id);
        self.run_inner(FlowState::new(run_id, email))
            .instrument(span)
            .await
    }

    async fn run_inner(&self, mut state: FlowState) -> RunOutcome {
        state.log.info(format!(
            "Flow started for '{}' from {}",
            state.email.subject, state.email.sender
        ));

        let analysis = self.classify(&mut state).await;

        match analysis.category {
            Category::Task => self.handle_task(state).await,
            Category::SimpleInquiry => self.handle_simple(state).await,
            Category::Other => self.finish_spam(state).await,
        }
    }

    async fn classify(&self, state: &mut FlowState) -> AnalysisResult {
        state.log.info("Step 1: classification");
        let result = self
            .call("classifier", self.deps.classifier.classify(&state.email))
            .await;

        let analysis = match result {
            Ok(analysis) => analysis,
            Err(e) => {
                state.log.error(format!("Classification failed: {e}"));
                AnalysisResult::fallback(format!("classification failed: {e}"))
            }
        };
        state.log.info(format!(
            "Category: {} ({})",
            analysis.category, analysis.summary
        ));
        state.analysis = Some(analysis.clone());
        analysis
    }

    async fn handle_task(&self, mut state: FlowState) -> RunOutcome {
        let decision = self.select_department(&mut state).await;
        if decision.is_spam {
            state.log.info("Department matcher flagged the email as spam");
            return self.finish_spam(state).await;
        }

        self.assign_staff(&mut state).await;
        let draft = self.gather_and_draft(&mut state).await;
        self.finish_task(state, draft).await
    }

    async fn handle_simple(&self, mut state: FlowState) -> RunOutcome {
        state.log.info("Handling simple inquiry");
        let result = self.draft_and_validate(&mut state).await;

        match result.draft {
            Some(content) if result.validated => self.finish_reply(state, content).await,
            draft => {
                state.log.warn(
                    "No validated reply for the simple inquiry; handing it to the default manager",
                );
                state.final_assignee = Some(FinalAssignee::new(
                    &self.config.default_manager,
                    RoutingStatus::Success,
                    "Simple inquiry fallback: no validated draft",
                ));
                self.finish_task(state, draft).await
            }
        }
    }

    /// Await a collaborator call under the per-call timeout.
    pub(super) async fn call<T>(
        &self,
        collaborator: &'static str,
        fut: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout {
                collaborator,
                timeout: self.config.call_timeout,
            }),
        }
    }

    // ── Sink dispatch ───────────────────────────────────────────────

    async fn finish_spam(&self, mut state: FlowState) -> RunOutcome {
        state.log.info("Reporting spam");
        let logs = state.log.detach();
        let result = self.deps.sink.report_spam(&state.email.message_id).await;
        let delivered = record_delivery(&mut state, "spam webhook", result);
        outcome(state, RunAction::SpamReported, delivered, None, logs)
    }

    async fn finish_reply(&self, mut state: FlowState, content: String) -> RunOutcome {
        state.log.info("Sending validated auto-reply");
        let logs = state.log.detach();
        let result = self
            .deps
            .sink
            .send_reply(&state.email.message_id, &content)
            .await;
        let delivered = record_delivery(&mut state, "auto-reply webhook", result);
        outcome(state, RunAction::AutoReplied, delivered, Some(content), logs)
    }

    async fn finish_task(&self, mut state: FlowState, draft: Option<String>) -> RunOutcome {
        let manager = &self.config.default_manager;
        let assignee = state
            .final_assignee
            .get_or_insert_with(|| {
                FinalAssignee::new(manager, RoutingStatus::Success, "Fallback: no assignee recorded")
            })
            .clone();

        state.log.info(format!(
            "Creating task for {} <{}>{}",
            assignee.name,
            assignee.email,
            if draft.is_some() { "" } else { " without a draft" }
        ));
        let logs = state.log.detach();

        let task = TaskRequest {
            message_id: state.email.message_id.clone(),
            original_sender: state.email.sender.clone(),
            original_subject: state.email.subject.clone(),
            original_body: state.email.body.clone(),
            ai_drafted_reply: draft.clone(),
            final_assignee_name: assignee.name,
            final_assignee_email: assignee.email,
            execution_logs: logs.clone(),
        };
        let result = self.deps.sink.create_task(&task).await;
        let delivered = record_delivery(&mut state, "task board", result);
        outcome(state, RunAction::TaskCreated, delivered, draft, logs)
    }
}

fn record_delivery(state: &mut FlowState, endpoint: &str, result: Result<(), SinkError>) -> bool {
    match result {
        Ok(()) => {
            state.log.info(format!("Delivered to {endpoint}; flow finished"));
            true
        }
        Err(SinkError::NotConfigured { .. }) => {
            state
                .log
                .warn(format!("{endpoint} is not configured; action not delivered"));
            false
        }
        Err(e) => {
            state.log.error(format!("Delivery to {endpoint} failed: {e}"));
            false
        }
    }
}

fn outcome(
    state: FlowState,
    action: RunAction,
    delivered: bool,
    draft: Option<String>,
    logs: String,
) -> RunOutcome {
    let excluded = state.excluded().to_vec();
    RunOutcome {
        run_id: state.run_id,
        message_id: state.email.message_id,
        category: state
            .analysis
            .map(|a| a.category)
            .unwrap_or(Category::Other),
        action,
        delivered,
        final_assignee: state.final_assignee,
        draft,
        logs,
        retrievals: state.retrievals,
        excluded,
    }
}
