//! Mutable record threaded through one run.

use uuid::Uuid;

use super::log::RunLog;
use crate::pipeline::types::{
    AnalysisResult, DepartmentDecision, DraftStatus, EmailInput, FinalAssignee,
};

/// Single-writer state of a run. Created at start, dropped after the sink.
#[derive(Debug)]
pub struct FlowState {
    pub run_id: Uuid,
    pub email: EmailInput,
    pub analysis: Option<AnalysisResult>,
    pub routing_decision: Option<DepartmentDecision>,
    pub final_assignee: Option<FinalAssignee>,
    pub log: RunLog,
    /// Retrieved context, append-only.
    context: String,
    /// Cross-department retries taken so far.
    pub retry_count: u32,
    /// Retrieval calls made so far, the initial one included.
    pub retrievals: u32,
    pub target_dept: Option<String>,
    pub search_query: String,
    pub draft_status: DraftStatus,
    /// Emails rejected by routing in this run, without duplicates.
    excluded: Vec<String>,
}

impl FlowState {
    pub fn new(run_id: Uuid, email: EmailInput) -> Self {
        Self {
            run_id,
            email,
            analysis: None,
            routing_decision: None,
            final_assignee: None,
            log: RunLog::new(),
            context: String::new(),
            retry_count: 0,
            retrievals: 0,
            target_dept: None,
            search_query: String::new(),
            draft_status: DraftStatus::Pending,
            excluded: Vec::new(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Append a block tagged with where it came from.
    pub fn append_context(&mut self, source: &str, text: &str) {
        self.context.push_str(&format!("\n[Source: {source}] {text}\n"));
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Add to the exclusion list. Returns false if already present.
    pub fn exclude(&mut self, email: &str) -> bool {
        let email = email.trim();
        if email.is_empty() || self.is_excluded(email) {
            return false;
        }
        self.excluded.push(email.to_string());
        true
    }

    pub fn is_excluded(&self, email: &str) -> bool {
        self.excluded
            .iter()
            .any(|e| e.eq_ignore_ascii_case(email.trim()))
    }

    pub fn summary(&self) -> &str {
        self.analysis
            .as_ref()
            .map(|a| a.summary.as_str())
            .unwrap_or("N/A")
    }

    pub fn primary_dept(&self) -> &str {
        self.routing_decision
            .as_ref()
            .map(|d| d.primary_dept_id.as_str())
            .unwrap_or("OTHER")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> FlowState {
        FlowState::new(
            Uuid::new_v4(),
            EmailInput {
                message_id: "m-1".into(),
                sender: "s@uni.edu".into(),
                subject: "Leave".into(),
                body: "Hi".into(),
            },
        )
    }

    #[test]
    fn exclusion_list_has_no_duplicates() {
        let mut state = state();
        assert!(state.exclude("kim@uni.edu"));
        assert!(!state.exclude("KIM@uni.edu"));
        assert!(!state.exclude("  "));
        assert_eq!(state.excluded(), ["kim@uni.edu".to_string()]);
    }

    #[test]
    fn context_only_grows() {
        let mut state = state();
        state.append_context("SOFTWARE_COLLEGE", "rule 1");
        let first = state.context().len();
        state.append_context("SCHOLARSHIP_TEAM", "rule 2");
        assert!(state.context().len() > first);
        assert!(state.context().contains("[Source: SOFTWARE_COLLEGE] rule 1"));
        assert!(state.context().contains("[Source: SCHOLARSHIP_TEAM] rule 2"));
    }

    #[test]
    fn defaults_before_stages_run() {
        let state = state();
        assert_eq!(state.summary(), "N/A");
        assert_eq!(state.primary_dept(), "OTHER");
        assert_eq!(state.draft_status, DraftStatus::Pending);
    }
}
