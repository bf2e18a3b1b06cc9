//! Department selection, the routing loop and the availability check.

use super::engine::EmailFlow;
use super::state::FlowState;
use crate::pipeline::types::{
    AvailabilityReport, AvailabilityStatus, DepartmentDecision, FinalAssignee, RoutingAttempt,
    RoutingStatus,
};

impl EmailFlow {
    pub(super) async fn select_department(&self, state: &mut FlowState) -> DepartmentDecision {
        state.log.info("Step 2: selecting primary department");
        let result = self
            .call(
                "department matcher",
                self.deps.matcher.primary_department(&state.email.body),
            )
            .await;

        let decision = match result {
            Ok(decision) => decision,
            Err(e) => {
                state
                    .log
                    .error(format!("Department selection failed: {e}"));
                DepartmentDecision::fallback()
            }
        };
        state
            .log
            .info(format!("Primary department: {}", decision.primary_dept_id));
        state.routing_decision = Some(decision.clone());
        decision
    }

    /// Pick the final assignee: route with exclusions, then check availability.
    pub(super) async fn assign_staff(&self, state: &mut FlowState) {
        let max = self.config.max_routing_attempts;
        let dept = state.primary_dept().to_string();
        state
            .log
            .info(format!("Step 3: assigning staff (dept: {dept})"));

        let Some(candidate) = self.route_with_exclusions(state, &dept).await else {
            let manager = &self.config.default_manager;
            state.log.warn(format!(
                "No assignee accepted after {max} routing attempts; falling back to {}",
                manager.name
            ));
            state.final_assignee = Some(FinalAssignee::new(
                manager,
                RoutingStatus::Success,
                format!(
                    "Fallback to default manager: no assignee accepted after {max} routing attempts"
                ),
            ));
            return;
        };

        let report = self.check_availability(state, &candidate).await;
        let final_assignee = if report.status == AvailabilityStatus::Available {
            FinalAssignee {
                name: candidate.assignee_name,
                email: candidate.assignee_email,
                status: RoutingStatus::Success,
                reasoning: candidate.reasoning,
            }
        } else {
            let manager = &self.config.default_manager;
            state.log.warn(format!(
                "{} is unavailable ({}); substituting {}",
                candidate.assignee_name,
                report.status.label(),
                manager.name
            ));
            FinalAssignee::new(
                manager,
                RoutingStatus::Success,
                format!(
                    "{} [Default manager substituted: {} <{}> is {}]",
                    candidate.reasoning,
                    candidate.assignee_name,
                    candidate.assignee_email,
                    report.status.label()
                ),
            )
        };

        state.log.info(format!(
            "Final assignee: {} <{}>",
            final_assignee.name, final_assignee.email
        ));
        state.final_assignee = Some(final_assignee);
    }

    async fn route_with_exclusions(
        &self,
        state: &mut FlowState,
        dept: &str,
    ) -> Option<RoutingAttempt> {
        let max = self.config.max_routing_attempts;
        let summary = format!("[{dept}] {}", state.summary());

        for attempt in 1..=max {
            let excluded = state.excluded().to_vec();
            let result = self
                .call(
                    "router",
                    self.deps.router.route(&state.email, &summary, &excluded),
                )
                .await;

            let candidate = match result {
                Ok(Some(candidate)) => candidate,
                Ok(None) => {
                    state
                        .log
                        .warn(format!("Routing attempt {attempt}/{max}: no candidate"));
                    continue;
                }
                Err(e) => {
                    state
                        .log
                        .warn(format!("Routing attempt {attempt}/{max} failed: {e}"));
                    continue;
                }
            };

            if candidate.is_empty_candidate() {
                state
                    .log
                    .warn(format!("Routing attempt {attempt}/{max}: empty candidate"));
                continue;
            }
            if state.is_excluded(&candidate.assignee_email) {
                state.log.warn(format!(
                    "Routing attempt {attempt}/{max}: {} was already rejected",
                    candidate.assignee_email
                ));
                continue;
            }

            match candidate.status {
                RoutingStatus::Success => {
                    state.log.info(format!(
                        "Routing attempt {attempt}/{max}: accepted {} <{}>",
                        candidate.assignee_name, candidate.assignee_email
                    ));
                    return Some(candidate);
                }
                RoutingStatus::Failed => {
                    state.exclude(&candidate.assignee_email);
                    state.log.warn(format!(
                        "Routing attempt {attempt}/{max}: rejected {} <{}>: {}",
                        candidate.assignee_name, candidate.assignee_email, candidate.reasoning
                    ));
                }
            }
        }
        None
    }

    async fn check_availability(
        &self,
        state: &mut FlowState,
        candidate: &RoutingAttempt,
    ) -> AvailabilityReport {
        let result = self
            .call(
                "availability",
                self.deps.availability.check(&candidate.assignee_email),
            )
            .await;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                state.log.warn(format!("Availability lookup failed: {e}"));
                AvailabilityReport::unknown(e.to_string())
            }
        };
        state.log.info(format!(
            "Availability of {}: {} ({} active tasks)",
            candidate.assignee_email,
            report.status.label(),
            report.active_task_count
        ));
        report
    }
}
