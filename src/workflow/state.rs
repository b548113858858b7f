use super::phase::{phase_status, DisplayStatus, Phase};
use crate::report::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseApproval {
    pub approved_by: String,
    pub approved_at: i64,
}

/// Per-project workflow record. This is the whole persisted value: it is
/// replaced as a unit on every successful mutation and never partially
/// written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default)]
    pub current_phase: Phase,
    #[serde(default)]
    pub phases_completed: Vec<Phase>,
    #[serde(default)]
    pub phase_data: BTreeMap<Phase, Report>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub approvals: BTreeMap<Phase, PhaseApproval>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, phase: Phase) -> Option<&Report> {
        self.phase_data.get(&phase)
    }

    pub fn has_report(&self, phase: Phase) -> bool {
        self.phase_data.contains_key(&phase)
    }

    pub fn is_phase_completed(&self, phase: Phase) -> bool {
        self.phases_completed.contains(&phase)
    }

    pub fn approval(&self, phase: Phase) -> Option<&PhaseApproval> {
        self.approvals.get(&phase)
    }

    pub fn is_approved(&self, phase: Phase) -> bool {
        self.approvals.contains_key(&phase)
    }

    /// Phase 1 output waits for a human before the workflow may move on.
    pub fn awaiting_review(&self) -> bool {
        self.current_phase == Phase::CompanyReport
            && self.has_report(Phase::CompanyReport)
            && !self.is_approved(Phase::CompanyReport)
    }

    /// Recomputed on every call from the current phase; never stored.
    pub fn derived_status(&self) -> DisplayStatus {
        if self.awaiting_review() {
            return DisplayStatus::Reviewing;
        }
        phase_status(self.current_phase)
    }

    pub(crate) fn commit(&mut self, phase: Phase, report: Report) {
        self.phase_data.insert(phase, report);
        if !self.phases_completed.contains(&phase) {
            self.phases_completed.push(phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn company_report() -> Report {
        Report::from_value(json!({"client_offer_brief": {"title": "Brief"}})).expect("report")
    }

    #[test]
    fn new_state_starts_at_phase_one() {
        let state = WorkflowState::new();
        assert_eq!(state.current_phase, Phase::CompanyReport);
        assert!(state.phases_completed.is_empty());
        assert_eq!(state.derived_status(), DisplayStatus::Generating);
    }

    #[test]
    fn commit_is_idempotent_per_phase() {
        let mut state = WorkflowState::new();
        state.commit(Phase::CompanyReport, company_report());
        state.commit(Phase::CompanyReport, company_report());
        assert_eq!(state.phases_completed, vec![Phase::CompanyReport]);
        assert_eq!(state.derived_status(), DisplayStatus::Reviewing);
    }

    #[test]
    fn persisted_layout_uses_storage_keys() {
        let mut state = WorkflowState::new();
        state.commit(Phase::CompanyReport, company_report());
        let encoded = serde_json::to_value(&state).expect("encode");
        assert_eq!(
            encoded,
            json!({
                "current_phase": "phase_1_company_report",
                "phases_completed": ["phase_1_company_report"],
                "phase_data": {
                    "phase_1_company_report": {"client_offer_brief": {"title": "Brief"}}
                }
            })
        );

        let decoded: WorkflowState = serde_json::from_value(encoded).expect("decode");
        assert_eq!(decoded, state);
    }

    #[test]
    fn empty_object_decodes_to_initial_state() {
        let decoded: WorkflowState = serde_json::from_value(json!({})).expect("decode");
        assert_eq!(decoded, WorkflowState::new());
    }
}
