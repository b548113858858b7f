use super::error::WorkflowError;
use super::phase::{DisplayStatus, Phase};
use super::prompts::{PhaseExtras, PromptContext};
use super::registry::phase_definition;
use super::state::{PhaseApproval, WorkflowState};
use crate::report::{
    select_best_message, ExtractionNote, OutputFileFetcher, ReportExtractor, ReportKind,
    USER_ROLE,
};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestErrorKind {
    NoReportFound,
    UnexpectedUserEcho,
}

impl IngestErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoReportFound => "no_report_found",
            Self::UnexpectedUserEcho => "unexpected_user_echo",
        }
    }
}

impl std::fmt::Display for IngestErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestResult {
    pub state: WorkflowState,
    pub derived_status: DisplayStatus,
    pub report_kind: Option<ReportKind>,
    pub error: Option<IngestErrorKind>,
    pub notes: Vec<ExtractionNote>,
}

impl IngestResult {
    pub fn committed(&self) -> bool {
        self.error.is_none()
    }
}

/// Normalizes `payload` into a report for the current phase and commits it.
///
/// On any error the returned state equals `state`. Ingest never advances
/// the phase; see [`prepare_advance`].
pub fn ingest<F: OutputFileFetcher>(
    state: &WorkflowState,
    payload: &Value,
    extractor: &ReportExtractor<F>,
) -> IngestResult {
    let candidate = match payload {
        Value::Array(messages) => match select_best_message(messages) {
            Some(message) => message,
            None => payload,
        },
        other => other,
    };

    let extraction = extractor.extract(candidate);
    let rejected = |error: IngestErrorKind, report_kind: Option<ReportKind>, notes| IngestResult {
        state: state.clone(),
        derived_status: state.derived_status(),
        report_kind,
        error: Some(error),
        notes,
    };

    let Some(report) = extraction.report else {
        return rejected(IngestErrorKind::NoReportFound, None, extraction.notes);
    };
    if report.role() == Some(USER_ROLE) {
        return rejected(
            IngestErrorKind::UnexpectedUserEcho,
            Some(report.kind()),
            extraction.notes,
        );
    }

    let report_kind = report.kind();
    let mut next = state.clone();
    next.commit(state.current_phase, report);
    IngestResult {
        derived_status: next.derived_status(),
        state: next,
        report_kind: Some(report_kind),
        error: None,
        notes: extraction.notes,
    }
}

/// Records a human approval of the current `phase`. The first approval is
/// kept.
pub fn approve_phase(
    state: &WorkflowState,
    phase: Phase,
    approver: &str,
    approved_at: i64,
) -> Result<WorkflowState, WorkflowError> {
    if !state.has_report(phase) {
        return Err(WorkflowError::PhaseNotCommitted { phase });
    }
    if phase != state.current_phase {
        return Err(WorkflowError::NotCurrentPhase {
            phase,
            current: state.current_phase,
        });
    }
    let mut next = state.clone();
    next.approvals.entry(phase).or_insert_with(|| PhaseApproval {
        approved_by: approver.to_string(),
        approved_at,
    });
    Ok(next)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub state: WorkflowState,
    pub next_phase: Phase,
    pub prompt: String,
}

/// Moves to the immediate successor of the current phase and renders its
/// prompt from the committed reports.
pub fn prepare_advance(
    state: &WorkflowState,
    extras: &PhaseExtras,
) -> Result<Advance, WorkflowError> {
    let current = state.current_phase;
    let definition = phase_definition(current);
    let Some(next_phase) = definition.next_phase else {
        return Err(WorkflowError::WorkflowCompleted);
    };
    if !state.has_report(current) {
        return Err(WorkflowError::PhaseNotCommitted { phase: current });
    }
    if current == Phase::CompanyReport && !state.is_approved(current) {
        return Err(WorkflowError::ApprovalRequired { phase: current });
    }

    let ctx = PromptContext::new(&state.phase_data, extras);
    let prompt = (phase_definition(next_phase).build_prompt)(&ctx)?;

    let mut next = state.clone();
    next.current_phase = next_phase;
    Ok(Advance {
        state: next,
        next_phase,
        prompt,
    })
}
