use super::phase::Phase;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("prompt for `{phase}` requires the `{missing}` report, which has not been committed")]
    MissingPhaseReport { phase: Phase, missing: Phase },
    #[error("prompt for `{phase}` may not reference later phase `{referenced}`")]
    ForwardReference { phase: Phase, referenced: Phase },
    #[error("prompt for `{phase}` requires {what}")]
    MissingInput { phase: Phase, what: String },
    #[error("failed to render `{phase}` context as json: {reason}")]
    Render { phase: Phase, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow already completed")]
    WorkflowCompleted,
    #[error("phase `{phase}` has no committed report")]
    PhaseNotCommitted { phase: Phase },
    #[error("phase `{phase}` must be approved before the workflow can advance")]
    ApprovalRequired { phase: Phase },
    #[error("phase `{phase}` is not the current phase `{current}`")]
    NotCurrentPhase { phase: Phase, current: Phase },
    #[error(transparent)]
    Prompt(#[from] PromptError),
}
