pub mod controller;
pub mod error;
pub mod phase;
pub mod prompts;
pub mod registry;
pub mod state;

pub use controller::{
    approve_phase, ingest, prepare_advance, Advance, IngestErrorKind, IngestResult,
};
pub use error::{PromptError, WorkflowError};
pub use phase::{phase_status, DisplayStatus, Phase};
pub use prompts::{CompanyBrief, PhaseExtras, PromptContext};
pub use registry::{phase_definition, PhaseDefinition, PromptBuilder, PHASE_DEFINITIONS};
pub use state::{PhaseApproval, WorkflowState};
