use crate::config::ConfigError;
use crate::store::StoreError;
use crate::task_service::TaskServiceError;
use crate::workflow::{PromptError, WorkflowError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    TaskService(#[from] TaskServiceError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("project `{project_id}` has no task id")]
    MissingTask { project_id: String },
    #[error("no project is bound to task `{task_id}`")]
    UnknownTask { task_id: String },
    #[error("{0}")]
    InvalidInput(String),
}

impl From<PromptError> for AppError {
    fn from(value: PromptError) -> Self {
        Self::Workflow(WorkflowError::Prompt(value))
    }
}
