pub mod http;
pub mod webhook;

pub use http::HttpTaskService;
pub use webhook::{parse_webhook, WebhookEvent, COMPLETION_STOP_REASONS, TASK_STOPPED_EVENT};

use crate::shared::ids::TaskId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    #[error("task service request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("task service returned status {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("task service response from {url} could not be decoded: {reason}")]
    Decode { url: String, reason: String },
    #[error("task service returned invalid task id: {0}")]
    InvalidTaskId(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task status as reported by the AI task service. The result may sit in
/// any of four fields; see [`select_task_result`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub task_id: String,
    pub status: TaskState,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: TaskId,
    pub task_title: Option<String>,
    pub task_url: Option<String>,
}

/// First of `result`, `output`, `data`, `content` holding something other
/// than null or a blank string.
pub fn select_task_result(status: &TaskStatus) -> Option<&Value> {
    [
        status.result.as_ref(),
        status.output.as_ref(),
        status.data.as_ref(),
        status.content.as_ref(),
    ]
    .into_iter()
    .flatten()
    .find(|value| !is_blank_result(value))
}

pub(crate) fn is_blank_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

pub trait TaskService {
    fn create_task(&self, prompt: &str) -> Result<TaskHandle, TaskServiceError>;
    fn continue_task(&self, task_id: &TaskId, prompt: &str)
        -> Result<TaskHandle, TaskServiceError>;
    fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus, TaskServiceError>;
}

impl<T: TaskService + ?Sized> TaskService for &T {
    fn create_task(&self, prompt: &str) -> Result<TaskHandle, TaskServiceError> {
        (**self).create_task(prompt)
    }

    fn continue_task(
        &self,
        task_id: &TaskId,
        prompt: &str,
    ) -> Result<TaskHandle, TaskServiceError> {
        (**self).continue_task(task_id, prompt)
    }

    fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus, TaskServiceError> {
        (**self).task_status(task_id)
    }
}
