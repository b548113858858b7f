use super::{TaskHandle, TaskService, TaskServiceError, TaskStatus};
use crate::config::{ConfigError, Settings};
use crate::shared::ids::TaskId;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

const API_KEY_HEADER: &str = "API_KEY";

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    task_id: String,
    #[serde(default)]
    task_title: Option<String>,
    #[serde(default)]
    task_url: Option<String>,
}

/// Blocking client for the AI task service's `/v1/tasks` endpoints.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    api_base: String,
    api_key: String,
    agent_profile: Option<String>,
    task_mode: Option<String>,
    agent: ureq::Agent,
}

impl HttpTaskService {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            agent_profile: None,
            task_mode: None,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let task_service = &settings.task_service;
        let api_key = settings.api_key()?;
        let mut client = Self::new(
            &task_service.api_base,
            &api_key,
            Duration::from_secs(task_service.request_timeout_seconds),
        );
        client.agent_profile = non_blank(task_service.agent_profile.as_deref());
        client.task_mode = non_blank(task_service.task_mode.as_deref());
        Ok(client)
    }

    pub fn with_agent_profile(mut self, agent_profile: &str) -> Self {
        self.agent_profile = non_blank(Some(agent_profile));
        self
    }

    pub fn with_task_mode(mut self, task_mode: &str) -> Self {
        self.task_mode = non_blank(Some(task_mode));
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn submit(&self, prompt: &str, task_id: Option<&TaskId>) -> Result<TaskHandle, TaskServiceError> {
        let url = self.endpoint("v1/tasks");
        let mut body = Map::from_iter([("prompt".to_string(), Value::from(prompt))]);
        if let Some(profile) = &self.agent_profile {
            body.insert("agentProfile".to_string(), Value::from(profile.as_str()));
        }
        if let Some(mode) = &self.task_mode {
            body.insert("taskMode".to_string(), Value::from(mode.as_str()));
        }
        if let Some(task_id) = task_id {
            body.insert("taskId".to_string(), Value::from(task_id.as_str()));
        }

        let response = self
            .agent
            .post(&url)
            .set(API_KEY_HEADER, &self.api_key)
            .send_json(Value::Object(body))
            .map_err(|err| map_ureq_error(&url, err))?;
        let created: CreateTaskResponse =
            response
                .into_json()
                .map_err(|err| TaskServiceError::Decode {
                    url: url.clone(),
                    reason: err.to_string(),
                })?;

        let task_id = TaskId::parse(&created.task_id).map_err(TaskServiceError::InvalidTaskId)?;
        Ok(TaskHandle {
            task_id,
            task_title: created.task_title,
            task_url: created.task_url,
        })
    }
}

impl TaskService for HttpTaskService {
    fn create_task(&self, prompt: &str) -> Result<TaskHandle, TaskServiceError> {
        self.submit(prompt, None)
    }

    fn continue_task(
        &self,
        task_id: &TaskId,
        prompt: &str,
    ) -> Result<TaskHandle, TaskServiceError> {
        self.submit(prompt, Some(task_id))
    }

    fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus, TaskServiceError> {
        let url = self.endpoint(&format!(
            "v1/tasks/{}",
            urlencoding::encode(task_id.as_str())
        ));
        let response = self
            .agent
            .get(&url)
            .set(API_KEY_HEADER, &self.api_key)
            .call()
            .map_err(|err| map_ureq_error(&url, err))?;
        response
            .into_json::<TaskStatus>()
            .map_err(|err| TaskServiceError::Decode {
                url,
                reason: err.to_string(),
            })
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> TaskServiceError {
    match err {
        ureq::Error::Status(status, response) => TaskServiceError::Status {
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => TaskServiceError::Request {
            url: url.to_string(),
            reason: transport.to_string(),
        },
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
