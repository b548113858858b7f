use crate::app::{AppError, ProjectService};
use crate::config::{self, default_global_config_path, load_settings_from, ConfigError, Settings};
use crate::report::HttpOutputFileFetcher;
use crate::shared::ids::ProjectId;
use crate::store::WorkflowStateStore;
use crate::task_service::HttpTaskService;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;

pub type CliProjectService = ProjectService<HttpTaskService, HttpOutputFileFetcher>;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn map_app_err(err: AppError) -> String {
    err.to_string()
}

pub fn load_settings() -> Result<Settings, String> {
    config::load_settings().map_err(map_config_err)
}

/// Settings when a config file exists; `None` when there is none to load.
pub fn load_optional_settings() -> Result<Option<Settings>, String> {
    let path = default_global_config_path().map_err(map_config_err)?;
    if !path.exists() {
        return Ok(None);
    }
    load_settings_from(&path).map(Some).map_err(map_config_err)
}

pub fn open_project_service(settings: &Settings) -> Result<CliProjectService, String> {
    let state_root = settings.resolve_state_root().map_err(map_config_err)?;
    let db_path = settings.database_path().map_err(map_config_err)?;
    let store = WorkflowStateStore::open(&db_path).map_err(|e| e.to_string())?;
    let tasks = HttpTaskService::from_settings(settings).map_err(map_config_err)?;
    let fetcher = HttpOutputFileFetcher::from_settings(&settings.output_files);
    Ok(ProjectService::new(store, tasks, fetcher, &state_root)
        .with_prompt_defaults(settings.prompts.as_extras()))
}

pub fn parse_project_id(raw: &str) -> Result<ProjectId, String> {
    ProjectId::parse(raw)
}

pub fn read_json_file(path: &str) -> Result<Value, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid json in {path}: {e}"))
}

pub fn read_yaml_file<T: DeserializeOwned>(path: &str) -> Result<T, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))?;
    serde_yaml::from_str(&raw).map_err(|e| format!("invalid yaml in {path}: {e}"))
}

pub fn default_approver() -> String {
    std::env::var("USER")
        .ok()
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| "operator".to_string())
}
