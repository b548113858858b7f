use super::{default_state_root, ConfigError};
use crate::report::fetch::{DEFAULT_FETCH_TIMEOUT_SECONDS, DEFAULT_MAX_OUTPUT_FILE_BYTES};
use crate::store::DATABASE_FILE_NAME;
use crate::workflow::prompts::{DEFAULT_ANGLE_COUNT, DEFAULT_ICP_COUNT};
use crate::workflow::PhaseExtras;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_KEY_ENV: &str = "PHASEFLOW_API_KEY";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub state_root: Option<PathBuf>,
    pub task_service: TaskServiceSettings,
    #[serde(default)]
    pub output_files: OutputFileSettings,
    #[serde(default)]
    pub prompts: PromptSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskServiceSettings {
    pub api_base: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub agent_profile: Option<String>,
    #[serde(default)]
    pub task_mode: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputFileSettings {
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for OutputFileSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECONDS,
            max_bytes: DEFAULT_MAX_OUTPUT_FILE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptSettings {
    #[serde(default)]
    pub icp_count: Option<u32>,
    #[serde(default)]
    pub icp_criteria: Option<String>,
    #[serde(default)]
    pub angle_count: Option<u32>,
    #[serde(default)]
    pub angle_criteria: Option<String>,
}

impl PromptSettings {
    /// Configured defaults in the shape prompt builders consume.
    pub fn as_extras(&self) -> PhaseExtras {
        PhaseExtras {
            icp_count: self.icp_count,
            icp_criteria: self.icp_criteria.clone(),
            angle_count: self.angle_count,
            angle_criteria: self.angle_criteria.clone(),
            ..PhaseExtras::default()
        }
    }
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_fetch_timeout_seconds() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECONDS
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_OUTPUT_FILE_BYTES
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(root) = &self.state_root {
            if !root.is_absolute() {
                return Err(ConfigError::Settings(
                    "`state_root` must be an absolute path".to_string(),
                ));
            }
        }

        let api_base = self.task_service.api_base.trim();
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            return Err(ConfigError::Settings(format!(
                "`task_service.api_base` must be an http(s) url, got `{api_base}`"
            )));
        }
        if self.task_service.api_key_env.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`task_service.api_key_env` must be non-empty".to_string(),
            ));
        }
        if self.task_service.request_timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "`task_service.request_timeout_seconds` must be greater than 0".to_string(),
            ));
        }
        if self.output_files.fetch_timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "`output_files.fetch_timeout_seconds` must be greater than 0".to_string(),
            ));
        }
        if self.output_files.max_bytes == 0 {
            return Err(ConfigError::Settings(
                "`output_files.max_bytes` must be greater than 0".to_string(),
            ));
        }
        for (field, value) in [
            ("icp_count", self.prompts.icp_count),
            ("angle_count", self.prompts.angle_count),
        ] {
            if value == Some(0) {
                return Err(ConfigError::Settings(format!(
                    "`prompts.{field}` must be greater than 0"
                )));
            }
        }
        Ok(())
    }

    pub fn resolve_state_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.state_root {
            Some(root) => Ok(root.clone()),
            None => default_state_root(),
        }
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.resolve_state_root()?.join(DATABASE_FILE_NAME))
    }

    /// Reads the api key from the environment variable named in settings.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let name = self.task_service.api_key_env.trim();
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                name: name.to_string(),
            })
    }

    pub fn icp_count(&self) -> u32 {
        self.prompts.icp_count.unwrap_or(DEFAULT_ICP_COUNT)
    }

    pub fn angle_count(&self) -> u32 {
        self.prompts.angle_count.unwrap_or(DEFAULT_ANGLE_COUNT)
    }
}
