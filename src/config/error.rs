#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("settings validation failed: {0}")]
    Settings(String),
    #[error("environment variable `{name}` holding the task service api key is not set")]
    MissingApiKey { name: String },
    #[error("failed to resolve home directory for global config path")]
    HomeDirectoryUnavailable,
}
