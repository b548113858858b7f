pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_settings, load_settings_from};
pub use paths::{
    default_global_config_path, default_state_root, CONFIG_PATH_ENV, GLOBAL_SETTINGS_FILE_NAME,
    GLOBAL_STATE_DIR,
};
pub use settings::{OutputFileSettings, PromptSettings, Settings, TaskServiceSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn restore_var(name: &str, old: Option<std::ffi::OsString>) {
        if let Some(value) = old {
            std::env::set_var(name, value);
        } else {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn minimal_settings_fill_defaults() {
        let settings: Settings = serde_yaml::from_str(
            r#"
task_service:
  api_base: https://tasks.example.com
"#,
        )
        .expect("parse settings");
        settings.validate().expect("valid");
        assert_eq!(settings.task_service.api_key_env, "PHASEFLOW_API_KEY");
        assert_eq!(settings.task_service.request_timeout_seconds, 60);
        assert_eq!(settings.output_files.fetch_timeout_seconds, 20);
        assert_eq!(settings.output_files.max_bytes, 5 * 1024 * 1024);
        assert_eq!(settings.icp_count(), 3);
    }

    #[test]
    fn validation_rejects_relative_state_root() {
        let settings: Settings = serde_yaml::from_str(
            r#"
state_root: relative/dir
task_service:
  api_base: https://tasks.example.com
"#,
        )
        .expect("parse settings");
        match settings.validate().expect_err("relative root") {
            ConfigError::Settings(message) => assert!(message.contains("state_root")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_non_http_api_base_and_zero_limits() {
        let settings: Settings = serde_yaml::from_str(
            r#"
task_service:
  api_base: ftp://tasks.example.com
"#,
        )
        .expect("parse settings");
        assert!(settings.validate().is_err());

        let settings: Settings = serde_yaml::from_str(
            r#"
task_service:
  api_base: https://tasks.example.com
output_files:
  max_bytes: 0
"#,
        )
        .expect("parse settings");
        match settings.validate().expect_err("zero cap") {
            ConfigError::Settings(message) => assert!(message.contains("max_bytes")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_fail_parsing() {
        let err = serde_yaml::from_str::<Settings>(
            r#"
task_service:
  api_base: https://tasks.example.com
  retries: 3
"#,
        )
        .expect_err("unknown field");
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn config_path_prefers_env_override() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        let temp = tempdir().expect("temp dir");
        let old_home = std::env::var_os("HOME");
        let old_override = std::env::var_os(CONFIG_PATH_ENV);

        std::env::set_var("HOME", temp.path());
        std::env::remove_var(CONFIG_PATH_ENV);
        assert_eq!(
            default_global_config_path().expect("path"),
            temp.path().join(".phaseflow/config.yaml")
        );

        std::env::set_var(CONFIG_PATH_ENV, "/etc/phaseflow.yaml");
        assert_eq!(
            default_global_config_path().expect("path"),
            PathBuf::from("/etc/phaseflow.yaml")
        );

        restore_var("HOME", old_home);
        restore_var(CONFIG_PATH_ENV, old_override);
    }

    #[test]
    fn load_settings_reads_and_validates_file() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            format!(
                "state_root: {}\ntask_service:\n  api_base: http://127.0.0.1:9\n  agent_profile: research\n",
                temp.path().display()
            ),
        )
        .expect("write config");

        let settings = load_settings_from(&path).expect("load");
        assert_eq!(settings.resolve_state_root().expect("root"), temp.path());
        assert_eq!(
            settings.database_path().expect("db"),
            temp.path().join("phaseflow.sqlite3")
        );
        assert_eq!(settings.task_service.agent_profile.as_deref(), Some("research"));
    }
}
