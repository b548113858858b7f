use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn workflow_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/phaseflow.log")
}

/// Appends one JSON line to the workflow log. Logging never fails the
/// caller; write errors are dropped.
pub fn append_workflow_log(state_root: &Path, level: &str, event: &str, message: &str) {
    append_workflow_log_with(state_root, level, event, message, serde_json::Map::new());
}

pub fn append_workflow_log_with(
    state_root: &Path,
    level: &str,
    event: &str,
    message: &str,
    fields: serde_json::Map<String, serde_json::Value>,
) {
    let mut payload = serde_json::Map::from_iter([
        (
            "timestamp".to_string(),
            serde_json::Value::from(super::time::now_secs()),
        ),
        ("level".to_string(), serde_json::Value::from(level)),
        ("event".to_string(), serde_json::Value::from(event)),
        ("message".to_string(), serde_json::Value::from(message)),
    ]);
    for (key, value) in fields {
        payload.entry(key).or_insert(value);
    }

    let Ok(line) = serde_json::to_string(&payload) else {
        return;
    };

    let path = workflow_log_path(state_root);
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = writeln!(file, "{line}");
}

/// Hex sha256 of the payload's compact json form. Logged instead of the
/// payload itself.
pub fn payload_digest(payload: &serde_json::Value) -> String {
    let encoded = serde_json::to_vec(payload).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
