use std::env;
use std::path::PathBuf;

const STATE_DIR_ENV: &str = "KUBEDECK_STATE_DIR";
const SESSION_FILE: &str = "state.json";

/// Directory for kubedeck's own files: `KUBEDECK_STATE_DIR`, else
/// `~/.kubedeck`.
pub fn state_dir() -> PathBuf {
    match env::var_os(STATE_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => home::home_dir().unwrap_or_default().join(".kubedeck"),
    }
}

pub fn session_state_path_in(dir: &std::path::Path) -> PathBuf {
    dir.join(SESSION_FILE)
}

pub fn session_state_path() -> PathBuf {
    session_state_path_in(&state_dir())
}
