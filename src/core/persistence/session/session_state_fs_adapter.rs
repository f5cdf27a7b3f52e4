use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::core::persistence::storage_path::session_state_path;

use super::session_state_entity::SessionStateEntity;
use super::session_state_fs_adapter_trait::SessionStateFsAdapterTrait;

/// FS adapter for the session state.
///
/// Stores pretty JSON and replaces the file atomically through a temp file.
pub struct SessionStateFsAdapter {
    path: PathBuf,
}

impl SessionStateFsAdapter {
    pub fn new() -> Self {
        Self::at(session_state_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SessionStateFsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateFsAdapterTrait for SessionStateFsAdapter {
    fn read(&self) -> Result<SessionStateEntity> {
        if !self.path.exists() {
            return Ok(SessionStateEntity::default());
        }

        let raw = fs::read_to_string(&self.path).context("Failed to read session state file")?;
        if raw.trim().is_empty() {
            return Ok(SessionStateEntity::default());
        }
        serde_json::from_str(&raw).context("Failed to parse session state file")
    }

    fn write(&self, data: &SessionStateEntity) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create session state directory")?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let mut f = File::create(&tmp_path).context("Failed to create temp session state file")?;
        let body = serde_json::to_string_pretty(data)?;
        f.write_all(body.as_bytes())?;
        f.flush()?;
        f.sync_all().context("Failed to sync temp session state file")?;
        fs::rename(&tmp_path, &self.path).context("Failed to finalize session state file")?;

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to delete session state file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_blank_files_read_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = SessionStateFsAdapter::at(dir.path().join("state.json"));
        assert_eq!(adapter.read().unwrap(), SessionStateEntity::default());

        fs::write(adapter.path(), "  \n").unwrap();
        assert_eq!(adapter.read().unwrap(), SessionStateEntity::default());
    }

    #[test]
    fn write_then_read_in_a_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = SessionStateFsAdapter::at(dir.path().join("nested").join("state.json"));

        let mut state = SessionStateEntity::default();
        state.mark_switched("prod", "dev");
        adapter.write(&state).unwrap();

        assert_eq!(adapter.read().unwrap(), state);
        assert!(!adapter.path().with_extension("json.tmp").exists());

        let raw = fs::read_to_string(adapter.path()).unwrap();
        assert!(raw.contains("\"lastProfile\": \"prod\""));
    }

    #[test]
    fn corrupt_file_is_an_error_and_delete_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = SessionStateFsAdapter::at(dir.path().join("state.json"));
        fs::write(adapter.path(), "{not json").unwrap();
        assert!(adapter.read().is_err());

        adapter.delete().unwrap();
        adapter.delete().unwrap();
        assert_eq!(adapter.read().unwrap(), SessionStateEntity::default());
    }
}
