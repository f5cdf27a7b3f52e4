use anyhow::Result;
use tracing::debug;

use super::session_state_entity::SessionStateEntity;
use super::session_state_fs_adapter::SessionStateFsAdapter;
use super::session_state_fs_adapter_trait::SessionStateFsAdapterTrait;

/// Repository abstraction for the session state.
pub trait SessionStateRepository: Send + Sync {
    fn fs_adapter(&self) -> &dyn SessionStateFsAdapterTrait;

    fn read(&self) -> Result<SessionStateEntity> {
        self.fs_adapter().read()
    }

    /// Records that the active profile changed from `previous` to `current`.
    fn remember_profile(&self, previous: &str, current: &str) -> Result<SessionStateEntity> {
        let mut state = self.read()?;
        state.mark_switched(previous, current);
        self.fs_adapter().write(&state)?;
        debug!(profile = current, "session state updated");
        Ok(state)
    }

    fn last_profile(&self) -> Result<Option<String>> {
        Ok(self.read()?.last_profile)
    }
}

pub struct SessionStateRepositoryImpl {
    adapter: SessionStateFsAdapter,
}

impl SessionStateRepositoryImpl {
    pub fn new(adapter: SessionStateFsAdapter) -> Self {
        Self { adapter }
    }
}

impl Default for SessionStateRepositoryImpl {
    fn default() -> Self {
        Self::new(SessionStateFsAdapter::new())
    }
}

impl SessionStateRepository for SessionStateRepositoryImpl {
    fn fs_adapter(&self) -> &dyn SessionStateFsAdapterTrait {
        &self.adapter
    }
}
