use anyhow::Result;

use super::session_state_entity::SessionStateEntity;

/// Storage operations for the session state file.
pub trait SessionStateFsAdapterTrait: Send + Sync {
    /// Missing or blank files read as the default state.
    fn read(&self) -> Result<SessionStateEntity>;

    fn write(&self, data: &SessionStateEntity) -> Result<()>;

    fn delete(&self) -> Result<()>;
}
