use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many previously used profiles are remembered.
pub const MAX_RECENT_PROFILES: usize = 10;

/// Profile history kept across invocations. Never written back into the
/// kubeconfig.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateEntity {
    #[serde(default)]
    pub last_profile: Option<String>,
    #[serde(default)]
    pub recent_profiles: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionStateEntity {
    /// Records a switch from `previous` to `current`. `previous` becomes the
    /// profile `--context -` returns to; `current` moves to the front of the
    /// recent list.
    pub fn mark_switched(&mut self, previous: &str, current: &str) {
        let previous = previous.trim();
        let current = current.trim();
        if current.is_empty() {
            return;
        }

        if !previous.is_empty() && previous != current {
            self.last_profile = Some(previous.to_string());
        }
        self.recent_profiles.retain(|p| p != current);
        self.recent_profiles.insert(0, current.to_string());
        self.recent_profiles.truncate(MAX_RECENT_PROFILES);
        self.updated_at = Some(Utc::now());
    }
}
