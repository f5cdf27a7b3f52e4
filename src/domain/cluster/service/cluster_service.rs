use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::core::client::bundle::ConnectionBundle;
use crate::core::client::resolver::{test_connection, ClusterResolver};
use crate::core::kubeconfig::auth_methods::detect_auth_methods;
use crate::core::kubeconfig::config_store::effective_config_path;
use crate::core::persistence::session::session_state_entity::SessionStateEntity;
use crate::core::persistence::session::session_state_repository::SessionStateRepository;
use crate::errors::{ConfigError, ConnectionError};

/// Profile name that means "the profile used before the current one".
pub const PREVIOUS_PROFILE: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    pub name: String,
    pub is_current: bool,
    pub auth_methods: Vec<String>,
}

/// Profile selection and connection on top of the resolver, with the
/// switch history kept in the session state.
pub struct ClusterService {
    resolver: Arc<ClusterResolver>,
    session: Arc<dyn SessionStateRepository>,
}

impl ClusterService {
    pub fn new(resolver: Arc<ClusterResolver>, session: Arc<dyn SessionStateRepository>) -> Self {
        Self { resolver, session }
    }

    pub fn resolver(&self) -> &ClusterResolver {
        &self.resolver
    }

    /// Every profile in the kubeconfig, sorted by name.
    pub fn contexts(&self, path: &Path) -> Result<Vec<ContextSummary>, ConfigError> {
        let raw = self.resolver.config_store().load(&effective_config_path(path))?;
        let current = raw.current_profile();
        Ok(raw
            .profile_names()
            .into_iter()
            .map(|name| ContextSummary {
                is_current: name == current,
                auth_methods: detect_auth_methods(&raw, &name),
                name,
            })
            .collect())
    }

    pub fn auth_methods(&self, path: &Path, profile: &str) -> Result<Vec<String>, ConfigError> {
        let raw = self.resolver.config_store().load(&effective_config_path(path))?;
        Ok(detect_auth_methods(&raw, profile))
    }

    /// Expands `-` into the previously used profile. Anything else is
    /// returned trimmed.
    pub fn expand_profile_request(&self, requested: &str) -> Result<String> {
        let requested = requested.trim();
        if requested != PREVIOUS_PROFILE {
            return Ok(requested.to_string());
        }
        self.session
            .last_profile()?
            .ok_or_else(|| anyhow!("no previous context recorded yet"))
    }

    /// Resolves a bundle and records the profile in the session history.
    /// A failed history write is logged, not returned.
    pub async fn connect(
        &self,
        path: &Path,
        profile_override: &str,
    ) -> Result<Arc<ConnectionBundle>, ConnectionError> {
        let bundle = self.resolver.resolve(path, profile_override).await?;

        let previous = match self.session.read() {
            Ok(state) => state.recent_profiles.first().cloned(),
            Err(e) => {
                warn!(error = %e, "failed to read session state");
                None
            }
        }
        .unwrap_or_else(|| bundle.raw_config.current_profile().to_string());

        if let Err(e) = self.session.remember_profile(&previous, &bundle.effective_profile) {
            warn!(error = %e, "failed to record profile switch");
        }
        Ok(bundle)
    }

    /// Records `name` as the active profile without touching the kubeconfig.
    pub fn remember_profile(&self, name: &str) -> Result<SessionStateEntity> {
        let previous = self.session.read()?.recent_profiles.first().cloned().unwrap_or_default();
        self.session.remember_profile(&previous, name)
    }

    /// Resolves and probes the API server once.
    pub async fn check(
        &self,
        path: &Path,
        profile_override: &str,
    ) -> Result<Arc<ConnectionBundle>, ConnectionError> {
        let bundle = self.connect(path, profile_override).await?;
        test_connection(&bundle).await?;
        info!(context = %bundle.effective_profile, "cluster connection verified");
        Ok(bundle)
    }
}
