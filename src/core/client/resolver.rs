use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{debug, info};

use crate::core::client::bundle::ConnectionBundle;
use crate::core::client::kube_client::{ClientFactory, KubeClientFactory, REQUEST_TIMEOUT};
use crate::core::kubeconfig::config_store::{effective_config_path, ConfigStore, DEFAULT_CONFIG_TTL};
use crate::core::util::clock::{Clock, SystemClock};
use crate::core::util::ttl_cache::{cache_key, TtlCache};
use crate::errors::{
    classify_config_failure, classify_connect_failure, error_chain, ClientHandle, ConnectionError,
};

pub const DEFAULT_BUNDLE_TTL: Duration = Duration::from_secs(2);

/// Resolves `(kubeconfig path, profile override)` pairs into shared
/// connection bundles, caching both the parsed kubeconfig and the bundle.
///
/// Two concurrent misses for the same key both build a bundle; the later
/// insert replaces the earlier one and each caller keeps the one it built.
pub struct ClusterResolver {
    configs: ConfigStore,
    bundles: TtlCache<Arc<ConnectionBundle>>,
    factory: Arc<dyn ClientFactory>,
}

impl ClusterResolver {
    pub fn new(
        config_ttl: Duration,
        bundle_ttl: Duration,
        clock: Arc<dyn Clock>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            configs: ConfigStore::new(config_ttl, clock.clone()),
            bundles: TtlCache::new(bundle_ttl, clock),
            factory,
        }
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.configs
    }

    pub async fn resolve(
        &self,
        path: &Path,
        profile_override: &str,
    ) -> Result<Arc<ConnectionBundle>, ConnectionError> {
        let path = effective_config_path(path);
        let key = cache_key(&path.to_string_lossy(), profile_override);
        if let Some(bundle) = self.bundles.get(&key) {
            debug!(key = %key, "connection bundle cache hit");
            return Ok(bundle);
        }

        let raw = self.configs.load(&path)?;
        let profile = raw.resolve_profile_name(profile_override)?;
        let params = raw.connection_params(&profile)?;

        let transport = self
            .factory
            .transport(&raw, &params)
            .await
            .map_err(|e| classify_config_failure(&path, &profile, &format!("{e:#}")))?;

        let typed_task = {
            let factory = self.factory.clone();
            let config = transport.clone();
            tokio::spawn(async move { factory.typed_client(config) })
        };
        let dynamic_task = {
            let factory = self.factory.clone();
            let config = transport.clone();
            tokio::spawn(async move { factory.dynamic_client(config) })
        };
        let (typed, dynamic) = tokio::join!(typed_task, dynamic_task);
        let typed = joined_client(typed, ClientHandle::Typed)?;
        let dynamic = joined_client(dynamic, ClientHandle::Dynamic)?;

        let bundle = Arc::new(ConnectionBundle {
            effective_profile: profile,
            raw_config: raw,
            params,
            typed,
            dynamic,
            transport,
        });
        info!(
            context = %bundle.effective_profile,
            config = %path.display(),
            "connection bundle built"
        );

        self.bundles.insert(key, bundle.clone());
        Ok(bundle)
    }

    /// Drops every cached kubeconfig and bundle.
    pub fn clear_caches(&self) {
        self.configs.clear();
        self.bundles.clear();
    }
}

impl Default for ClusterResolver {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONFIG_TTL,
            DEFAULT_BUNDLE_TTL,
            Arc::new(SystemClock),
            Arc::new(KubeClientFactory),
        )
    }
}

fn joined_client<T>(
    joined: Result<anyhow::Result<T>, JoinError>,
    handle: ClientHandle,
) -> Result<T, ConnectionError> {
    match joined {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => Err(ConnectionError::ClientInit {
            handle,
            source: e.into(),
        }),
        Err(e) => Err(ConnectionError::ClientInit {
            handle,
            source: Box::new(e),
        }),
    }
}

/// Issues one version request to prove the bundle can reach its cluster.
pub async fn test_connection(bundle: &ConnectionBundle) -> Result<(), ConnectionError> {
    match tokio::time::timeout(REQUEST_TIMEOUT, bundle.typed.apiserver_version()).await {
        Err(_) => Err(ConnectionError::TimedOut),
        Ok(Err(e)) => Err(classify_connect_failure(&error_chain(&e))),
        Ok(Ok(info)) => {
            debug!(
                context = %bundle.effective_profile,
                version = %info.git_version,
                "cluster reachable"
            );
            Ok(())
        }
    }
}
