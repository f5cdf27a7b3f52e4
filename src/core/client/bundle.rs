use std::fmt;
use std::sync::Arc;

use kube::{Client, Config};

use crate::core::client::kube_client::DynamicClient;
use crate::core::kubeconfig::raw_config::{ConnectionParams, RawConfig};

/// Everything needed to talk to one cluster as one profile. Built once per
/// cache miss and shared read-only afterwards.
pub struct ConnectionBundle {
    pub effective_profile: String,
    pub raw_config: Arc<RawConfig>,
    pub params: ConnectionParams,
    pub typed: Client,
    pub dynamic: DynamicClient,
    pub transport: Config,
}

impl ConnectionBundle {
    pub fn namespace(&self) -> &str {
        &self.params.namespace
    }
}

impl fmt::Debug for ConnectionBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBundle")
            .field("effective_profile", &self.effective_profile)
            .field("source", &self.raw_config.source())
            .field("params", &self.params)
            .field("cluster_url", &self.transport.cluster_url.to_string())
            .finish_non_exhaustive()
    }
}
