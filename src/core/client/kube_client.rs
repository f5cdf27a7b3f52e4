use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::debug;

use crate::core::kubeconfig::raw_config::{ConnectionParams, RawConfig};

/// Connect timeout of every transport, also the bound of one-shot checks.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Untyped access to arbitrary resources through a shared client.
#[derive(Clone)]
pub struct DynamicClient {
    client: Client,
}

impl DynamicClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// An `Api` for `resource`, scoped to `namespace` or cluster-wide.
    pub fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

/// Builds the transport configuration and the two client handles of a
/// connection bundle. Client construction runs on spawned tasks, so the
/// factory is shared across them.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn transport(&self, raw: &RawConfig, params: &ConnectionParams) -> Result<Config>;

    fn typed_client(&self, config: Config) -> Result<Client>;

    fn dynamic_client(&self, config: Config) -> Result<DynamicClient>;
}

/// Builds clients from the kubeconfig document with the kube client library.
#[derive(Debug, Default, Clone, Copy)]
pub struct KubeClientFactory;

#[async_trait]
impl ClientFactory for KubeClientFactory {
    async fn transport(&self, raw: &RawConfig, params: &ConnectionParams) -> Result<Config> {
        let kubeconfig = Kubeconfig::from_yaml(raw.yaml())
            .with_context(|| format!("Failed to parse kubeconfig {}", raw.source().display()))?;

        let mut config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(params.profile.clone()),
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("Failed to load kubeconfig for context '{}'", params.profile))?;

        // The library read timeout stays; a shorter one would cut watch requests.
        config.connect_timeout = Some(REQUEST_TIMEOUT);

        debug!(context = %params.profile, url = %config.cluster_url, "transport configured");
        Ok(config)
    }

    fn typed_client(&self, config: Config) -> Result<Client> {
        Client::try_from(config).context("Failed to create typed client")
    }

    fn dynamic_client(&self, config: Config) -> Result<DynamicClient> {
        let client = Client::try_from(config).context("Failed to create dynamic client")?;
        Ok(DynamicClient::new(client))
    }
}
