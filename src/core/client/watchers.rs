use std::fmt::Debug;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::api::ListParams;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::client::kube_resources::{
    ConfigMap, CronJob, DaemonSet, Deployment, Endpoints, Ingress, Job, K8sEvent, Namespace, Node,
    PersistentVolumeClaim, Pod, ReplicaSet, Role, RoleBinding, Secret, Service, ServiceAccount,
    StatefulSet,
};
use crate::core::state::runtime::live::resource_kind::ResourceKind;
use crate::core::state::runtime::live::tracked_object::TrackedObject;

pub type WatchStream =
    BoxStream<'static, Result<watcher::Event<TrackedObject>, watcher::Error>>;

/// Where watch events and one-shot listings come from.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// An endless watch of `kind`, scoped to `namespace` when given.
    /// Reconnects and relists are handled inside the stream.
    fn watch(&self, kind: ResourceKind, namespace: Option<&str>) -> WatchStream;

    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<TrackedObject>>;
}

/// [`ClusterSource`] backed by the API server.
#[derive(Clone)]
pub struct KubeClusterSource {
    client: Client,
}

impl KubeClusterSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

fn map_event<K: Into<TrackedObject>>(event: watcher::Event<K>) -> watcher::Event<TrackedObject> {
    match event {
        watcher::Event::Apply(obj) => watcher::Event::Apply(obj.into()),
        watcher::Event::Delete(obj) => watcher::Event::Delete(obj.into()),
        watcher::Event::Init => watcher::Event::Init,
        watcher::Event::InitApply(obj) => watcher::Event::InitApply(obj.into()),
        watcher::Event::InitDone => watcher::Event::InitDone,
    }
}

fn watch_api<K>(api: Api<K>) -> WatchStream
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static + Into<TrackedObject>,
    <K as Resource>::DynamicType: Default + Eq + std::hash::Hash + Clone + Send + Sync,
{
    watcher(api, watcher::Config::default())
        .modify(|obj| {
            // Field-manager bookkeeping is never rendered
            obj.managed_fields_mut().clear();
        })
        .default_backoff()
        .map(|event| event.map(map_event))
        .boxed()
}

async fn list_api<K>(api: Api<K>) -> Result<Vec<TrackedObject>>
where
    K: Resource + Clone + DeserializeOwned + Debug + Into<TrackedObject>,
    <K as Resource>::DynamicType: Default,
{
    let list = api.list(&ListParams::default()).await?;
    debug!("Listed {} objects", list.items.len());
    Ok(list.items.into_iter().map(Into::into).collect())
}

#[async_trait]
impl ClusterSource for KubeClusterSource {
    fn watch(&self, kind: ResourceKind, namespace: Option<&str>) -> WatchStream {
        let c = &self.client;
        match kind {
            ResourceKind::Pods => watch_api(scoped_api::<Pod>(c, namespace)),
            ResourceKind::Deployments => watch_api(scoped_api::<Deployment>(c, namespace)),
            ResourceKind::Services => watch_api(scoped_api::<Service>(c, namespace)),
            ResourceKind::Nodes => watch_api(Api::<Node>::all(c.clone())),
            ResourceKind::Events => watch_api(scoped_api::<K8sEvent>(c, namespace)),
            ResourceKind::Namespaces => watch_api(Api::<Namespace>::all(c.clone())),
            ResourceKind::ReplicaSets => watch_api(scoped_api::<ReplicaSet>(c, namespace)),
            ResourceKind::StatefulSets => watch_api(scoped_api::<StatefulSet>(c, namespace)),
            ResourceKind::DaemonSets => watch_api(scoped_api::<DaemonSet>(c, namespace)),
            ResourceKind::Jobs => watch_api(scoped_api::<Job>(c, namespace)),
            ResourceKind::CronJobs => watch_api(scoped_api::<CronJob>(c, namespace)),
            ResourceKind::Ingresses => watch_api(scoped_api::<Ingress>(c, namespace)),
            ResourceKind::ConfigMaps => watch_api(scoped_api::<ConfigMap>(c, namespace)),
            ResourceKind::Secrets => watch_api(scoped_api::<Secret>(c, namespace)),
            ResourceKind::PersistentVolumeClaims => {
                watch_api(scoped_api::<PersistentVolumeClaim>(c, namespace))
            }
            ResourceKind::ServiceAccounts => watch_api(scoped_api::<ServiceAccount>(c, namespace)),
            ResourceKind::Endpoints => watch_api(scoped_api::<Endpoints>(c, namespace)),
            ResourceKind::Roles => watch_api(scoped_api::<Role>(c, namespace)),
            ResourceKind::RoleBindings => watch_api(scoped_api::<RoleBinding>(c, namespace)),
        }
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<TrackedObject>> {
        let c = &self.client;
        match kind {
            ResourceKind::Pods => list_api(scoped_api::<Pod>(c, namespace)).await,
            ResourceKind::Deployments => list_api(scoped_api::<Deployment>(c, namespace)).await,
            ResourceKind::Services => list_api(scoped_api::<Service>(c, namespace)).await,
            ResourceKind::Nodes => list_api(Api::<Node>::all(c.clone())).await,
            ResourceKind::Events => list_api(scoped_api::<K8sEvent>(c, namespace)).await,
            ResourceKind::Namespaces => list_api(Api::<Namespace>::all(c.clone())).await,
            ResourceKind::ReplicaSets => list_api(scoped_api::<ReplicaSet>(c, namespace)).await,
            ResourceKind::StatefulSets => list_api(scoped_api::<StatefulSet>(c, namespace)).await,
            ResourceKind::DaemonSets => list_api(scoped_api::<DaemonSet>(c, namespace)).await,
            ResourceKind::Jobs => list_api(scoped_api::<Job>(c, namespace)).await,
            ResourceKind::CronJobs => list_api(scoped_api::<CronJob>(c, namespace)).await,
            ResourceKind::Ingresses => list_api(scoped_api::<Ingress>(c, namespace)).await,
            ResourceKind::ConfigMaps => list_api(scoped_api::<ConfigMap>(c, namespace)).await,
            ResourceKind::Secrets => list_api(scoped_api::<Secret>(c, namespace)).await,
            ResourceKind::PersistentVolumeClaims => {
                list_api(scoped_api::<PersistentVolumeClaim>(c, namespace)).await
            }
            ResourceKind::ServiceAccounts => {
                list_api(scoped_api::<ServiceAccount>(c, namespace)).await
            }
            ResourceKind::Endpoints => list_api(scoped_api::<Endpoints>(c, namespace)).await,
            ResourceKind::Roles => list_api(scoped_api::<Role>(c, namespace)).await,
            ResourceKind::RoleBindings => list_api(scoped_api::<RoleBinding>(c, namespace)).await,
        }
    }
}
