use crate::core::client::kube_resources::{
    ConfigMap, CronJob, DaemonSet, Deployment, Endpoints, Ingress, Job, K8sEvent, Namespace, Node,
    ObjectMeta, PersistentVolumeClaim, Pod, ReplicaSet, Role, RoleBinding, Secret, Service,
    ServiceAccount, StatefulSet,
};
use crate::core::state::runtime::live::resource_kind::ResourceKind;

/// Identity of an object inside the live index. Cluster-scoped objects use
/// an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Smallest key of `kind`; every key of that kind sorts at or after it.
    pub fn first_of(kind: ResourceKind) -> Self {
        Self {
            kind,
            namespace: String::new(),
            name: String::new(),
        }
    }
}

macro_rules! tracked_objects {
    ($($variant:ident($ty:ty) => $kind:ident),+ $(,)?) => {
        /// One watched Kubernetes object of any tracked kind.
        #[derive(Debug, Clone)]
        pub enum TrackedObject {
            $($variant($ty)),+
        }

        impl TrackedObject {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(TrackedObject::$variant(_) => ResourceKind::$kind),+
                }
            }

            pub fn metadata(&self) -> &ObjectMeta {
                match self {
                    $(TrackedObject::$variant(o) => &o.metadata),+
                }
            }
        }

        $(
            impl From<$ty> for TrackedObject {
                fn from(object: $ty) -> Self {
                    TrackedObject::$variant(object)
                }
            }
        )+
    };
}

tracked_objects! {
    Pod(Pod) => Pods,
    Deployment(Deployment) => Deployments,
    Service(Service) => Services,
    Node(Node) => Nodes,
    Event(K8sEvent) => Events,
    Namespace(Namespace) => Namespaces,
    ReplicaSet(ReplicaSet) => ReplicaSets,
    StatefulSet(StatefulSet) => StatefulSets,
    DaemonSet(DaemonSet) => DaemonSets,
    Job(Job) => Jobs,
    CronJob(CronJob) => CronJobs,
    Ingress(Ingress) => Ingresses,
    ConfigMap(ConfigMap) => ConfigMaps,
    Secret(Secret) => Secrets,
    PersistentVolumeClaim(PersistentVolumeClaim) => PersistentVolumeClaims,
    ServiceAccount(ServiceAccount) => ServiceAccounts,
    Endpoints(Endpoints) => Endpoints,
    Role(Role) => Roles,
    RoleBinding(RoleBinding) => RoleBindings,
}

impl TrackedObject {
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            kind: self.kind(),
            namespace: self.namespace().to_string(),
            name: self.name().to_string(),
        }
    }
}
