//! Re-exports of the Kubernetes resource types the dashboard tracks,
//! kept in one place so the rest of the crate names them consistently.

pub use k8s_openapi::api::core::v1::{
    ConfigMap,
    Endpoints,
    Event as K8sEvent,
    Namespace,
    Node,
    PersistentVolumeClaim,
    Pod,
    Secret,
    Service,
    ServiceAccount,
};

pub use k8s_openapi::api::apps::v1::{
    DaemonSet,
    Deployment,
    ReplicaSet,
    StatefulSet,
};

pub use k8s_openapi::api::batch::v1::{
    CronJob,
    Job,
};

pub use k8s_openapi::api::networking::v1::{
    Ingress,
};

pub use k8s_openapi::api::rbac::v1::{
    Role,
    RoleBinding,
};

pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
