use std::fmt;
use std::str::FromStr;

use crate::errors::StoreError;

/// Resource kinds the live store can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Pods,
    Deployments,
    Services,
    Nodes,
    Events,
    Namespaces,
    ReplicaSets,
    StatefulSets,
    DaemonSets,
    Jobs,
    CronJobs,
    Ingresses,
    ConfigMaps,
    Secrets,
    PersistentVolumeClaims,
    ServiceAccounts,
    Endpoints,
    Roles,
    RoleBindings,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 19] = [
        ResourceKind::Pods,
        ResourceKind::Deployments,
        ResourceKind::Services,
        ResourceKind::Nodes,
        ResourceKind::Events,
        ResourceKind::Namespaces,
        ResourceKind::ReplicaSets,
        ResourceKind::StatefulSets,
        ResourceKind::DaemonSets,
        ResourceKind::Jobs,
        ResourceKind::CronJobs,
        ResourceKind::Ingresses,
        ResourceKind::ConfigMaps,
        ResourceKind::Secrets,
        ResourceKind::PersistentVolumeClaims,
        ResourceKind::ServiceAccounts,
        ResourceKind::Endpoints,
        ResourceKind::Roles,
        ResourceKind::RoleBindings,
    ];

    /// The plural name `kubectl get` accepts.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pods => "pods",
            ResourceKind::Deployments => "deployments",
            ResourceKind::Services => "services",
            ResourceKind::Nodes => "nodes",
            ResourceKind::Events => "events",
            ResourceKind::Namespaces => "namespaces",
            ResourceKind::ReplicaSets => "replicasets",
            ResourceKind::StatefulSets => "statefulsets",
            ResourceKind::DaemonSets => "daemonsets",
            ResourceKind::Jobs => "jobs",
            ResourceKind::CronJobs => "cronjobs",
            ResourceKind::Ingresses => "ingresses",
            ResourceKind::ConfigMaps => "configmaps",
            ResourceKind::Secrets => "secrets",
            ResourceKind::PersistentVolumeClaims => "persistentvolumeclaims",
            ResourceKind::ServiceAccounts => "serviceaccounts",
            ResourceKind::Endpoints => "endpoints",
            ResourceKind::Roles => "roles",
            ResourceKind::RoleBindings => "rolebindings",
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ResourceKind::Nodes | ResourceKind::Namespaces)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "pods" | "pod" | "po" => ResourceKind::Pods,
            "deployments" | "deployment" | "deploy" => ResourceKind::Deployments,
            "services" | "service" | "svc" => ResourceKind::Services,
            "nodes" | "node" | "no" => ResourceKind::Nodes,
            "events" | "event" | "ev" => ResourceKind::Events,
            "namespaces" | "namespace" | "ns" => ResourceKind::Namespaces,
            "replicasets" | "replicaset" | "rs" => ResourceKind::ReplicaSets,
            "statefulsets" | "statefulset" | "sts" => ResourceKind::StatefulSets,
            "daemonsets" | "daemonset" | "ds" => ResourceKind::DaemonSets,
            "jobs" | "job" => ResourceKind::Jobs,
            "cronjobs" | "cronjob" | "cj" => ResourceKind::CronJobs,
            "ingresses" | "ingress" | "ing" => ResourceKind::Ingresses,
            "configmaps" | "configmap" | "cm" => ResourceKind::ConfigMaps,
            "secrets" | "secret" => ResourceKind::Secrets,
            "persistentvolumeclaims" | "persistentvolumeclaim" | "pvc" => {
                ResourceKind::PersistentVolumeClaims
            }
            "serviceaccounts" | "serviceaccount" | "sa" => ResourceKind::ServiceAccounts,
            "endpoints" | "ep" => ResourceKind::Endpoints,
            "roles" | "role" => ResourceKind::Roles,
            "rolebindings" | "rolebinding" => ResourceKind::RoleBindings,
            _ => return Err(StoreError::UnsupportedKind(s.to_string())),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubectl_names_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn short_names_and_case_are_accepted() {
        assert_eq!("PO".parse::<ResourceKind>().unwrap(), ResourceKind::Pods);
        assert_eq!("deploy".parse::<ResourceKind>().unwrap(), ResourceKind::Deployments);
        assert_eq!(" pvc ".parse::<ResourceKind>().unwrap(), ResourceKind::PersistentVolumeClaims);
        assert_eq!("ep".parse::<ResourceKind>().unwrap(), ResourceKind::Endpoints);
        assert_eq!("RoleBinding".parse::<ResourceKind>().unwrap(), ResourceKind::RoleBindings);
        assert!(matches!(
            "widgets".parse::<ResourceKind>(),
            Err(StoreError::UnsupportedKind(name)) if name == "widgets"
        ));
    }

    #[test]
    fn only_nodes_and_namespaces_are_cluster_scoped() {
        let cluster: Vec<_> = ResourceKind::ALL.iter().filter(|k| !k.is_namespaced()).collect();
        assert_eq!(cluster, vec![&ResourceKind::Nodes, &ResourceKind::Namespaces]);
    }
}
