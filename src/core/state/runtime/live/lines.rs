//! Projection of watched objects into whitespace-separated rows shaped like
//! `kubectl get --no-headers` output. Every column is a single token so the
//! rows can be split on whitespace; cluster-wide listings of namespaced kinds
//! carry the namespace as the first column.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, Time};

use crate::core::client::kube_resources::{
    ConfigMap, CronJob, DaemonSet, Deployment, Endpoints, Ingress, Job, K8sEvent, Namespace, Node,
    PersistentVolumeClaim, Pod, ReplicaSet, Role, RoleBinding, Secret, Service, ServiceAccount,
    StatefulSet,
};
use crate::core::state::runtime::live::tracked_object::TrackedObject;

pub const NONE: &str = "<none>";
const NODE_ROLE_PREFIX: &str = "node-role.kubernetes.io/";

/// Kubernetes timestamp types, truncated to whole seconds.
pub trait KubeTimestamp {
    fn to_utc(&self) -> Option<DateTime<Utc>>;
}

impl KubeTimestamp for Time {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0.timestamp(), 0)
    }
}

impl KubeTimestamp for MicroTime {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0.timestamp(), 0)
    }
}

/// Reads a Kubernetes timestamp (`Time` or `MicroTime`) as UTC.
pub fn timestamp<T: KubeTimestamp>(time: &T) -> Option<DateTime<Utc>> {
    time.to_utc()
}

/// Compact age such as `42s`, `5m`, `3h` or `12d`.
pub fn format_age(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(since) = since else {
        return "<unknown>".to_string();
    };
    let secs = (now - since).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s => format!("{}d", s / 86_400),
    }
}

fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m", s / 60),
        s => format!("{}h", s / 3_600),
    }
}

/// Collapses a value into one column: blank becomes `placeholder`, inner
/// whitespace becomes `_`.
pub fn safe_field(value: &str, placeholder: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return placeholder.to_string();
    }
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn opt_field(value: Option<&str>, placeholder: &str) -> String {
    safe_field(value.unwrap_or_default(), placeholder)
}

fn join_or_none(parts: Vec<String>) -> String {
    if parts.is_empty() {
        NONE.to_string()
    } else {
        parts.join(",")
    }
}

/// Renders one object. `all_namespaces` selects the cluster-wide layout.
pub fn render_line(object: &TrackedObject, all_namespaces: bool, now: DateTime<Utc>) -> String {
    let age = format_age(
        object.metadata().creation_timestamp.as_ref().and_then(timestamp),
        now,
    );

    let columns = match object {
        TrackedObject::Pod(pod) => pod_columns(pod, age, all_namespaces),
        TrackedObject::Deployment(deploy) => deployment_columns(deploy, age),
        TrackedObject::Service(svc) => service_columns(svc, age),
        TrackedObject::Node(node) => node_columns(node, age),
        TrackedObject::Event(event) => event_columns(event, now),
        TrackedObject::Namespace(ns) => namespace_columns(ns, age),
        TrackedObject::ReplicaSet(rs) => replica_set_columns(rs, age),
        TrackedObject::StatefulSet(sts) => stateful_set_columns(sts, age),
        TrackedObject::DaemonSet(ds) => daemon_set_columns(ds, age),
        TrackedObject::Job(job) => job_columns(job, age, now),
        TrackedObject::CronJob(cj) => cron_job_columns(cj, age, now),
        TrackedObject::Ingress(ing) => ingress_columns(ing, age),
        TrackedObject::ConfigMap(cm) => config_map_columns(cm, age),
        TrackedObject::Secret(secret) => secret_columns(secret, age),
        TrackedObject::PersistentVolumeClaim(pvc) => pvc_columns(pvc, age),
        TrackedObject::ServiceAccount(sa) => service_account_columns(sa, age),
        TrackedObject::Endpoints(ep) => endpoints_columns(ep, age),
        TrackedObject::Role(_) => vec![age],
        TrackedObject::RoleBinding(rb) => role_binding_columns(rb, age),
    };

    let mut line = Vec::with_capacity(columns.len() + 2);
    if all_namespaces && object.kind().is_namespaced() {
        let placeholder = match object {
            TrackedObject::Event(_) => "default",
            _ => NONE,
        };
        line.push(safe_field(object.namespace(), placeholder));
    }
    if !matches!(object, TrackedObject::Event(_)) {
        line.push(safe_field(object.name(), NONE));
    }
    line.extend(columns);
    line.join(" ")
}

fn pod_columns(pod: &Pod, age: String, all_namespaces: bool) -> Vec<String> {
    let total = pod.spec.as_ref().map_or(0, |s| s.containers.len());
    let status = pod.status.as_ref();
    let statuses = status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default();
    let ready = statuses.iter().filter(|cs| cs.ready).count();
    let restarts: i32 = statuses.iter().map(|cs| cs.restart_count).sum();

    let phase = if pod.metadata.deletion_timestamp.is_some() {
        "Terminating".to_string()
    } else {
        opt_field(status.and_then(|s| s.phase.as_deref()), "Unknown")
    };

    let mut columns = vec![
        format!("{ready}/{total}"),
        phase,
        restarts.to_string(),
        age,
        opt_field(status.and_then(|s| s.pod_ip.as_deref()), NONE),
        opt_field(pod.spec.as_ref().and_then(|s| s.node_name.as_deref()), NONE),
    ];
    if all_namespaces {
        columns.push(NONE.to_string());
        columns.push("<0>".to_string());
    }
    columns
}

fn deployment_columns(deploy: &Deployment, age: String) -> Vec<String> {
    let status = deploy.status.as_ref();
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
    let total = status.and_then(|s| s.replicas).unwrap_or(0);
    let updated = status.and_then(|s| s.updated_replicas).unwrap_or(0);
    let available = status.and_then(|s| s.available_replicas).unwrap_or(0);
    vec![
        format!("{ready}/{total}"),
        updated.to_string(),
        available.to_string(),
        age,
    ]
}

fn service_columns(svc: &Service, age: String) -> Vec<String> {
    let spec = svc.spec.as_ref();
    let external = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|ingress| ingress.first())
        .and_then(|first| first.ip.clone().or_else(|| first.hostname.clone()));
    let ports = spec
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| format!("{}/{}", p.port, p.protocol.as_deref().unwrap_or("TCP")))
                .collect()
        })
        .unwrap_or_default();

    vec![
        opt_field(spec.and_then(|s| s.type_.as_deref()), "ClusterIP"),
        opt_field(spec.and_then(|s| s.cluster_ip.as_deref()), NONE),
        opt_field(external.as_deref(), NONE),
        join_or_none(ports),
        age,
    ]
}

fn node_columns(node: &Node, age: String) -> Vec<String> {
    let status = node.status.as_ref();
    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conds| conds.iter().any(|c| c.type_ == "Ready" && c.status == "True"));
    let mut state = if ready { "Ready" } else { "NotReady" }.to_string();
    if node.spec.as_ref().and_then(|s| s.unschedulable).unwrap_or(false) {
        state.push_str(",SchedulingDisabled");
    }

    let roles = node
        .metadata
        .labels
        .as_ref()
        .map(|labels| {
            labels
                .keys()
                .filter_map(|k| k.strip_prefix(NODE_ROLE_PREFIX))
                .filter(|role| !role.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    vec![
        state,
        join_or_none(roles),
        age,
        opt_field(
            status.and_then(|s| s.node_info.as_ref()).map(|i| i.kubelet_version.as_str()),
            "<unknown>",
        ),
    ]
}

// Events have no name column; the trailing `x` stands in for the message so
// the object column stays second to last.
fn event_columns(event: &K8sEvent, now: DateTime<Utc>) -> Vec<String> {
    let seen = event
        .last_timestamp
        .as_ref()
        .and_then(timestamp)
        .or_else(|| event.event_time.as_ref().and_then(timestamp))
        .or_else(|| event.metadata.creation_timestamp.as_ref().and_then(timestamp));
    let involved = &event.involved_object;
    let object = format!(
        "{}/{}",
        involved.kind.as_deref().unwrap_or_default(),
        involved.name.as_deref().unwrap_or_default()
    );
    let object = if object == "/" {
        "unknown/unknown".to_string()
    } else {
        safe_field(&object, "unknown/unknown")
    };

    vec![
        format_age(seen, now),
        opt_field(event.type_.as_deref(), "Normal"),
        opt_field(event.reason.as_deref(), "Unknown"),
        object,
        "x".to_string(),
    ]
}

fn namespace_columns(ns: &Namespace, age: String) -> Vec<String> {
    vec![
        opt_field(ns.status.as_ref().and_then(|s| s.phase.as_deref()), "Active"),
        age,
    ]
}

fn replica_set_columns(rs: &ReplicaSet, age: String) -> Vec<String> {
    let desired = rs.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
    let current = rs.status.as_ref().map_or(0, |s| s.replicas);
    let ready = rs.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
    vec![
        desired.to_string(),
        current.to_string(),
        ready.to_string(),
        age,
    ]
}

fn stateful_set_columns(sts: &StatefulSet, age: String) -> Vec<String> {
    let replicas = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
    let ready = sts.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
    vec![format!("{ready}/{replicas}"), age]
}

fn daemon_set_columns(ds: &DaemonSet, age: String) -> Vec<String> {
    let status = ds.status.as_ref();
    let selector: Vec<String> = ds
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|s| s.node_selector.as_ref())
        .map(|sel: &BTreeMap<String, String>| sel.iter().map(|(k, v)| format!("{k}={v}")).collect())
        .unwrap_or_default();

    vec![
        status.map_or(0, |s| s.desired_number_scheduled).to_string(),
        status.map_or(0, |s| s.current_number_scheduled).to_string(),
        status.map_or(0, |s| s.number_ready).to_string(),
        status.and_then(|s| s.updated_number_scheduled).unwrap_or(0).to_string(),
        status.and_then(|s| s.number_available).unwrap_or(0).to_string(),
        join_or_none(selector),
        age,
    ]
}

fn job_columns(job: &Job, age: String, now: DateTime<Utc>) -> Vec<String> {
    let desired = job.spec.as_ref().and_then(|s| s.completions).unwrap_or(1);
    let status = job.status.as_ref();
    let succeeded = status.and_then(|s| s.succeeded).unwrap_or(0);
    let duration = status
        .and_then(|s| s.start_time.as_ref())
        .and_then(timestamp)
        .map(|start| {
            let end = status
                .and_then(|s| s.completion_time.as_ref())
                .and_then(timestamp)
                .unwrap_or(now);
            format_duration((end - start).num_seconds())
        })
        .unwrap_or_else(|| NONE.to_string());

    vec![format!("{succeeded}/{desired}"), duration, age]
}

// The `_` column keeps suspend/active at the positions of kubectl's layout,
// where the time zone column sits between schedule and suspend.
fn cron_job_columns(cj: &CronJob, age: String, now: DateTime<Utc>) -> Vec<String> {
    let spec = cj.spec.as_ref();
    let suspended = spec.and_then(|s| s.suspend).unwrap_or(false);
    let status = cj.status.as_ref();
    let active = status.and_then(|s| s.active.as_ref()).map_or(0, Vec::len);
    let last = status
        .and_then(|s| s.last_schedule_time.as_ref())
        .and_then(timestamp)
        .map(|t| format_age(Some(t), now))
        .unwrap_or_else(|| NONE.to_string());

    vec![
        opt_field(spec.map(|s| s.schedule.as_str()), NONE),
        "_".to_string(),
        if suspended { "True" } else { "False" }.to_string(),
        active.to_string(),
        last,
        age,
    ]
}

fn ingress_columns(ing: &Ingress, age: String) -> Vec<String> {
    let spec = ing.spec.as_ref();
    let hosts = spec
        .and_then(|s| s.rules.as_ref())
        .map(|rules| {
            rules
                .iter()
                .filter_map(|r| r.host.clone())
                .filter(|h| !h.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let address = ing
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|ingress| ingress.first())
        .and_then(|first| first.ip.clone().or_else(|| first.hostname.clone()));
    let has_tls = spec.and_then(|s| s.tls.as_ref()).is_some_and(|tls| !tls.is_empty());

    vec![
        opt_field(spec.and_then(|s| s.ingress_class_name.as_deref()), NONE),
        join_or_none(hosts),
        opt_field(address.as_deref(), NONE),
        if has_tls { "80,443" } else { "80" }.to_string(),
        age,
    ]
}

fn config_map_columns(cm: &ConfigMap, age: String) -> Vec<String> {
    let entries = cm.data.as_ref().map_or(0, BTreeMap::len)
        + cm.binary_data.as_ref().map_or(0, BTreeMap::len);
    vec![entries.to_string(), age]
}

fn secret_columns(secret: &Secret, age: String) -> Vec<String> {
    vec![
        opt_field(secret.type_.as_deref(), "Opaque"),
        secret.data.as_ref().map_or(0, BTreeMap::len).to_string(),
        age,
    ]
}

fn pvc_columns(pvc: &PersistentVolumeClaim, age: String) -> Vec<String> {
    let spec = pvc.spec.as_ref();
    let status = pvc.status.as_ref();
    let capacity = status
        .and_then(|s| s.capacity.as_ref())
        .and_then(|c| c.get("storage"))
        .map(|q| q.0.clone());
    let modes = spec
        .and_then(|s| s.access_modes.clone())
        .unwrap_or_default();

    vec![
        opt_field(status.and_then(|s| s.phase.as_deref()), "Pending"),
        opt_field(spec.and_then(|s| s.volume_name.as_deref()), NONE),
        opt_field(capacity.as_deref(), NONE),
        join_or_none(modes),
        opt_field(spec.and_then(|s| s.storage_class_name.as_deref()), NONE),
        age,
    ]
}

fn service_account_columns(sa: &ServiceAccount, age: String) -> Vec<String> {
    vec![sa.secrets.as_ref().map_or(0, Vec::len).to_string(), age]
}

// One `ip:port` entry per address and port of every subset.
fn endpoints_columns(ep: &Endpoints, age: String) -> Vec<String> {
    let mut targets = Vec::new();
    for subset in ep.subsets.iter().flatten() {
        for address in subset.addresses.iter().flatten() {
            for port in subset.ports.iter().flatten() {
                targets.push(format!("{}:{}", address.ip, port.port));
            }
        }
    }
    vec![join_or_none(targets), age]
}

fn role_binding_columns(rb: &RoleBinding, age: String) -> Vec<String> {
    let role = format!("{}/{}", rb.role_ref.kind, rb.role_ref.name);
    vec![safe_field(&role, NONE), age]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::runtime::live::tracked_object::tests::{node, pod};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap()
    }

    #[test]
    fn ages_use_the_largest_whole_unit() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_age(Some(start), start + chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_age(Some(start), start + chrono::Duration::minutes(5)), "5m");
        assert_eq!(format_age(Some(start), start + chrono::Duration::hours(3)), "3h");
        assert_eq!(format_age(Some(start), start + chrono::Duration::days(12)), "12d");
        assert_eq!(format_age(None, start), "<unknown>");
    }

    #[test]
    fn safe_field_yields_single_tokens() {
        assert_eq!(safe_field("  ", NONE), NONE);
        assert_eq!(safe_field("Back off  restarting", NONE), "Back_off_restarting");
    }

    #[test]
    fn pod_rows_follow_namespace_layout() {
        let web = pod("shop", "web-1", "Running");
        assert_eq!(render_line(&web, false, now()), "web-1 1/1 Running 1 3h <none> <none>");
        assert_eq!(
            render_line(&web, true, now()),
            "shop web-1 1/1 Running 1 3h <none> <none> <none> <0>"
        );
    }

    #[test]
    fn node_rows_have_no_namespace_column() {
        let line = render_line(&node("cp-1"), true, now());
        assert_eq!(line, "cp-1 Ready control-plane <unknown> v1.31.0");
    }

    #[test]
    fn event_rows_put_object_second_to_last() {
        let event: K8sEvent = serde_json::from_value(json!({
            "metadata": { "name": "web.1", "namespace": "shop" },
            "involvedObject": { "kind": "Pod", "name": "web-1" },
            "reason": "BackOff",
            "type": "Warning",
            "message": "Back-off restarting failed container",
            "lastTimestamp": "2024-01-01T02:59:00Z"
        }))
        .unwrap();
        let line = render_line(&event.into(), true, now());
        assert_eq!(line, "shop 1m Warning BackOff Pod/web-1 x");
    }

    #[test]
    fn service_and_pvc_rows() {
        let svc: Service = serde_json::from_value(json!({
            "metadata": { "name": "api", "namespace": "shop" },
            "spec": {
                "type": "LoadBalancer",
                "clusterIP": "10.0.0.10",
                "ports": [{ "port": 80, "protocol": "TCP" }, { "port": 53, "protocol": "UDP" }]
            },
            "status": { "loadBalancer": { "ingress": [{ "hostname": "lb.example.com" }] } }
        }))
        .unwrap();
        assert_eq!(
            render_line(&svc.into(), false, now()),
            "api LoadBalancer 10.0.0.10 lb.example.com 80/TCP,53/UDP <unknown>"
        );

        let pvc: PersistentVolumeClaim = serde_json::from_value(json!({
            "metadata": { "name": "data", "namespace": "shop" },
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "volumeName": "pv-1",
                "storageClassName": "gp3"
            },
            "status": { "phase": "Bound", "capacity": { "storage": "10Gi" } }
        }))
        .unwrap();
        assert_eq!(
            render_line(&pvc.into(), false, now()),
            "data Bound pv-1 10Gi ReadWriteOnce gp3 <unknown>"
        );
    }

    #[test]
    fn job_and_cronjob_rows() {
        let job: Job = serde_json::from_value(json!({
            "metadata": {
                "name": "migrate",
                "namespace": "shop",
                "creationTimestamp": "2024-01-01T02:00:00Z"
            },
            "spec": { "template": {} },
            "status": {
                "succeeded": 1,
                "startTime": "2024-01-01T02:00:00Z",
                "completionTime": "2024-01-01T02:00:30Z"
            }
        }))
        .unwrap();
        assert_eq!(render_line(&job.into(), false, now()), "migrate 1/1 30s 1h");

        let cron: CronJob = serde_json::from_value(json!({
            "metadata": { "name": "nightly", "namespace": "shop" },
            "spec": { "schedule": "0 2 * * *", "jobTemplate": {} }
        }))
        .unwrap();
        assert_eq!(
            render_line(&cron.into(), false, now()),
            "nightly 0_2_*_*_* _ False 0 <none> <unknown>"
        );
    }

    #[test]
    fn event_time_is_read_when_last_timestamp_is_missing() {
        let event: K8sEvent = serde_json::from_value(json!({
            "metadata": { "name": "web.2", "namespace": "shop" },
            "involvedObject": { "kind": "Pod", "name": "web-1" },
            "reason": "Scheduled",
            "eventTime": "2024-01-01T02:58:00.250000Z"
        }))
        .unwrap();
        assert_eq!(
            event.event_time.as_ref().and_then(timestamp),
            Some(now() - chrono::Duration::minutes(2))
        );
        let line = render_line(&event.into(), false, now());
        assert_eq!(line, "2m Normal Scheduled Pod/web-1 x");
    }

    #[test]
    fn endpoints_rows_list_every_address_and_port() {
        let ep: Endpoints = serde_json::from_value(json!({
            "metadata": {
                "name": "web",
                "namespace": "shop",
                "creationTimestamp": "2024-01-01T02:30:00Z"
            },
            "subsets": [{
                "addresses": [{ "ip": "10.0.0.1" }, { "ip": "10.0.0.2" }],
                "ports": [{ "port": 80 }, { "port": 443 }]
            }]
        }))
        .unwrap();
        assert_eq!(
            render_line(&ep.into(), true, now()),
            "shop web 10.0.0.1:80,10.0.0.1:443,10.0.0.2:80,10.0.0.2:443 30m"
        );

        let empty: Endpoints = serde_json::from_value(json!({
            "metadata": { "name": "idle", "namespace": "shop" }
        }))
        .unwrap();
        assert_eq!(render_line(&empty.into(), false, now()), "idle <none> <unknown>");
    }

    #[test]
    fn role_rows_carry_name_and_age() {
        let role: Role = serde_json::from_value(json!({
            "metadata": {
                "name": "pod-reader",
                "namespace": "shop",
                "creationTimestamp": "2023-12-30T03:00:00Z"
            },
            "rules": [{ "apiGroups": [""], "resources": ["pods"], "verbs": ["get"] }]
        }))
        .unwrap();
        let role = TrackedObject::from(role);
        assert_eq!(render_line(&role, false, now()), "pod-reader 2d");
        assert_eq!(render_line(&role, true, now()), "shop pod-reader 2d");
    }

    #[test]
    fn role_binding_rows_name_the_referenced_role() {
        let rb: RoleBinding = serde_json::from_value(json!({
            "metadata": { "name": "read-pods", "namespace": "shop" },
            "roleRef": {
                "apiGroup": "rbac.authorization.k8s.io",
                "kind": "Role",
                "name": "pod-reader"
            },
            "subjects": [{ "kind": "User", "name": "jane" }]
        }))
        .unwrap();
        let rb = TrackedObject::from(rb);
        assert_eq!(render_line(&rb, false, now()), "read-pods Role/pod-reader <unknown>");
        assert_eq!(render_line(&rb, true, now()), "shop read-pods Role/pod-reader <unknown>");
    }
}
