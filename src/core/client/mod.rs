pub mod bundle;
pub mod kube_client;
pub mod kube_resources;
pub mod resolver;
pub mod watchers;
