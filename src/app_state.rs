use std::sync::Arc;

use crate::core::client::kube_client::KubeClientFactory;
use crate::core::client::resolver::ClusterResolver;
use crate::core::persistence::session::session_state_fs_adapter::SessionStateFsAdapter;
use crate::core::persistence::session::session_state_repository::SessionStateRepositoryImpl;
use crate::core::persistence::storage_path::{session_state_path, session_state_path_in};
use crate::core::util::clock::SystemClock;
use crate::domain::cluster::service::cluster_service::ClusterService;
use crate::settings::Settings;

/// Long-lived services shared by every command. Caches live inside the
/// resolver, so one `AppState` means one set of caches.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cluster_service: Arc<ClusterService>,
}

pub fn build_app_state(settings: Settings) -> AppState {
    let resolver = ClusterResolver::new(
        settings.config_ttl,
        settings.bundle_ttl,
        Arc::new(SystemClock),
        Arc::new(KubeClientFactory),
    );

    let session_path = match &settings.state_dir {
        Some(dir) => session_state_path_in(dir),
        None => session_state_path(),
    };
    let session = SessionStateRepositoryImpl::new(SessionStateFsAdapter::at(session_path));

    AppState {
        settings: Arc::new(settings),
        cluster_service: Arc::new(ClusterService::new(Arc::new(resolver), Arc::new(session))),
    }
}
