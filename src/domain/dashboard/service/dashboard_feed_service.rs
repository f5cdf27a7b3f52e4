use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::info;

use crate::core::client::bundle::ConnectionBundle;
use crate::core::client::watchers::{ClusterSource, KubeClusterSource};
use crate::core::state::runtime::live::change_signal::ChangeSignal;
use crate::core::state::runtime::live::lines::render_line;
use crate::core::state::runtime::live::live_state_store::LiveStateStore;
use crate::core::state::runtime::live::resource_kind::ResourceKind;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Row source for the dashboard: the live store when it starts in time,
/// otherwise periodic listings through the same cluster source.
pub enum DashboardFeed {
    Live {
        store: LiveStateStore,
        namespace: String,
    },
    Polling {
        source: Arc<dyn ClusterSource>,
        namespace: String,
        interval: Duration,
    },
}

impl DashboardFeed {
    pub async fn open(
        bundle: &ConnectionBundle,
        namespace: &str,
        kinds: &[ResourceKind],
        start_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        let source = Arc::new(KubeClusterSource::new(bundle.typed.clone()));
        Self::open_with_source(
            LiveStateStore::with_kinds(kinds),
            source,
            namespace,
            start_timeout,
            poll_interval,
        )
        .await
    }

    /// Starts `store` against `source`. A failed start is logged and turns
    /// into a polling feed; it is never returned to the caller.
    pub async fn open_with_source(
        store: LiveStateStore,
        source: Arc<dyn ClusterSource>,
        namespace: &str,
        start_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        let namespace = namespace.trim().to_string();
        match store.start_with_source(source.clone(), &namespace, start_timeout).await {
            Ok(()) => DashboardFeed::Live { store, namespace },
            Err(e) => {
                info!(
                    error = %e,
                    interval = ?poll_interval,
                    "live updates unavailable, polling instead"
                );
                DashboardFeed::Polling {
                    source,
                    namespace,
                    interval: poll_interval,
                }
            }
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, DashboardFeed::Live { .. })
    }

    /// Current rows for `kind`, in key order.
    pub async fn lines(&self, kind: ResourceKind) -> Result<Vec<String>> {
        match self {
            DashboardFeed::Live { store, namespace } => {
                Ok(store.snapshot_lines(kind, namespace).await)
            }
            DashboardFeed::Polling { source, namespace, .. } => {
                let scope = (kind.is_namespaced() && !namespace.is_empty())
                    .then_some(namespace.as_str());
                let mut objects = source.list(kind, scope).await?;
                objects.sort_by_cached_key(|o| o.key());

                let now = Utc::now();
                Ok(objects
                    .iter()
                    .map(|o| render_line(o, namespace.is_empty(), now))
                    .collect())
            }
        }
    }

    pub fn changes(&self, kind: ResourceKind) -> FeedChanges {
        match self {
            DashboardFeed::Live { store, .. } => FeedChanges::Live(store.notify_channel(kind)),
            DashboardFeed::Polling { interval, .. } => {
                let mut ticker = tokio::time::interval_at(Instant::now() + *interval, *interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                FeedChanges::Polling(ticker)
            }
        }
    }

    pub async fn close(&self) {
        if let DashboardFeed::Live { store, .. } = self {
            store.stop().await;
        }
    }
}

/// Wake-ups telling the dashboard to re-read rows.
pub enum FeedChanges {
    Live(ChangeSignal),
    Polling(Interval),
}

impl FeedChanges {
    /// Waits until rows may have changed. Returns `false` once a live feed
    /// has been closed. Polling wakes once per interval, starting one interval
    /// after the feed was asked for changes.
    pub async fn next_change(&mut self) -> bool {
        match self {
            FeedChanges::Live(signal) => signal.changed().await,
            FeedChanges::Polling(ticker) => {
                ticker.tick().await;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::runtime::live::live_state_store::tests::ScriptedSource;
    use crate::core::state::runtime::live::live_state_store::DEFAULT_START_TIMEOUT;
    use crate::core::state::runtime::live::tracked_object::tests::pod;

    const PODS: &[ResourceKind] = &[ResourceKind::Pods];

    #[tokio::test]
    async fn synced_store_gives_a_live_feed() {
        let source =
            ScriptedSource::synced(ResourceKind::Pods, vec![pod("shop", "web-1", "Running")]);
        let feed = DashboardFeed::open_with_source(
            LiveStateStore::with_kinds(PODS),
            Arc::new(source),
            "shop",
            DEFAULT_START_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
        )
        .await;

        assert!(feed.is_live());
        let lines = feed.lines(ResourceKind::Pods).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("web-1 1/1 Running"));

        let mut changes = feed.changes(ResourceKind::Pods);
        feed.close().await;
        assert!(!changes.next_change().await);
        feed.close().await;
    }

    #[tokio::test]
    async fn start_failure_degrades_to_sorted_polling() {
        let source = ScriptedSource {
            listed: vec![
                pod("shop", "web-2", "Running"),
                pod("ops", "agent", "Running"),
                pod("shop", "web-1", "Pending"),
            ],
            ..Default::default()
        };
        let feed = DashboardFeed::open_with_source(
            LiveStateStore::with_kinds(PODS),
            Arc::new(source),
            "",
            Duration::from_millis(100),
            Duration::from_millis(10),
        )
        .await;
        assert!(!feed.is_live());

        let all = feed.lines(ResourceKind::Pods).await.unwrap();
        assert!(all[0].starts_with("ops agent "));
        assert!(all[1].starts_with("shop web-1 "));
        assert!(all[2].starts_with("shop web-2 "));

        let mut changes = feed.changes(ResourceKind::Pods);
        assert!(changes.next_change().await);
        assert!(changes.next_change().await);
        feed.close().await;
    }

    #[tokio::test]
    async fn polling_respects_namespace_scope() {
        let source = ScriptedSource {
            listed: vec![pod("shop", "web-1", "Running"), pod("ops", "agent", "Running")],
            ..Default::default()
        };
        let feed = DashboardFeed::open_with_source(
            LiveStateStore::with_kinds(PODS),
            Arc::new(source),
            "ops",
            Duration::from_millis(50),
            DEFAULT_POLL_INTERVAL,
        )
        .await;

        let lines = feed.lines(ResourceKind::Pods).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("agent 1/1 Running"));
    }
}
