use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::try_join_all;
use futures::StreamExt;
use kube::runtime::watcher;
use tokio::sync::{oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::client::bundle::ConnectionBundle;
use crate::core::client::watchers::{ClusterSource, KubeClusterSource, WatchStream};
use crate::core::state::runtime::live::change_signal::ChangeSignal;
use crate::core::state::runtime::live::lines::render_line;
use crate::core::state::runtime::live::live_object_index::LiveObjectIndex;
use crate::core::state::runtime::live::resource_kind::ResourceKind;
use crate::core::state::runtime::live::tracked_object::TrackedObject;
use crate::errors::StoreError;

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Created,
    Starting,
    Running,
    Stopped,
}

impl fmt::Display for StorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorePhase::Created => "created",
            StorePhase::Starting => "starting",
            StorePhase::Running => "running",
            StorePhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

type Signals = HashMap<ResourceKind, Arc<watch::Sender<u64>>>;

/// In-memory mirror of the watched cluster objects behind the dashboard.
///
/// One task per tracked kind consumes that kind's watch stream and writes
/// into a shared [`LiveObjectIndex`]; readers take snapshots under the read
/// lock and wait on per-kind [`ChangeSignal`]s. A store runs at most once:
/// after [`LiveStateStore::stop`] (or a failed start) it stays stopped.
pub struct LiveStateStore {
    kinds: Vec<ResourceKind>,
    index: Arc<RwLock<LiveObjectIndex>>,
    signals: Mutex<Signals>,
    phase: Mutex<StorePhase>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LiveStateStore {
    /// A store tracking every supported kind.
    pub fn new() -> Self {
        Self::with_kinds(&ResourceKind::ALL)
    }

    /// A store tracking only `kinds`.
    pub fn with_kinds(kinds: &[ResourceKind]) -> Self {
        let mut tracked = kinds.to_vec();
        tracked.sort();
        tracked.dedup();

        let signals = tracked
            .iter()
            .map(|kind| (*kind, Arc::new(watch::channel(0).0)))
            .collect();

        Self {
            kinds: tracked,
            index: Arc::new(RwLock::new(LiveObjectIndex::new())),
            signals: Mutex::new(signals),
            phase: Mutex::new(StorePhase::Created),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    pub fn phase(&self) -> StorePhase {
        *self.phase_lock()
    }

    /// Starts watching through the bundle's typed client. An empty
    /// `namespace` watches every namespace.
    pub async fn start(
        &self,
        bundle: &ConnectionBundle,
        namespace: &str,
        timeout: Duration,
    ) -> Result<(), StoreError> {
        let source = Arc::new(KubeClusterSource::new(bundle.typed.clone()));
        self.start_with_source(source, namespace, timeout).await
    }

    /// Opens one watch per tracked kind and waits until each has delivered
    /// its initial listing. On timeout or an early stream end every task is
    /// torn down and the store is left stopped.
    pub async fn start_with_source(
        &self,
        source: Arc<dyn ClusterSource>,
        namespace: &str,
        timeout: Duration,
    ) -> Result<(), StoreError> {
        {
            let mut phase = self.phase_lock();
            if *phase != StorePhase::Created {
                return Err(StoreError::InvalidState(*phase));
            }
            *phase = StorePhase::Starting;
        }

        let namespace = namespace.trim();
        let scope = (!namespace.is_empty()).then_some(namespace);
        info!(
            kinds = self.kinds.len(),
            namespace = scope.unwrap_or("<all>"),
            "starting live state store"
        );

        let mut synced = Vec::with_capacity(self.kinds.len());
        {
            let signals = self.signals_lock();
            let mut tasks = self.tasks_lock();
            for &kind in &self.kinds {
                let (ready_tx, ready_rx) = oneshot::channel();
                let stream = source.watch(kind, if kind.is_namespaced() { scope } else { None });
                tasks.push(tokio::spawn(consume_watch(
                    kind,
                    stream,
                    self.index.clone(),
                    signals.get(&kind).cloned(),
                    self.cancel.clone(),
                    ready_tx,
                )));
                synced.push(async move {
                    ready_rx.await.map_err(|_| StoreError::WatchEnded { kind })
                });
            }
        }

        match tokio::time::timeout(timeout, try_join_all(synced)).await {
            Ok(Ok(_)) => {
                let mut phase = self.phase_lock();
                // A concurrent stop() wins over a sync that finished meanwhile.
                if *phase != StorePhase::Starting {
                    return Err(StoreError::InvalidState(*phase));
                }
                *phase = StorePhase::Running;
                info!("live state store running");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "live state store failed to start");
                self.shutdown().await;
                Err(e)
            }
            Err(_) => {
                warn!(?timeout, "live state store initial sync timed out");
                self.shutdown().await;
                Err(StoreError::SyncTimeout(timeout))
            }
        }
    }

    /// Rendered rows for `kind`. An empty `namespace` lists every namespace
    /// with a leading namespace column. Reads only the in-memory index.
    pub async fn snapshot_lines(&self, kind: ResourceKind, namespace: &str) -> Vec<String> {
        let namespace = namespace.trim();
        let filter = (kind.is_namespaced() && !namespace.is_empty()).then_some(namespace);
        let now = Utc::now();

        let index = self.index.read().await;
        index
            .objects_of(kind, filter)
            .iter()
            .map(|object| render_line(object, namespace.is_empty(), now))
            .collect()
    }

    /// Change signal for `kind`. Available before start; it closes when the
    /// store stops, and is already closed for untracked kinds or a stopped
    /// store.
    pub fn notify_channel(&self, kind: ResourceKind) -> ChangeSignal {
        match self.signals_lock().get(&kind) {
            Some(tx) => ChangeSignal::new(tx.subscribe()),
            None => ChangeSignal::closed(),
        }
    }

    /// Cancels every watch task, waits for them and drops the index.
    /// Safe to call any number of times, in any phase.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.phase_lock(), StorePhase::Stopped);
        if previous == StorePhase::Stopped {
            return;
        }
        self.shutdown().await;
        info!(from = %previous, "live state store stopped");
    }

    async fn shutdown(&self) {
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks_lock());
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!(error = %e, "watch task failed");
                }
            }
        }

        self.index.write().await.clear();
        self.signals_lock().clear();
        *self.phase_lock() = StorePhase::Stopped;
    }

    fn phase_lock(&self) -> MutexGuard<'_, StorePhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signals_lock(&self) -> MutexGuard<'_, Signals> {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks_lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LiveStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LiveStateStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn consume_watch(
    kind: ResourceKind,
    mut stream: WatchStream,
    index: Arc<RwLock<LiveObjectIndex>>,
    signal: Option<Arc<watch::Sender<u64>>>,
    cancel: CancellationToken,
    ready: oneshot::Sender<()>,
) {
    let mut ready = Some(ready);
    let mut relist: Vec<TrackedObject> = Vec::new();

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => match next {
                Some(event) => event,
                None => {
                    warn!(%kind, "watch stream ended");
                    break;
                }
            },
        };

        let revision = match event {
            Ok(watcher::Event::Apply(object)) => {
                debug!(%kind, name = object.name(), "applied");
                Some(index.write().await.apply(object))
            }
            Ok(watcher::Event::Delete(object)) => {
                debug!(%kind, name = object.name(), "deleted");
                index.write().await.remove(&object.key())
            }
            Ok(watcher::Event::Init) => {
                relist.clear();
                None
            }
            Ok(watcher::Event::InitApply(object)) => {
                relist.push(object);
                None
            }
            Ok(watcher::Event::InitDone) => {
                let objects = std::mem::take(&mut relist);
                debug!(%kind, count = objects.len(), "relist complete");
                let revision = index.write().await.replace_kind(kind, objects);
                if let Some(ready) = ready.take() {
                    let _ = ready.send(());
                }
                Some(revision)
            }
            Err(e) => {
                warn!(%kind, error = %e, "watch error, retrying with backoff");
                None
            }
        };

        if let (Some(revision), Some(signal)) = (revision, signal.as_ref()) {
            signal.send_replace(revision);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::state::runtime::live::tracked_object::tests::{node, pod};
    use anyhow::Result;
    use async_trait::async_trait;
    use futures::stream;
    use std::time::Instant;
    use tokio::sync::mpsc;

    type Event = watcher::Event<TrackedObject>;

    /// Replays a fixed event script per kind, then optionally follows a live
    /// channel. Kinds without a script never produce anything.
    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        pub scripts: Mutex<HashMap<ResourceKind, Vec<Event>>>,
        pub follow: Mutex<HashMap<ResourceKind, mpsc::UnboundedReceiver<Event>>>,
        pub end_after_script: bool,
        pub listed: Vec<TrackedObject>,
    }

    impl ScriptedSource {
        pub(crate) fn synced(kind: ResourceKind, objects: Vec<TrackedObject>) -> Self {
            let source = Self::default();
            source.script(kind, initial_listing(objects));
            source
        }

        pub(crate) fn script(&self, kind: ResourceKind, events: Vec<Event>) {
            self.scripts.lock().unwrap().insert(kind, events);
        }

        pub(crate) fn follow(&self, kind: ResourceKind) -> mpsc::UnboundedSender<Event> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.follow.lock().unwrap().insert(kind, rx);
            tx
        }
    }

    pub(crate) fn initial_listing(objects: Vec<TrackedObject>) -> Vec<Event> {
        let mut events = vec![watcher::Event::Init];
        events.extend(objects.into_iter().map(watcher::Event::InitApply));
        events.push(watcher::Event::InitDone);
        events
    }

    #[async_trait]
    impl ClusterSource for ScriptedSource {
        fn watch(&self, kind: ResourceKind, _namespace: Option<&str>) -> WatchStream {
            let script = self.scripts.lock().unwrap().remove(&kind);
            let Some(script) = script else {
                return stream::pending().boxed();
            };
            let scripted = stream::iter(script.into_iter().map(Ok));
            if self.end_after_script {
                return scripted.boxed();
            }
            match self.follow.lock().unwrap().remove(&kind) {
                Some(mut rx) => scripted
                    .chain(stream::poll_fn(move |cx| rx.poll_recv(cx)).map(Ok))
                    .chain(stream::pending())
                    .boxed(),
                None => scripted.chain(stream::pending()).boxed(),
            }
        }

        async fn list(
            &self,
            kind: ResourceKind,
            namespace: Option<&str>,
        ) -> Result<Vec<TrackedObject>> {
            Ok(self
                .listed
                .iter()
                .filter(|o| o.kind() == kind)
                .filter(|o| namespace.map_or(true, |ns| o.namespace() == ns))
                .cloned()
                .collect())
        }
    }

    const PODS_ONLY: &[ResourceKind] = &[ResourceKind::Pods];

    async fn wait_for(signal: &mut ChangeSignal) {
        tokio::time::timeout(Duration::from_secs(2), signal.changed())
            .await
            .expect("change signal did not fire");
    }

    #[tokio::test]
    async fn start_waits_for_initial_listing_of_every_kind() {
        let source =
            ScriptedSource::synced(ResourceKind::Pods, vec![pod("shop", "web-1", "Running")]);
        source.script(ResourceKind::Nodes, initial_listing(vec![node("worker-a")]));

        let store = LiveStateStore::with_kinds(&[ResourceKind::Pods, ResourceKind::Nodes]);
        store
            .start_with_source(Arc::new(source), "", DEFAULT_START_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(store.phase(), StorePhase::Running);

        let pods = store.snapshot_lines(ResourceKind::Pods, "").await;
        assert_eq!(pods.len(), 1);
        assert!(pods[0].starts_with("shop web-1 1/1 Running"));
        let nodes = store.snapshot_lines(ResourceKind::Nodes, "").await;
        assert!(nodes[0].starts_with("worker-a Ready"));

        store.stop().await;
    }

    #[tokio::test]
    async fn sync_timeout_leaves_store_stopped_and_empty() {
        let source =
            ScriptedSource::synced(ResourceKind::Pods, vec![pod("shop", "web-1", "Running")]);
        // Nodes never list.
        let store = LiveStateStore::with_kinds(&[ResourceKind::Pods, ResourceKind::Nodes]);
        let mut signal = store.notify_channel(ResourceKind::Pods);

        let started = Instant::now();
        let err = store
            .start_with_source(Arc::new(source), "", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SyncTimeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(store.phase(), StorePhase::Stopped);
        assert!(store.snapshot_lines(ResourceKind::Pods, "").await.is_empty());
        assert!(store.tasks_lock().is_empty());
        while signal.changed().await {}

        store.stop().await;
        store.stop().await;
    }

    #[tokio::test]
    async fn stream_ending_before_listing_fails_fast() {
        let source = ScriptedSource {
            end_after_script: true,
            ..Default::default()
        };
        source.script(ResourceKind::Pods, vec![watcher::Event::Init]);

        let store = LiveStateStore::with_kinds(PODS_ONLY);
        let err = store
            .start_with_source(Arc::new(source), "", DEFAULT_START_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WatchEnded { kind: ResourceKind::Pods }));
        assert_eq!(store.phase(), StorePhase::Stopped);
    }

    #[tokio::test]
    async fn stop_is_idempotent_in_every_phase() {
        let never_started = LiveStateStore::new();
        never_started.stop().await;
        never_started.stop().await;
        assert_eq!(never_started.phase(), StorePhase::Stopped);

        let store = LiveStateStore::with_kinds(PODS_ONLY);
        store
            .start_with_source(
                Arc::new(ScriptedSource::synced(ResourceKind::Pods, vec![])),
                "",
                DEFAULT_START_TIMEOUT,
            )
            .await
            .unwrap();
        store.stop().await;
        store.stop().await;
        assert_eq!(store.phase(), StorePhase::Stopped);

        let err = store
            .start_with_source(Arc::new(ScriptedSource::default()), "", DEFAULT_START_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(StorePhase::Stopped)));
    }

    #[tokio::test]
    async fn stop_during_start_makes_start_fail() {
        // Pods sync at once, nodes never do, so start is parked in Starting.
        let source =
            ScriptedSource::synced(ResourceKind::Pods, vec![pod("shop", "web-1", "Running")]);
        let store = LiveStateStore::with_kinds(&[ResourceKind::Pods, ResourceKind::Nodes]);

        let (started, ()) = tokio::join!(
            store.start_with_source(Arc::new(source), "", DEFAULT_START_TIMEOUT),
            async {
                while store.phase() != StorePhase::Starting {
                    tokio::task::yield_now().await;
                }
                store.stop().await;
            }
        );

        assert!(started.is_err());
        assert_eq!(store.phase(), StorePhase::Stopped);
        assert!(store.snapshot_lines(ResourceKind::Pods, "").await.is_empty());
    }

    #[tokio::test]
    async fn live_events_update_index_and_post_signal() {
        let source = ScriptedSource::synced(
            ResourceKind::Pods,
            vec![pod("shop", "web-1", "Running"), pod("ops", "agent", "Running")],
        );
        let events = source.follow(ResourceKind::Pods);

        let store = LiveStateStore::with_kinds(PODS_ONLY);
        store
            .start_with_source(Arc::new(source), "", DEFAULT_START_TIMEOUT)
            .await
            .unwrap();
        let mut signal = store.notify_channel(ResourceKind::Pods);

        events.send(watcher::Event::Apply(pod("shop", "web-2", "Pending"))).unwrap();
        wait_for(&mut signal).await;
        while store.snapshot_lines(ResourceKind::Pods, "").await.len() < 3 {
            wait_for(&mut signal).await;
        }

        events.send(watcher::Event::Delete(pod("ops", "agent", "Running"))).unwrap();
        wait_for(&mut signal).await;
        while store.snapshot_lines(ResourceKind::Pods, "").await.len() > 2 {
            wait_for(&mut signal).await;
        }

        let shop = store.snapshot_lines(ResourceKind::Pods, "shop").await;
        assert_eq!(shop.len(), 2);
        assert!(shop[0].starts_with("web-1 "));
        assert!(shop[1].starts_with("web-2 1/1 Pending"));

        store.stop().await;
        assert!(!signal.changed().await);
    }

    #[tokio::test]
    async fn relist_replaces_previous_objects() {
        let source =
            ScriptedSource::synced(ResourceKind::Pods, vec![pod("shop", "stale", "Running")]);
        let events = source.follow(ResourceKind::Pods);

        let store = LiveStateStore::with_kinds(PODS_ONLY);
        store
            .start_with_source(Arc::new(source), "shop", DEFAULT_START_TIMEOUT)
            .await
            .unwrap();
        let mut signal = store.notify_channel(ResourceKind::Pods);

        for event in initial_listing(vec![pod("shop", "fresh", "Running")]) {
            events.send(event).unwrap();
        }
        loop {
            wait_for(&mut signal).await;
            let lines = store.snapshot_lines(ResourceKind::Pods, "shop").await;
            if lines.iter().any(|l| l.starts_with("fresh ")) {
                assert_eq!(lines.len(), 1);
                break;
            }
        }

        store.stop().await;
    }

    #[tokio::test]
    async fn untracked_kinds_have_closed_signals_and_no_rows() {
        let store = LiveStateStore::with_kinds(PODS_ONLY);
        assert!(!store.notify_channel(ResourceKind::Secrets).changed().await);
        assert!(store.snapshot_lines(ResourceKind::Secrets, "").await.is_empty());
    }
}
