use super::*;
use crate::application::ports::{ActionStore, ReplayGateway, SyncNotifier};
use crate::domain::entities::{QueuedAction, QueuedActionDraft, SkipReason, SyncNotice, SyncOutcome};
use crate::domain::value_objects::{EntityId, EntityType, HttpMethod, MutationKind, OfflinePayload};
use crate::infrastructure::network::SharedConnectivity;
use crate::infrastructure::notifications::ChannelNotifier;
use crate::infrastructure::offline::InMemoryActionStore;
use crate::shared::config::QueueConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use mockall::mock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::{Notify, broadcast};
use tokio::time::{Duration, timeout};

mock! {
    pub Gateway {}

    #[async_trait]
    impl ReplayGateway for Gateway {
        async fn replay(&self, action: &QueuedAction) -> Result<(), AppError>;
    }
}

/// Replays succeed unless a failure was scripted for the entity id.
#[derive(Default)]
struct ScriptedGateway {
    failures: Mutex<HashMap<String, VecDeque<String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn fail_next(&self, entity_id: &str, times: usize) {
        let mut failures = self.failures.lock().unwrap();
        let queue = failures.entry(entity_id.to_string()).or_default();
        for attempt in 0..times {
            queue.push_back(format!("HTTP 503 on attempt {attempt}"));
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplayGateway for ScriptedGateway {
    async fn replay(&self, action: &QueuedAction) -> Result<(), AppError> {
        let entity_id = action.entity_id.to_string();
        self.calls.lock().unwrap().push(entity_id.clone());
        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&entity_id)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(message) => Err(AppError::Network(message)),
            None => Ok(()),
        }
    }
}

/// Blocks every replay until released.
struct GatedGateway {
    release: Notify,
    entered: Notify,
}

#[async_trait]
impl ReplayGateway for GatedGateway {
    async fn replay(&self, _action: &QueuedAction) -> Result<(), AppError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

struct HangingGateway;

#[async_trait]
impl ReplayGateway for HangingGateway {
    async fn replay(&self, _action: &QueuedAction) -> Result<(), AppError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

struct Harness {
    queue: Arc<ActionQueue>,
    store: Arc<InMemoryActionStore>,
    connectivity: Arc<SharedConnectivity>,
    notices: broadcast::Receiver<SyncNotice>,
}

fn harness_with(gateway: Arc<dyn ReplayGateway>, online: bool, config: QueueConfig) -> Harness {
    let store = Arc::new(InMemoryActionStore::new());
    let connectivity = Arc::new(SharedConnectivity::new(online));
    let notifier = Arc::new(ChannelNotifier::new(32));
    let notices = notifier.subscribe();
    let queue = Arc::new(ActionQueue::new(
        store.clone() as Arc<dyn ActionStore>,
        gateway,
        connectivity.clone(),
        notifier as Arc<dyn SyncNotifier>,
        config,
    ));
    Harness {
        queue,
        store,
        connectivity,
        notices,
    }
}

fn draft(entity_id: &str) -> QueuedActionDraft {
    QueuedActionDraft::new(
        MutationKind::Update,
        EntityType::parse("attendance").unwrap(),
        EntityId::parse(entity_id).unwrap(),
        HttpMethod::Put,
        format!("https://api.example.test/attendance/{entity_id}"),
    )
    .with_body(OfflinePayload::from_json_str(r#"{"status":"present"}"#).unwrap())
    .with_header("X-Client", "dashboard")
}

fn drain(notices: &mut broadcast::Receiver<SyncNotice>) -> Vec<SyncNotice> {
    let mut out = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        out.push(notice);
    }
    out
}

#[tokio::test]
async fn enqueue_persists_with_zero_retries_and_default_budget() {
    let h = harness_with(Arc::new(ScriptedGateway::default()), true, QueueConfig::default());

    let id = h.queue.enqueue(draft("att-1")).await.unwrap();
    let pending = h.queue.list_pending().await.unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].retry_count, 0);
    assert_eq!(pending[0].max_retries, 3);
    assert_eq!(pending[0].headers.get("X-Client").map(String::as_str), Some("dashboard"));
    assert_eq!(h.queue.count().await.unwrap(), 1);
}

#[tokio::test]
async fn enqueue_rejects_invalid_drafts() {
    let h = harness_with(Arc::new(ScriptedGateway::default()), true, QueueConfig::default());

    let zero_budget = draft("att-1").with_max_retries(0);
    assert!(matches!(
        h.queue.enqueue(zero_budget).await,
        Err(AppError::ValidationError(_))
    ));

    let mut no_url = draft("att-2");
    no_url.url = "  ".to_string();
    assert!(h.queue.enqueue(no_url).await.is_err());
    assert_eq!(h.queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn successful_replay_removes_action() {
    let gateway = Arc::new(ScriptedGateway::default());
    let mut h = harness_with(gateway.clone(), true, QueueConfig::default());
    let id = h.queue.enqueue(draft("att-1")).await.unwrap();

    let outcome = h.queue.sync().await.unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert!(h.queue.list_pending().await.unwrap().iter().all(|a| a.id != id));
    assert_eq!(gateway.calls(), vec!["att-1".to_string()]);
    assert!(matches!(
        drain(&mut h.notices).as_slice(),
        [SyncNotice::SyncCompleted { .. }]
    ));
    assert_eq!(h.queue.metrics().successes, 1);
}

#[tokio::test]
async fn failed_first_replay_keeps_only_that_action() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.fail_next("att-1", 1);
    let h = harness_with(gateway.clone(), true, QueueConfig::default());
    let first = h.queue.enqueue(draft("att-1")).await.unwrap();
    h.queue.enqueue(draft("att-2")).await.unwrap();
    h.queue.enqueue(draft("att-3")).await.unwrap();

    let outcome = h.queue.sync().await.unwrap();

    let pending = h.queue.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, first);
    assert_eq!(pending[0].retry_count, 1);
    assert_eq!(gateway.calls(), vec!["att-1", "att-2", "att-3"]);

    let report = outcome.report().unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.retried, 1);
    assert!(report.exhausted.is_empty());
}

#[tokio::test]
async fn exhausted_action_is_removed_with_one_notice() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.fail_next("att-1", 5);
    let mut h = harness_with(gateway.clone(), true, QueueConfig::default());
    let id = h
        .queue
        .enqueue(draft("att-1").with_max_retries(2))
        .await
        .unwrap();

    h.queue.sync().await.unwrap();
    let after_first = h.queue.list_pending().await.unwrap();
    assert_eq!(after_first[0].retry_count, 1);

    let outcome = h.queue.sync().await.unwrap();
    assert!(h.queue.list_pending().await.unwrap().is_empty());
    assert_eq!(outcome.report().unwrap().exhausted.len(), 1);

    // A third sync has nothing left to replay.
    h.queue.sync().await.unwrap();
    assert_eq!(gateway.calls().len(), 2);

    let exhausted: Vec<_> = drain(&mut h.notices)
        .into_iter()
        .filter_map(|notice| match notice {
            SyncNotice::ActionExhausted { action } => Some(action),
            _ => None,
        })
        .collect();
    assert_eq!(exhausted.len(), 1);
    assert_eq!(exhausted[0].id, id);
    assert_eq!(exhausted[0].attempts, 2);
    assert_eq!(h.queue.metrics().exhausted, 1);
}

#[tokio::test]
async fn sync_is_skipped_while_offline() {
    let mut gateway = MockGateway::new();
    gateway.expect_replay().never();
    let h = harness_with(Arc::new(gateway), false, QueueConfig::default());
    h.queue.enqueue(draft("att-1")).await.unwrap();

    let outcome = h.queue.sync().await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Skipped {
            reason: SkipReason::Offline
        }
    );
    assert_eq!(h.queue.count().await.unwrap(), 1);
}

#[tokio::test]
async fn mock_gateway_sees_each_action_once_per_sync() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_replay()
        .times(2)
        .returning(|action| {
            if action.entity_id.as_str() == "att-1" {
                Err(AppError::Network("HTTP 422".into()))
            } else {
                Ok(())
            }
        });
    let h = harness_with(Arc::new(gateway), true, QueueConfig::default());
    h.queue.enqueue(draft("att-1")).await.unwrap();
    h.queue.enqueue(draft("att-2")).await.unwrap();

    h.queue.sync().await.unwrap();

    // Client errors are retried like any other failure.
    let pending = h.queue.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].entity_id.as_str(), "att-1");
}

#[tokio::test]
async fn overlapping_sync_is_skipped() {
    let gateway = Arc::new(GatedGateway {
        release: Notify::new(),
        entered: Notify::new(),
    });
    let h = harness_with(gateway.clone(), true, QueueConfig::default());
    h.queue.enqueue(draft("att-1")).await.unwrap();

    let queue = h.queue.clone();
    let running = tokio::spawn(async move { queue.sync().await });
    gateway.entered.notified().await;
    assert!(h.queue.is_syncing());

    let second = h.queue.sync().await.unwrap();
    assert_eq!(
        second,
        SyncOutcome::Skipped {
            reason: SkipReason::AlreadyRunning
        }
    );

    gateway.release.notify_one();
    let first = running.await.unwrap().unwrap();
    assert_eq!(first.report().unwrap().succeeded, 1);
    assert!(!h.queue.is_syncing());
}

#[tokio::test(start_paused = true)]
async fn stuck_replay_times_out_and_counts_as_failure() {
    let config = QueueConfig {
        replay_timeout_secs: 5,
        ..QueueConfig::default()
    };
    let h = harness_with(Arc::new(HangingGateway), true, config);
    h.queue.enqueue(draft("att-1")).await.unwrap();

    let outcome = h.queue.sync().await.unwrap();

    assert_eq!(outcome.report().unwrap().retried, 1);
    assert_eq!(h.queue.list_pending().await.unwrap()[0].retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_final_attempt_reports_timeout_error() {
    let config = QueueConfig {
        replay_timeout_secs: 5,
        ..QueueConfig::default()
    };
    let h = harness_with(Arc::new(HangingGateway), true, config);
    h.queue
        .enqueue(draft("att-1").with_max_retries(1))
        .await
        .unwrap();

    let outcome = h.queue.sync().await.unwrap();

    let exhausted = &outcome.report().unwrap().exhausted;
    assert_eq!(exhausted.len(), 1);
    assert!(exhausted[0].last_error.starts_with("Timeout:"));
}

#[tokio::test]
async fn retry_failed_resets_counters_then_syncs() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.fail_next("att-1", 2);
    let h = harness_with(gateway.clone(), true, QueueConfig::default());
    h.queue.enqueue(draft("att-1")).await.unwrap();

    h.queue.sync().await.unwrap();
    h.queue.sync().await.unwrap();
    assert_eq!(h.queue.list_pending().await.unwrap()[0].retry_count, 2);

    h.connectivity.set_online(false);
    let outcome = h.queue.retry_failed().await.unwrap();
    assert!(outcome.is_skipped());
    assert_eq!(h.queue.list_pending().await.unwrap()[0].retry_count, 0);

    h.connectivity.set_online(true);
    let outcome = h.queue.retry_failed().await.unwrap();
    assert_eq!(outcome.report().unwrap().succeeded, 1);
    assert_eq!(h.queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn remove_and_clear() {
    let h = harness_with(Arc::new(ScriptedGateway::default()), true, QueueConfig::default());
    let id = h.queue.enqueue(draft("att-1")).await.unwrap();
    h.queue.enqueue(draft("att-2")).await.unwrap();

    h.queue.remove(id).await.unwrap();
    h.queue.remove(id).await.unwrap();
    assert_eq!(h.queue.count().await.unwrap(), 1);

    h.queue.clear().await.unwrap();
    assert_eq!(h.store.count().await.unwrap(), 0);
}

/// Deletes the action it is replaying before failing it.
struct SelfRemovingGateway {
    store: Arc<InMemoryActionStore>,
    target: String,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ReplayGateway for SelfRemovingGateway {
    async fn replay(&self, action: &QueuedAction) -> Result<(), AppError> {
        self.calls.lock().unwrap().push(action.entity_id.to_string());
        if action.entity_id.as_str() == self.target {
            self.store.delete(action.id).await?;
            return Err(AppError::Network("HTTP 503".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn action_removed_during_replay_does_not_abort_sync() {
    let store = Arc::new(InMemoryActionStore::new());
    let gateway = Arc::new(SelfRemovingGateway {
        store: store.clone(),
        target: "att-1".to_string(),
        calls: Mutex::new(Vec::new()),
    });
    let queue = ActionQueue::new(
        store.clone(),
        gateway.clone(),
        Arc::new(SharedConnectivity::new(true)),
        Arc::new(ChannelNotifier::default()),
        QueueConfig::default(),
    );
    queue.enqueue(draft("att-1")).await.unwrap();
    queue.enqueue(draft("att-2")).await.unwrap();

    let outcome = queue.sync().await.unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.retried, 0);
    assert_eq!(*gateway.calls.lock().unwrap(), vec!["att-1", "att-2"]);
    assert_eq!(queue.count().await.unwrap(), 0);
    assert!(!queue.is_syncing());
}

#[tokio::test]
async fn store_errors_release_the_sync_guard() {
    struct BrokenStore;

    #[async_trait]
    impl ActionStore for BrokenStore {
        async fn insert(
            &self,
            _action: crate::domain::entities::NewQueuedAction,
        ) -> Result<QueuedAction, AppError> {
            Err(AppError::Storage("unavailable".into()))
        }
        async fn put(&self, _action: &QueuedAction) -> Result<(), AppError> {
            Err(AppError::Storage("unavailable".into()))
        }
        async fn get_all(&self) -> Result<Vec<QueuedAction>, AppError> {
            Err(AppError::Storage("unavailable".into()))
        }
        async fn delete(
            &self,
            _id: crate::domain::value_objects::QueuedActionId,
        ) -> Result<bool, AppError> {
            Err(AppError::Storage("unavailable".into()))
        }
        async fn clear(&self) -> Result<u64, AppError> {
            Err(AppError::Storage("unavailable".into()))
        }
        async fn count(&self) -> Result<u64, AppError> {
            Err(AppError::Storage("unavailable".into()))
        }
    }

    let queue = ActionQueue::new(
        Arc::new(BrokenStore),
        Arc::new(ScriptedGateway::default()),
        Arc::new(SharedConnectivity::new(true)),
        Arc::new(ChannelNotifier::default()),
        QueueConfig::default(),
    );

    assert!(queue.enqueue(draft("att-1")).await.is_err());
    assert!(matches!(queue.sync().await, Err(AppError::Storage(_))));
    assert!(!queue.is_syncing());
}

#[tokio::test]
async fn reconnect_triggers_exactly_one_sync() {
    let gateway = Arc::new(ScriptedGateway::default());
    let mut h = harness_with(gateway.clone(), true, QueueConfig::default());
    h.queue.enqueue(draft("att-1")).await.unwrap();
    let watcher = spawn_reconnect_sync(h.queue.clone());

    h.connectivity.set_online(false);
    h.connectivity.set_online(true);

    let mut seen = Vec::new();
    while !matches!(seen.last(), Some(SyncNotice::SyncCompleted { .. })) {
        let notice = timeout(Duration::from_secs(2), h.notices.recv())
            .await
            .expect("sync after reconnect")
            .unwrap();
        seen.push(notice);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    seen.extend(drain(&mut h.notices));

    assert_eq!(seen[0], SyncNotice::ConnectionLost);
    assert_eq!(seen[1], SyncNotice::ConnectionRestored);
    assert_eq!(seen[2], SyncNotice::SyncStarted { pending: 1 });
    assert_eq!(
        seen.iter()
            .filter(|n| matches!(n, SyncNotice::SyncCompleted { .. }))
            .count(),
        1
    );
    assert_eq!(gateway.calls().len(), 1);
    assert_eq!(h.queue.metrics().sync_runs, 1);

    watcher.abort();
}

#[tokio::test]
async fn reconnect_watcher_respects_auto_sync_flag() {
    let gateway = Arc::new(ScriptedGateway::default());
    let config = QueueConfig {
        auto_sync: false,
        ..QueueConfig::default()
    };
    let mut h = harness_with(gateway.clone(), false, config);
    h.queue.enqueue(draft("att-1")).await.unwrap();
    let watcher = spawn_reconnect_sync(h.queue.clone());

    h.connectivity.set_online(true);
    let notice = timeout(Duration::from_secs(2), h.notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice, SyncNotice::ConnectionRestored);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(gateway.calls().is_empty());
    assert_eq!(h.queue.count().await.unwrap(), 1);
    watcher.abort();
}
