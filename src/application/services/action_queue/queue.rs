use crate::application::ports::{ActionStore, ConnectivityMonitor, ReplayGateway, SyncNotifier};
use crate::domain::entities::{
    ExhaustedAction, QueuedAction, QueuedActionDraft, SkipReason, SyncNotice, SyncOutcome,
    SyncReport,
};
use crate::domain::value_objects::QueuedActionId;
use crate::shared::config::QueueConfig;
use crate::shared::error::AppError;
use crate::shared::metrics::{ReplayMetrics, ReplayMetricsSnapshot};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Durable queue of network mutations, replayed when connectivity returns.
pub struct ActionQueue {
    store: Arc<dyn ActionStore>,
    gateway: Arc<dyn ReplayGateway>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    notifier: Arc<dyn SyncNotifier>,
    config: QueueConfig,
    syncing: AtomicBool,
    metrics: ReplayMetrics,
}

/// Clears the in-progress flag on every exit path of `sync`.
struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl ActionQueue {
    pub fn new(
        store: Arc<dyn ActionStore>,
        gateway: Arc<dyn ReplayGateway>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        notifier: Arc<dyn SyncNotifier>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            connectivity,
            notifier,
            config,
            syncing: AtomicBool::new(false),
            metrics: ReplayMetrics::new(),
        }
    }

    pub async fn enqueue(&self, draft: QueuedActionDraft) -> Result<QueuedActionId, AppError> {
        draft.validate().map_err(AppError::ValidationError)?;
        let new_action = draft.into_new(self.config.max_retries, Utc::now());
        let action = self.store.insert(new_action).await?;

        info!(
            action_id = %action.id,
            kind = %action.kind,
            entity_type = %action.entity_type,
            entity_id = %action.entity_id,
            max_retries = action.max_retries,
            "Queued offline action"
        );

        Ok(action.id)
    }

    pub async fn list_pending(&self) -> Result<Vec<QueuedAction>, AppError> {
        self.store.get_all().await
    }

    /// Removing an unknown id is not an error.
    pub async fn remove(&self, id: QueuedActionId) -> Result<(), AppError> {
        if !self.store.delete(id).await? {
            debug!(action_id = %id, "Queued action already absent");
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, AppError> {
        self.store.count().await
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        let removed = self.store.clear().await?;
        info!(removed, "Cleared offline action queue");
        Ok(())
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn connectivity(&self) -> &Arc<dyn ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn notifier(&self) -> &Arc<dyn SyncNotifier> {
        &self.notifier
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn metrics(&self) -> ReplayMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Replays every queued action once, in store order.
    pub async fn sync(&self) -> Result<SyncOutcome, AppError> {
        if !self.connectivity.is_online() {
            debug!("Skipping offline action sync while offline");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::Offline,
            });
        }

        let Some(_guard) = SyncGuard::acquire(&self.syncing) else {
            debug!("Offline action sync already running");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::AlreadyRunning,
            });
        };

        self.metrics.record_sync_run();
        let actions = self.store.get_all().await?;
        let mut report = SyncReport::default();

        for action in actions {
            report.attempted += 1;
            match self.replay(&action).await {
                Ok(()) => {
                    self.store.delete(action.id).await?;
                    self.metrics.record_success();
                    report.succeeded += 1;
                    debug!(action_id = %action.id, "Replayed offline action");
                }
                Err(err) if action.is_last_attempt() => {
                    self.store.delete(action.id).await?;
                    self.metrics.record_exhausted();
                    warn!(
                        action_id = %action.id,
                        entity_type = %action.entity_type,
                        entity_id = %action.entity_id,
                        attempts = action.retry_count + 1,
                        error = %err,
                        "Offline action exhausted its retries"
                    );
                    let exhausted = ExhaustedAction {
                        id: action.id,
                        kind: action.kind,
                        entity_type: action.entity_type.clone(),
                        entity_id: action.entity_id.clone(),
                        attempts: action.retry_count + 1,
                        last_error: err.to_string(),
                    };
                    self.notifier.notify(SyncNotice::ActionExhausted {
                        action: exhausted.clone(),
                    });
                    report.exhausted.push(exhausted);
                }
                Err(err) => {
                    let retry_count = action.retry_count + 1;
                    let updated = action.with_retry_count(retry_count);
                    match self.store.put(&updated).await {
                        Ok(()) => {}
                        Err(AppError::NotFound(_)) => {
                            debug!(
                                action_id = %updated.id,
                                "Offline action removed during replay; not retrying"
                            );
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                    self.metrics.record_failure();
                    report.retried += 1;
                    warn!(
                        action_id = %updated.id,
                        retry_count,
                        max_retries = updated.max_retries,
                        error = %err,
                        "Offline action replay failed"
                    );
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                retried = report.retried,
                exhausted = report.exhausted.len(),
                "Offline action sync finished"
            );
            self.notifier.notify(SyncNotice::SyncCompleted {
                report: report.clone(),
            });
        }

        Ok(SyncOutcome::Completed { report })
    }

    /// Gives every previously failed action a fresh retry budget, then syncs.
    pub async fn retry_failed(&self) -> Result<SyncOutcome, AppError> {
        let actions = self.store.get_all().await?;
        let mut reset = 0u32;
        for action in actions.into_iter().filter(|a| a.retry_count > 0) {
            self.store.put(&action.with_retry_count(0)).await?;
            reset += 1;
        }
        info!(reset, "Reset retry counters on failed offline actions");

        self.sync().await
    }

    async fn replay(&self, action: &QueuedAction) -> Result<(), AppError> {
        let timeout = self.config.replay_timeout();
        tokio::time::timeout(timeout, self.gateway.replay(action))
            .await
            .inspect_err(|_| {
                debug!(action_id = %action.id, ?timeout, "Replay exceeded its timeout");
            })?
    }
}
