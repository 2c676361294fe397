use super::conflict::{ConflictContext, ConflictResolver, PreferServer};
use super::overlay::overlay_updates;
use crate::domain::entities::OptimisticUpdate;
use crate::domain::value_objects::{
    EntityId, EntityType, MutationKind, OfflinePayload, OptimisticUpdateId, UpdateStatus,
};
use crate::shared::config::LedgerConfig;
use crate::shared::error::AppError;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

type Listener = Arc<dyn Fn(&[OptimisticUpdate]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still pending; the caller should re-issue the request after `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Deadline,
    Backoff,
    Evict,
}

struct LedgerEntry {
    update: OptimisticUpdate,
    /// Bumped whenever timers are re-armed; stale timers compare against it.
    generation: u64,
    deadline: Option<AbortHandle>,
    followup: Option<AbortHandle>,
}

impl LedgerEntry {
    fn cancel_timers(&mut self) {
        if let Some(handle) = self.deadline.take() {
            handle.abort();
        }
        if let Some(handle) = self.followup.take() {
            handle.abort();
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.cancel_timers();
        self.generation += 1;
        self.generation
    }
}

impl Drop for LedgerEntry {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

#[derive(Default)]
struct LedgerState {
    entries: HashMap<OptimisticUpdateId, LedgerEntry>,
    next_sequence: u64,
}

impl LedgerState {
    fn sorted_updates(&self) -> Vec<OptimisticUpdate> {
        let mut updates: Vec<OptimisticUpdate> = self
            .entries
            .values()
            .map(|entry| entry.update.clone())
            .collect();
        updates.sort_by_key(|update| (update.created_at, update.sequence));
        updates
    }

    fn entry_mut(&mut self, id: &OptimisticUpdateId) -> Result<&mut LedgerEntry, AppError> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("optimistic update", id))
    }

    fn take_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

struct LedgerInner {
    config: LedgerConfig,
    resolver: Arc<dyn ConflictResolver>,
    state: RwLock<LedgerState>,
    listeners: StdRwLock<BTreeMap<u64, Listener>>,
    next_listener_id: AtomicU64,
}

/// In-memory set of speculative mutations awaiting server confirmation.
///
/// Cloning shares the same ledger.
#[derive(Clone)]
pub struct OptimisticLedger {
    inner: Arc<LedgerInner>,
}

/// Handle returned by [`OptimisticLedger::subscribe`].
pub struct LedgerSubscription {
    id: u64,
    inner: Weak<LedgerInner>,
}

impl LedgerSubscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}

impl OptimisticLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_resolver(config, Arc::new(PreferServer))
    }

    pub fn with_resolver(config: LedgerConfig, resolver: Arc<dyn ConflictResolver>) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                config,
                resolver,
                state: RwLock::new(LedgerState::default()),
                listeners: StdRwLock::new(BTreeMap::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.inner.config
    }

    pub async fn add_update(
        &self,
        kind: MutationKind,
        entity_type: EntityType,
        entity_id: EntityId,
        data: OfflinePayload,
        original_data: Option<OfflinePayload>,
    ) -> Result<OptimisticUpdateId, AppError> {
        if kind == MutationKind::Update && !data.is_object() {
            return Err(AppError::ValidationError(
                "Update payload must be a JSON object".to_string(),
            ));
        }

        let id = OptimisticUpdateId::generate();
        let snapshot = {
            let mut state = self.inner.state.write().await;
            let sequence = state.take_sequence();
            let update = OptimisticUpdate {
                id: id.clone(),
                kind,
                entity_type,
                entity_id,
                data,
                original_data,
                created_at: Utc::now(),
                sequence,
                status: UpdateStatus::Pending,
                retry_count: 0,
                error: None,
            };
            debug!(
                update_id = %id,
                kind = %update.kind,
                entity_type = %update.entity_type,
                entity_id = %update.entity_id,
                "Recorded optimistic update"
            );

            let mut entry = LedgerEntry {
                update,
                generation: 0,
                deadline: None,
                followup: None,
            };
            let generation = entry.next_generation();
            entry.deadline = Some(self.schedule(
                &id,
                generation,
                self.inner.config.timeout(),
                TimerKind::Deadline,
            ));
            state.entries.insert(id.clone(), entry);
            state.sorted_updates()
        };

        self.inner.emit(&snapshot);
        Ok(id)
    }

    /// Marks a pending update confirmed, resolving any difference with `server_data`.
    pub async fn confirm_update(
        &self,
        id: &OptimisticUpdateId,
        server_data: Option<OfflinePayload>,
    ) -> Result<OptimisticUpdate, AppError> {
        let (confirmed, snapshot) = {
            let mut state = self.inner.state.write().await;
            let entry = state.entry_mut(id)?;
            ensure_status(&entry.update, UpdateStatus::Confirmed)?;

            if let Some(server) = server_data {
                if server != entry.update.data {
                    let resolution = self.inner.resolver.resolve(&ConflictContext {
                        update: &entry.update,
                        client: &entry.update.data,
                        server: &server,
                    });
                    info!(
                        update_id = %id,
                        entity_type = %entry.update.entity_type,
                        entity_id = %entry.update.entity_id,
                        resolution = ?resolution,
                        "Resolved optimistic update conflict"
                    );
                    entry.update.data = resolution.apply(&entry.update.data, &server);
                }
            }

            entry.update.status = UpdateStatus::Confirmed;
            entry.update.error = None;
            let generation = entry.next_generation();
            entry.followup = Some(self.schedule(
                id,
                generation,
                self.inner.config.confirm_grace(),
                TimerKind::Evict,
            ));
            let confirmed = entry.update.clone();
            (confirmed, state.sorted_updates())
        };

        debug!(update_id = %id, "Confirmed optimistic update");
        self.inner.emit(&snapshot);
        Ok(confirmed)
    }

    /// Records a failed attempt, scheduling a retry while the budget lasts.
    pub async fn fail_update(
        &self,
        id: &OptimisticUpdateId,
        error: impl Into<String>,
    ) -> Result<FailureOutcome, AppError> {
        let error = error.into();
        let (outcome, snapshot) = {
            let mut state = self.inner.state.write().await;
            let entry = state.entry_mut(id)?;
            ensure_status(&entry.update, UpdateStatus::Failed)?;
            entry.update.error = Some(error.clone());

            let outcome = if entry.update.retry_count < self.inner.config.max_retries {
                entry.update.retry_count += 1;
                let attempt = entry.update.retry_count;
                let delay = backoff_delay(self.inner.config.retry_delay(), attempt);
                let generation = entry.next_generation();
                entry.followup = Some(self.schedule(id, generation, delay, TimerKind::Backoff));
                warn!(
                    update_id = %id,
                    attempt,
                    ?delay,
                    error = %error,
                    "Optimistic update failed; retrying"
                );
                FailureOutcome::RetryScheduled { attempt, delay }
            } else {
                entry.update.status = UpdateStatus::Failed;
                entry.next_generation();
                warn!(update_id = %id, error = %error, "Optimistic update failed permanently");
                FailureOutcome::Failed
            };
            (outcome, state.sorted_updates())
        };

        self.inner.emit(&snapshot);
        Ok(outcome)
    }

    /// Moves a pending update straight to failed, skipping the retry budget.
    pub async fn reject_update(
        &self,
        id: &OptimisticUpdateId,
        error: impl Into<String>,
    ) -> Result<(), AppError> {
        let snapshot = {
            let mut state = self.inner.state.write().await;
            let entry = state.entry_mut(id)?;
            ensure_status(&entry.update, UpdateStatus::Failed)?;
            entry.update.status = UpdateStatus::Failed;
            entry.update.error = Some(error.into());
            entry.next_generation();
            state.sorted_updates()
        };

        self.inner.emit(&snapshot);
        Ok(())
    }

    pub async fn retry_update(&self, id: &OptimisticUpdateId) -> Result<(), AppError> {
        let snapshot = {
            let mut state = self.inner.state.write().await;
            let sequence = state.take_sequence();
            let entry = state.entry_mut(id)?;
            ensure_status(&entry.update, UpdateStatus::Pending)?;

            entry.update.status = UpdateStatus::Pending;
            entry.update.retry_count = 0;
            entry.update.error = None;
            entry.update.created_at = Utc::now();
            entry.update.sequence = sequence;
            let generation = entry.next_generation();
            entry.deadline = Some(self.schedule(
                id,
                generation,
                self.inner.config.timeout(),
                TimerKind::Deadline,
            ));
            state.sorted_updates()
        };

        info!(update_id = %id, "Retrying optimistic update");
        self.inner.emit(&snapshot);
        Ok(())
    }

    /// Drops an update without reconciling it. Returns it so callers can roll back.
    pub async fn cancel_update(&self, id: &OptimisticUpdateId) -> Option<OptimisticUpdate> {
        let (removed, snapshot) = {
            let mut state = self.inner.state.write().await;
            let removed = state.entries.remove(id)?;
            (removed.update.clone(), state.sorted_updates())
        };

        debug!(update_id = %id, "Cancelled optimistic update");
        self.inner.emit(&snapshot);
        Some(removed)
    }

    pub async fn clear_updates(&self) {
        let snapshot = {
            let mut state = self.inner.state.write().await;
            state.entries.clear();
            state.sorted_updates()
        };
        self.inner.emit(&snapshot);
    }

    pub async fn get_update(&self, id: &OptimisticUpdateId) -> Option<OptimisticUpdate> {
        let state = self.inner.state.read().await;
        state.entries.get(id).map(|entry| entry.update.clone())
    }

    pub async fn all_updates(&self) -> Vec<OptimisticUpdate> {
        self.inner.state.read().await.sorted_updates()
    }

    pub async fn get_pending_updates(&self) -> Vec<OptimisticUpdate> {
        self.with_status(UpdateStatus::Pending).await
    }

    pub async fn get_failed_updates(&self) -> Vec<OptimisticUpdate> {
        self.with_status(UpdateStatus::Failed).await
    }

    pub async fn get_entity_updates(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Vec<OptimisticUpdate> {
        self.all_updates()
            .await
            .into_iter()
            .filter(|update| update.targets(entity_type, entity_id))
            .collect()
    }

    /// Renders `base` with every pending update for `entity_type` applied.
    pub async fn apply_updates<T, F>(
        &self,
        base: &[T],
        entity_type: &EntityType,
        id_of: F,
    ) -> Result<Vec<T>, AppError>
    where
        T: Clone + Serialize + DeserializeOwned,
        F: Fn(&T) -> String,
    {
        let updates = self.all_updates().await;
        overlay_updates(base, &updates, entity_type, id_of)
    }

    /// Registers a listener called with the full update list after every change.
    pub fn subscribe<F>(&self, listener: F) -> LedgerSubscription
    where
        F: Fn(&[OptimisticUpdate]) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        LedgerSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    async fn with_status(&self, status: UpdateStatus) -> Vec<OptimisticUpdate> {
        self.all_updates()
            .await
            .into_iter()
            .filter(|update| update.status == status)
            .collect()
    }

    fn schedule(
        &self,
        id: &OptimisticUpdateId,
        generation: u64,
        delay: Duration,
        kind: TimerKind,
    ) -> AbortHandle {
        spawn_timer(Arc::downgrade(&self.inner), id.clone(), generation, delay, kind)
    }
}

impl LedgerInner {
    fn emit(&self, snapshot: &[OptimisticUpdate]) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    async fn fire(self: Arc<Self>, id: &OptimisticUpdateId, generation: u64, kind: TimerKind) {
        let snapshot = {
            let mut state = self.state.write().await;
            let Some(entry) = state.entries.get_mut(id) else {
                return;
            };
            if entry.generation != generation {
                return;
            }

            match kind {
                TimerKind::Deadline => {
                    // This task is the deadline; release it without aborting itself.
                    entry.deadline = None;
                    if entry.update.status != UpdateStatus::Pending {
                        return;
                    }
                    entry.update.status = UpdateStatus::Failed;
                    entry.update.error = Some(format!(
                        "Update timed out after {}ms",
                        self.config.timeout_ms
                    ));
                    warn!(update_id = %id, "Optimistic update timed out");
                }
                TimerKind::Backoff => {
                    entry.followup = None;
                    if entry.update.status != UpdateStatus::Pending {
                        return;
                    }
                    entry.generation += 1;
                    let weak = Arc::downgrade(&self);
                    entry.deadline = Some(spawn_timer(
                        weak,
                        id.clone(),
                        entry.generation,
                        self.config.timeout(),
                        TimerKind::Deadline,
                    ));
                    debug!(
                        update_id = %id,
                        attempt = entry.update.retry_count,
                        "Optimistic update ready for retry"
                    );
                }
                TimerKind::Evict => {
                    entry.followup = None;
                    if entry.update.status != UpdateStatus::Confirmed {
                        return;
                    }
                    state.entries.remove(id);
                    debug!(update_id = %id, "Evicted confirmed optimistic update");
                }
            }
            state.sorted_updates()
        };

        self.emit(&snapshot);
    }
}

fn spawn_timer(
    inner: Weak<LedgerInner>,
    id: OptimisticUpdateId,
    generation: u64,
    delay: Duration,
    kind: TimerKind,
) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = inner.upgrade() {
            inner.fire(&id, generation, kind).await;
        }
    })
    .abort_handle()
}

fn ensure_status(update: &OptimisticUpdate, next: UpdateStatus) -> Result<(), AppError> {
    if update.status.can_transition_to(next) {
        return Ok(());
    }
    Err(AppError::InvalidState(format!(
        "optimistic update {} cannot move from {} to {}",
        update.id,
        update.status.as_str(),
        next.as_str()
    )))
}

/// `base × 2^(attempt-1)`
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}
