use super::optimistic_ledger::OptimisticLedger;
use crate::domain::value_objects::{
    EntityId, EntityType, MutationKind, OfflinePayload, OptimisticUpdateId,
};
use crate::shared::error::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio::sync::RwLock;
use tracing::{debug, warn};

type IdExtractor<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// A confirmed collection of `T` with optimistic create/update/delete on top.
///
/// Each operation records an optimistic update, runs the server call, and then
/// either commits the server's value or marks the update failed so it drops out
/// of [`view`](Self::view).
pub struct OptimisticCollection<T> {
    ledger: OptimisticLedger,
    entity_type: EntityType,
    id_of: IdExtractor<T>,
    canonical: RwLock<Vec<T>>,
}

impl<T> OptimisticCollection<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new<F>(ledger: OptimisticLedger, entity_type: EntityType, id_of: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            ledger,
            entity_type,
            id_of: Box::new(id_of),
            canonical: RwLock::new(Vec::new()),
        }
    }

    pub fn ledger(&self) -> &OptimisticLedger {
        &self.ledger
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub async fn canonical(&self) -> Vec<T> {
        self.canonical.read().await.clone()
    }

    pub async fn replace_canonical(&self, items: Vec<T>) {
        *self.canonical.write().await = items;
    }

    /// The confirmed items with every pending update overlaid.
    pub async fn view(&self) -> Result<Vec<T>, AppError> {
        let canonical = self.canonical.read().await.clone();
        self.ledger
            .apply_updates(&canonical, &self.entity_type, |item| (self.id_of)(item))
            .await
    }

    pub async fn create<F, Fut>(&self, item: T, server: F) -> Result<T, AppError>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let entity_id = self.entity_id_of(&item)?;
        let update_id = self
            .ledger
            .add_update(
                MutationKind::Create,
                self.entity_type.clone(),
                entity_id,
                OfflinePayload::from_serializable(&item)?,
                None,
            )
            .await?;

        match server(item).await {
            Ok(saved) => {
                let server_data = OfflinePayload::from_serializable(&saved)?;
                self.upsert(saved.clone()).await;
                self.confirm(&update_id, Some(server_data)).await?;
                Ok(saved)
            }
            Err(err) => {
                self.mark_failed(&update_id, &err).await;
                Err(err)
            }
        }
    }

    /// Shallow-merges `patch` into the item with `id` until the server answers.
    pub async fn update<P, F, Fut>(
        &self,
        id: &EntityId,
        patch: &P,
        server: F,
    ) -> Result<T, AppError>
    where
        P: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let original = self.snapshot_of(id).await?;
        let update_id = self
            .ledger
            .add_update(
                MutationKind::Update,
                self.entity_type.clone(),
                id.clone(),
                OfflinePayload::from_serializable(patch)?,
                original,
            )
            .await?;

        match server().await {
            Ok(saved) => {
                let server_data = OfflinePayload::from_serializable(&saved)?;
                self.upsert(saved.clone()).await;
                self.confirm(&update_id, Some(server_data)).await?;
                Ok(saved)
            }
            Err(err) => {
                self.mark_failed(&update_id, &err).await;
                Err(err)
            }
        }
    }

    pub async fn delete<F, Fut>(&self, id: &EntityId, server: F) -> Result<(), AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        let original = self.snapshot_of(id).await?;
        let update_id = self
            .ledger
            .add_update(
                MutationKind::Delete,
                self.entity_type.clone(),
                id.clone(),
                OfflinePayload::empty_object(),
                original,
            )
            .await?;

        match server().await {
            Ok(()) => {
                self.canonical
                    .write()
                    .await
                    .retain(|item| (self.id_of)(item) != id.as_str());
                self.confirm(&update_id, None).await
            }
            Err(err) => {
                self.mark_failed(&update_id, &err).await;
                Err(err)
            }
        }
    }

    fn entity_id_of(&self, item: &T) -> Result<EntityId, AppError> {
        EntityId::new((self.id_of)(item)).map_err(AppError::ValidationError)
    }

    async fn snapshot_of(&self, id: &EntityId) -> Result<Option<OfflinePayload>, AppError> {
        let canonical = self.canonical.read().await;
        canonical
            .iter()
            .find(|item| (self.id_of)(item) == id.as_str())
            .map(OfflinePayload::from_serializable)
            .transpose()
    }

    async fn upsert(&self, item: T) {
        let key = (self.id_of)(&item);
        let mut canonical = self.canonical.write().await;
        match canonical.iter_mut().find(|existing| (self.id_of)(existing) == key) {
            Some(existing) => *existing = item,
            None => canonical.push(item),
        }
    }

    async fn confirm(
        &self,
        update_id: &OptimisticUpdateId,
        server_data: Option<OfflinePayload>,
    ) -> Result<(), AppError> {
        match self.ledger.confirm_update(update_id, server_data).await {
            Ok(_) => Ok(()),
            // Timed out or cancelled while the server call was in flight; the
            // server result is already committed.
            Err(AppError::InvalidState(_)) | Err(AppError::NotFound(_)) => {
                warn!(update_id = %update_id, "Server confirmed a settled optimistic update");
                self.ledger.cancel_update(update_id).await;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn mark_failed(&self, update_id: &OptimisticUpdateId, err: &AppError) {
        if let Err(reject_err) = self.ledger.reject_update(update_id, err.to_string()).await {
            debug!(
                update_id = %update_id,
                error = %reject_err,
                "Optimistic update already settled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::UpdateStatus;
    use crate::shared::config::LedgerConfig;
    use serde::Deserialize;
    use serde_json::json;
    use tokio::sync::oneshot;
    use tokio::time::{Duration, sleep};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shift {
        id: String,
        crew: String,
        #[serde(default)]
        hours: u32,
    }

    fn shift(id: &str, crew: &str, hours: u32) -> Shift {
        Shift {
            id: id.to_string(),
            crew: crew.to_string(),
            hours,
        }
    }

    fn collection() -> OptimisticCollection<Shift> {
        OptimisticCollection::new(
            OptimisticLedger::new(LedgerConfig::default()),
            EntityType::parse("shift").unwrap(),
            |s: &Shift| s.id.clone(),
        )
    }

    fn entity(id: &str) -> EntityId {
        EntityId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn create_shows_immediately_and_commits_server_value() {
        let shifts = collection();

        let (release, released) = oneshot::channel::<()>();
        let create = shifts.create(shift("s1", "A", 12), |item| async move {
            released.await.unwrap();
            Ok(Shift { hours: 10, ..item })
        });
        let observe = async {
            loop {
                let view = shifts.view().await.unwrap();
                if !view.is_empty() {
                    assert_eq!(view, vec![shift("s1", "A", 12)]);
                    assert!(shifts.canonical().await.is_empty());
                    break;
                }
                tokio::task::yield_now().await;
            }
            release.send(()).unwrap();
        };
        let (created, ()) = tokio::join!(create, observe);

        assert_eq!(created.unwrap(), shift("s1", "A", 10));
        assert_eq!(shifts.canonical().await, vec![shift("s1", "A", 10)]);
        assert_eq!(shifts.view().await.unwrap(), vec![shift("s1", "A", 10)]);
    }

    #[tokio::test]
    async fn failed_create_reverts_the_view() {
        let shifts = collection();

        let result = shifts
            .create(shift("s1", "A", 12), |_item| async {
                Err(AppError::Network("HTTP 500".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Network(_))));
        assert!(shifts.canonical().await.is_empty());
        assert!(shifts.view().await.unwrap().is_empty());
        let failed = shifts.ledger().get_failed_updates().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, UpdateStatus::Failed);
    }

    #[tokio::test]
    async fn update_keeps_original_snapshot_and_commits_server_copy() {
        let shifts = collection();
        shifts.replace_canonical(vec![shift("s1", "A", 12)]).await;

        let saved = shifts
            .update(&entity("s1"), &json!({"crew": "B"}), || async {
                Ok(shift("s1", "B", 12))
            })
            .await
            .unwrap();

        assert_eq!(saved, shift("s1", "B", 12));
        assert_eq!(shifts.canonical().await, vec![shift("s1", "B", 12)]);
        let updates = shifts
            .ledger()
            .get_entity_updates(shifts.entity_type(), &entity("s1"))
            .await;
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].original_data.as_ref().unwrap().as_json()["crew"],
            "A"
        );
    }

    #[tokio::test]
    async fn failed_update_leaves_canonical_untouched() {
        let shifts = collection();
        shifts.replace_canonical(vec![shift("s1", "A", 12)]).await;

        let result = shifts
            .update(&entity("s1"), &json!({"crew": "B"}), || async {
                Err(AppError::Network("HTTP 409".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(shifts.view().await.unwrap(), vec![shift("s1", "A", 12)]);
    }

    #[tokio::test]
    async fn delete_removes_from_canonical() {
        let shifts = collection();
        shifts
            .replace_canonical(vec![shift("s1", "A", 12), shift("s2", "B", 12)])
            .await;

        shifts.delete(&entity("s1"), || async { Ok(()) }).await.unwrap();

        assert_eq!(shifts.canonical().await, vec![shift("s2", "B", 12)]);
        assert_eq!(shifts.view().await.unwrap(), vec![shift("s2", "B", 12)]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_success_after_timeout_still_commits() {
        let shifts = collection();

        let saved = shifts
            .create(shift("s1", "A", 12), |item| async move {
                sleep(Duration::from_secs(11)).await;
                Ok(item)
            })
            .await
            .unwrap();

        assert_eq!(saved, shift("s1", "A", 12));
        assert_eq!(shifts.canonical().await, vec![saved]);
        assert!(shifts.ledger().all_updates().await.is_empty());
    }
}
