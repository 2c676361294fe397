use super::mappers::{body_to_json, headers_to_json, queued_action_from_row};
use super::rows::QueuedActionRow;
use crate::application::ports::ActionStore;
use crate::domain::entities::{NewQueuedAction, QueuedAction};
use crate::domain::value_objects::QueuedActionId;
use crate::shared::config::DatabaseConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqlitePoolOptions};
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// SQLite-backed queue storage.
///
/// The pool is opened on first use. A failed open is reported to the caller and
/// attempted again on the next call.
pub struct SqliteActionStore {
    config: Option<DatabaseConfig>,
    pool: OnceCell<Pool<Sqlite>>,
}

impl SqliteActionStore {
    pub fn lazy(config: DatabaseConfig) -> Self {
        Self {
            config: Some(config),
            pool: OnceCell::new(),
        }
    }

    /// Wraps an already open pool and applies the schema migrations.
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self, AppError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            config: None,
            pool: OnceCell::new_with(Some(pool)),
        })
    }

    async fn pool(&self) -> Result<&Pool<Sqlite>, AppError> {
        self.pool
            .get_or_try_init(|| async {
                let config = self.config.as_ref().ok_or_else(|| {
                    AppError::ConfigurationError("No database configured".to_string())
                })?;
                open_pool(config).await.inspect_err(|err| {
                    warn!(error = %err, "Failed to open offline action store");
                })
            })
            .await
    }
}

async fn open_pool(config: &DatabaseConfig) -> Result<Pool<Sqlite>, AppError> {
    if let Some(parent) = sqlite_file_path(&config.url).and_then(|p| p.parent().map(PathBuf::from))
    {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(&parent).map_err(|err| AppError::Storage(err.to_string()))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    info!("Offline action store connected: {}", config.url);

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Extracts the on-disk path of a `sqlite:` URL, `None` for in-memory databases.
fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

#[async_trait]
impl ActionStore for SqliteActionStore {
    async fn insert(&self, action: NewQueuedAction) -> Result<QueuedAction, AppError> {
        let pool = self.pool().await?;
        let headers = headers_to_json(&action.headers)?;

        let result = sqlx::query(
            r#"
            INSERT INTO queued_actions (
                kind, entity_type, entity_id, url, method,
                body, headers, created_at, retry_count, max_retries
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(action.kind.as_str())
        .bind(action.entity_type.as_str())
        .bind(action.entity_id.as_str())
        .bind(&action.url)
        .bind(action.method.as_str())
        .bind(body_to_json(action.body.as_ref()))
        .bind(&headers)
        .bind(action.created_at.timestamp_millis())
        .bind(i64::from(action.retry_count))
        .bind(i64::from(action.max_retries))
        .execute(pool)
        .await?;

        let id = QueuedActionId::new(result.last_insert_rowid()).map_err(AppError::Database)?;
        Ok(QueuedAction::from_new(id, action))
    }

    async fn put(&self, action: &QueuedAction) -> Result<(), AppError> {
        let pool = self.pool().await?;
        let headers = headers_to_json(&action.headers)?;

        let result = sqlx::query(
            r#"
            UPDATE queued_actions
            SET kind = ?1, entity_type = ?2, entity_id = ?3, url = ?4, method = ?5,
                body = ?6, headers = ?7, retry_count = ?8, max_retries = ?9
            WHERE id = ?10
            "#,
        )
        .bind(action.kind.as_str())
        .bind(action.entity_type.as_str())
        .bind(action.entity_id.as_str())
        .bind(&action.url)
        .bind(action.method.as_str())
        .bind(body_to_json(action.body.as_ref()))
        .bind(&headers)
        .bind(i64::from(action.retry_count))
        .bind(i64::from(action.max_retries))
        .bind(action.id.value())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("queued action", action.id));
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<QueuedAction>, AppError> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, QueuedActionRow>(
            r#"
            SELECT id, kind, entity_type, entity_id, url, method,
                   body, headers, created_at, retry_count, max_retries
            FROM queued_actions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(queued_action_from_row).collect()
    }

    async fn delete(&self, id: QueuedActionId) -> Result<bool, AppError> {
        let pool = self.pool().await?;
        let result = sqlx::query(r#"DELETE FROM queued_actions WHERE id = ?1"#)
            .bind(id.value())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<u64, AppError> {
        let pool = self.pool().await?;
        let result = sqlx::query(r#"DELETE FROM queued_actions"#)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, AppError> {
        let pool = self.pool().await?;
        let row = sqlx::query(r#"SELECT COUNT(*) as count FROM queued_actions"#)
            .fetch_one(pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }
}
