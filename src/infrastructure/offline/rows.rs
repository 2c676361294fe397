use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct QueuedActionRow {
    pub id: i64,
    pub kind: String,
    pub entity_type: String,
    pub entity_id: String,
    pub url: String,
    pub method: String,
    pub body: Option<String>,
    pub headers: String,
    pub created_at: i64,
    pub retry_count: i64,
    pub max_retries: i64,
}
