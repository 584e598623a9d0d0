use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::EnviroError;
use crate::models::chat::{ChatRecord, NewChatRecord, RecordId};
use crate::store::ChatStore;

const CREATE_CHATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    id       UUID PRIMARY KEY,
    question TEXT NOT NULL,
    answer   TEXT NOT NULL,
    asked_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_ASKED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS chats_asked_at_idx ON chats (asked_at DESC)";

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_CHATS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_ASKED_AT_INDEX).execute(pool).await?;
    Ok(())
}

/// Postgres-backed chat store. Holds the process-wide pool.
#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    /// Open the pool, verify it with a liveness probe, and create the schema.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, EnviroError> {
        if config.url.trim().is_empty() {
            return Err(EnviroError::Other("database url is not set".to_string()));
        }

        let pool = create_pool(config).await?;
        health_check(&pool).await?;
        ensure_schema(&pool).await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Successfully connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every pooled connection. Safe to call more than once.
    pub async fn disconnect(&self) {
        if self.pool.is_closed() {
            return;
        }
        self.pool.close().await;
        tracing::info!("PostgreSQL connection closed");
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn insert(&self, record: NewChatRecord) -> Result<ChatRecord, EnviroError> {
        let id = Uuid::new_v4();
        let row: ChatRecord = sqlx::query_as(
            r#"
            INSERT INTO chats (id, question, answer, asked_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, question, answer, asked_at
            "#,
        )
        .bind(id)
        .bind(&record.question)
        .bind(&record.answer)
        .bind(record.asked_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = %row.id, "Inserted chat record");
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<ChatRecord>, EnviroError> {
        let rows: Vec<ChatRecord> = sqlx::query_as(
            "SELECT id, question, answer, asked_at FROM chats ORDER BY asked_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: &RecordId) -> Result<Option<ChatRecord>, EnviroError> {
        let row: Option<ChatRecord> = sqlx::query_as(
            "SELECT id, question, answer, asked_at FROM chats WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn ping(&self) -> Result<(), EnviroError> {
        health_check(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
