use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;
use xwall_core::error::AppError;
use xwall_core::models::{Mention, MentionStatus, NewMention};
use xwall_core::traits::{MentionStore, PersistOutcome};

/// Repository for mention persistence in PostgreSQL.
///
/// Writes are idempotent on `source_id`: the unique constraint plus
/// `ON CONFLICT DO NOTHING` turns a repeated insert into a no-op.
#[derive(Clone)]
pub struct MentionRepository {
    pool: Pool<Postgres>,
}

impl MentionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a mention unless one with the same `source_id` exists.
    pub async fn insert(&self, mention: &NewMention) -> Result<PersistOutcome, AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO xwall (source_id, content, author_name, author_handle, avatar_url, media_url, platform, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&mention.source_id)
        .bind(&mention.content)
        .bind(&mention.author_name)
        .bind(&mention.author_handle)
        .bind(&mention.avatar_url)
        .bind(&mention.media_url)
        .bind(&mention.platform)
        .bind(mention.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(match row {
            Some((id,)) => PersistOutcome::Inserted(Some(id.to_string())),
            None => PersistOutcome::Duplicate,
        })
    }

    pub async fn get_by_source_id(&self, source_id: &str) -> Result<Option<Mention>, AppError> {
        let row = sqlx::query_as::<_, MentionRow>(
            r#"
            SELECT id, source_id, content, author_name, author_handle, avatar_url, media_url, platform, status, created_at
            FROM xwall
            WHERE source_id = $1
            "#,
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Most recent mentions first, optionally filtered by status.
    pub async fn list_recent(
        &self,
        status: Option<MentionStatus>,
        limit: usize,
    ) -> Result<Vec<Mention>, AppError> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, MentionRow>(
                r#"
                SELECT id, source_id, content, author_name, author_handle, avatar_url, media_url, platform, status, created_at
                FROM xwall
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2
                "#,
            )
            .bind(status.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, MentionRow>(
                r#"
                SELECT id, source_id, content, author_name, author_handle, avatar_url, media_url, platform, status, created_at
                FROM xwall
                ORDER BY created_at DESC
                LIMIT $1
                "#,
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn count_by_status(&self, status: MentionStatus) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM xwall WHERE status = $1"#)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct MentionRow {
    id: Uuid,
    source_id: String,
    content: String,
    author_name: String,
    author_handle: String,
    avatar_url: Option<String>,
    media_url: Option<String>,
    platform: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<MentionRow> for Mention {
    fn from(row: MentionRow) -> Self {
        Mention {
            id: row.id.to_string(),
            source_id: row.source_id,
            content: row.content,
            author_name: row.author_name,
            author_handle: row.author_handle,
            avatar_url: row.avatar_url,
            media_url: row.media_url,
            platform: row.platform,
            status: row.status.parse().unwrap_or(MentionStatus::Pending),
            created_at: row.created_at,
        }
    }
}

// -- Trait implementation --

impl MentionStore for MentionRepository {
    async fn insert(&self, mention: &NewMention) -> Result<PersistOutcome, AppError> {
        MentionRepository::insert(self, mention).await
    }

    async fn get_by_source_id(&self, source_id: &str) -> Result<Option<Mention>, AppError> {
        MentionRepository::get_by_source_id(self, source_id).await
    }

    async fn list_recent(
        &self,
        status: Option<MentionStatus>,
        limit: usize,
    ) -> Result<Vec<Mention>, AppError> {
        MentionRepository::list_recent(self, status, limit).await
    }

    async fn count_by_status(&self, status: MentionStatus) -> Result<i64, AppError> {
        MentionRepository::count_by_status(self, status).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        MentionRepository::health_check(self).await
    }
}
