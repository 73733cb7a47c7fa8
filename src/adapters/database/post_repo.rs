use crate::adapters::database::DbPool;
use crate::adapters::database::records::DuePostRecord;
use crate::core::PostStore;
use crate::domain::post::{DeliveryWindow, DuePost, PostStatus};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgConnection;
use time::OffsetDateTime;

#[derive(Clone, Debug, Default)]
pub struct PostRepository {}

impl PostRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Fetches posts whose delivery time has arrived and lies within the window.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn), err)]
    pub(crate) async fn fetch_due(
        &self,
        conn: &mut PgConnection,
        window: &DeliveryWindow,
        limit: i64,
    ) -> Result<Vec<DuePost>> {
        let records = sqlx::query_as::<_, DuePostRecord>(
            r#"
            SELECT id, title, delivery_at
            FROM posts
            WHERE delivery_at IS NOT NULL
              AND delivery_at <= $1
              AND ($2::timestamptz IS NULL OR delivery_at >= $2)
            ORDER BY delivery_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(window.now())
        .bind(window.start())
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Clears the delivery time and stamps the post as delivered.
    ///
    /// The update only applies while `delivery_at` still holds the value the caller read,
    /// so two overlapping sweeps can never both deliver the same post.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn), err)]
    pub(crate) async fn mark_delivered(
        &self,
        conn: &mut PgConnection,
        id: i64,
        expected_delivery_at: OffsetDateTime,
        delivered_at: OffsetDateTime,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET delivery_at = NULL, delivered_at = $3, status = $4
            WHERE id = $1 AND delivery_at = $2
            "#,
        )
        .bind(id)
        .bind(expected_delivery_at)
        .bind(delivered_at)
        .bind(PostStatus::Delivered)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Counts posts whose delivery time is older than the window start.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn), err)]
    pub(crate) async fn count_missed(&self, conn: &mut PgConnection, before: OffsetDateTime) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE delivery_at IS NOT NULL AND delivery_at < $1")
                .bind(before)
                .fetch_one(conn)
                .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }
}

/// `PostStore` backed by Postgres.
#[derive(Clone, Debug)]
pub struct PgPostStore {
    pool: DbPool,
    repo: PostRepository,
}

impl PgPostStore {
    #[must_use]
    pub const fn new(pool: DbPool, repo: PostRepository) -> Self {
        Self { pool, repo }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn find_due(&self, window: &DeliveryWindow, limit: i64) -> Result<Vec<DuePost>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.fetch_due(&mut conn, window, limit).await
    }

    async fn mark_delivered(
        &self,
        id: i64,
        expected_delivery_at: OffsetDateTime,
        delivered_at: OffsetDateTime,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.repo.mark_delivered(&mut conn, id, expected_delivery_at, delivered_at).await
    }

    async fn count_missed(&self, window: &DeliveryWindow) -> Result<u64> {
        let Some(start) = window.start() else {
            return Ok(0);
        };
        let mut conn = self.pool.acquire().await?;
        self.repo.count_missed(&mut conn, start).await
    }
}
