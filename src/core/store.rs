use crate::domain::post::{DeliveryWindow, DuePost};
use crate::error::Result;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Access to the posts table as needed by the delivery sweeper.
#[async_trait]
pub trait PostStore: Send + Sync + std::fmt::Debug {
    /// Returns scheduled posts whose delivery time falls inside `window`,
    /// oldest first, at most `limit` of them.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    async fn find_due(&self, window: &DeliveryWindow, limit: i64) -> Result<Vec<DuePost>>;

    /// Marks a post delivered, provided its delivery time is still `expected_delivery_at`.
    ///
    /// Returns `false` when the row no longer matches, i.e. someone else already delivered it.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    async fn mark_delivered(
        &self,
        id: i64,
        expected_delivery_at: OffsetDateTime,
        delivered_at: OffsetDateTime,
    ) -> Result<bool>;

    /// Counts posts still carrying a delivery time older than the window start.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    async fn count_missed(&self, window: &DeliveryWindow) -> Result<u64>;
}
