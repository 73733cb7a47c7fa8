use crate::core::PostStore;
use crate::domain::post::{DeliveryWindow, DuePost, Post, PostStatus};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use time::OffsetDateTime;

/// In-process `PostStore`, mainly for tests and embedding the sweeper without Postgres.
///
/// Each row sits behind its own shard lock, so the conditional update in
/// `mark_delivered` is atomic with respect to concurrent sweeps.
#[derive(Clone, Debug, Default)]
pub struct MemoryPostStore {
    posts: Arc<DashMap<i64, Post>>,
}

impl MemoryPostStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, post: Post) {
        self.posts.insert(post.id, post);
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<Post> {
        self.posts.get(&id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn find_due(&self, window: &DeliveryWindow, limit: i64) -> Result<Vec<DuePost>> {
        let mut due: Vec<DuePost> = self
            .posts
            .iter()
            .filter(|entry| entry.is_due_in(window))
            .filter_map(|entry| {
                entry.delivery_at.map(|delivery_at| DuePost { id: entry.id, title: entry.title.clone(), delivery_at })
            })
            .collect();

        due.sort_by_key(|post| (post.delivery_at, post.id));
        due.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(due)
    }

    async fn mark_delivered(
        &self,
        id: i64,
        expected_delivery_at: OffsetDateTime,
        delivered_at: OffsetDateTime,
    ) -> Result<bool> {
        let Some(mut post) = self.posts.get_mut(&id) else {
            return Ok(false);
        };
        if post.delivery_at != Some(expected_delivery_at) {
            return Ok(false);
        }

        post.delivery_at = None;
        post.delivered_at = Some(delivered_at);
        post.status = PostStatus::Delivered;
        Ok(true)
    }

    async fn count_missed(&self, window: &DeliveryWindow) -> Result<u64> {
        let count = self.posts.iter().filter(|entry| entry.delivery_at.is_some_and(|at| window.has_missed(at))).count();
        Ok(count as u64)
    }
}
