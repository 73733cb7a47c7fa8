use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "post_priority", rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Delivered,
}

/// A message authored by an administrator, optionally scheduled for later delivery.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: PostStatus,
    pub delivery_at: Option<OffsetDateTime>,
    pub delivered_at: Option<OffsetDateTime>,
    pub sent_at: OffsetDateTime,
    pub edited_at: Option<OffsetDateTime>,
}

impl Post {
    /// Whether the sweeper should pick this post up within `window`.
    #[must_use]
    pub fn is_due_in(&self, window: &DeliveryWindow) -> bool {
        self.delivery_at.is_some_and(|at| window.contains(at))
    }
}

/// The projection of a post returned by the due query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuePost {
    pub id: i64,
    pub title: String,
    pub delivery_at: OffsetDateTime,
}

/// The span of delivery times a single sweep is allowed to act on.
///
/// Both bounds are inclusive. A window without a start reaches back
/// indefinitely, so nothing is ever considered missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryWindow {
    now: OffsetDateTime,
    start: Option<OffsetDateTime>,
}

impl DeliveryWindow {
    /// A window covering `[now - lookback, now]`.
    ///
    /// A lookback too large to subtract from `now` yields an unbounded window.
    #[must_use]
    pub fn trailing(now: OffsetDateTime, lookback: Duration) -> Self {
        Self { now, start: now.checked_sub(lookback) }
    }

    #[must_use]
    pub const fn unbounded(now: OffsetDateTime) -> Self {
        Self { now, start: None }
    }

    #[must_use]
    pub const fn now(&self) -> OffsetDateTime {
        self.now
    }

    #[must_use]
    pub const fn start(&self) -> Option<OffsetDateTime> {
        self.start
    }

    #[must_use]
    pub fn contains(&self, delivery_at: OffsetDateTime) -> bool {
        delivery_at <= self.now && self.start.is_none_or(|start| delivery_at >= start)
    }

    /// Due, but older than the window reaches.
    #[must_use]
    pub fn has_missed(&self, delivery_at: OffsetDateTime) -> bool {
        self.start.is_some_and(|start| delivery_at < start)
    }
}
