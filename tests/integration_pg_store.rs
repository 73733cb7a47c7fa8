mod common;

use post_courier::adapters::database::{PgPostStore, PostRepository};
use post_courier::config::{DeliveryConfig, MissedPolicy};
use post_courier::core::PostStore;
use post_courier::domain::post::{DeliveryWindow, PostStatus};
use post_courier::workers::DeliveryWorker;
use sqlx::PgPool;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

// Each test sweeps at its own fixed instant so rows left behind by other tests
// (or earlier runs) never fall inside its window.
const ERA_1990: i64 = 631_152_000;
const ERA_1995: i64 = 788_918_400;
const ERA_2001: i64 = 978_307_200;

fn at(unix: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(unix).unwrap()
}

async fn insert_scheduled(pool: &PgPool, title: &str, delivery_at: OffsetDateTime) -> i64 {
    sqlx::query_scalar("INSERT INTO posts (title, status, delivery_at) VALUES ($1, $2, $3) RETURNING id")
        .bind(title)
        .bind(PostStatus::Scheduled)
        .bind(delivery_at)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn load_state(pool: &PgPool, id: i64) -> (Option<OffsetDateTime>, Option<OffsetDateTime>, PostStatus) {
    sqlx::query_as("SELECT delivery_at, delivered_at, status FROM posts WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn delete_posts(pool: &PgPool, ids: &[i64]) {
    sqlx::query("DELETE FROM posts WHERE id = ANY($1)").bind(ids).execute(pool).await.unwrap();
}

fn pg_store(pool: &PgPool) -> PgPostStore {
    PgPostStore::new(pool.clone(), PostRepository::new())
}

#[tokio::test]
async fn test_scheduled_post_42_is_delivered_once() {
    let Some(pool) = common::get_test_pool().await else { return };

    // Whole seconds so the value survives the microsecond precision of TIMESTAMPTZ
    let now = at(OffsetDateTime::now_utc().unix_timestamp());
    sqlx::query("DELETE FROM posts WHERE id = 42").execute(&pool).await.unwrap();
    sqlx::query("INSERT INTO posts (id, title, status, delivery_at) VALUES (42, 'Snow day', $1, $2)")
        .bind(PostStatus::Scheduled)
        .bind(now - Duration::seconds(30))
        .execute(&pool)
        .await
        .unwrap();

    let worker = DeliveryWorker::new(Arc::new(pg_store(&pool)), DeliveryConfig::default());

    let first = worker.perform_sweep_at(now).await.unwrap();
    assert!(first.delivered >= 1);

    let (delivery_at, delivered_at, status) = load_state(&pool, 42).await;
    assert_eq!(delivery_at, None);
    assert_eq!(delivered_at, Some(now));
    assert_eq!(status, PostStatus::Delivered);

    let due = pg_store(&pool).find_due(&DeliveryWindow::trailing(now, Duration::minutes(10)), 10_000).await.unwrap();
    assert!(due.iter().all(|p| p.id != 42), "Delivered post must not be selected again");

    delete_posts(&pool, &[42]).await;
}

#[tokio::test]
async fn test_window_bounds_are_inclusive_in_sql() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = pg_store(&pool);

    let now = at(ERA_2001);
    let edge = now - Duration::minutes(10);
    let on_edge = insert_scheduled(&pool, "on edge", edge).await;
    let past_edge = insert_scheduled(&pool, "past edge", edge - Duration::microseconds(1)).await;
    let at_now = insert_scheduled(&pool, "at now", now).await;
    let future = insert_scheduled(&pool, "future", now + Duration::microseconds(1)).await;

    let window = DeliveryWindow::trailing(now, Duration::minutes(10));
    let due = store.find_due(&window, 10_000).await.unwrap();
    let ids: Vec<i64> = due.iter().map(|p| p.id).collect();

    assert!(ids.contains(&on_edge));
    assert!(ids.contains(&at_now));
    assert!(!ids.contains(&past_edge));
    assert!(!ids.contains(&future));

    let on_edge_pos = ids.iter().position(|id| *id == on_edge).unwrap();
    let at_now_pos = ids.iter().position(|id| *id == at_now).unwrap();
    assert!(on_edge_pos < at_now_pos, "Oldest delivery time comes first");

    let limited = store.find_due(&window, 1).await.unwrap();
    assert_eq!(limited.len(), 1);

    assert!(store.count_missed(&window).await.unwrap() >= 1);

    delete_posts(&pool, &[on_edge, past_edge, at_now, future]).await;
}

#[tokio::test]
async fn test_stale_expectation_leaves_row_untouched() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = pg_store(&pool);

    let now = at(ERA_1995);
    let delivery_at = now - Duration::seconds(30);
    let id = insert_scheduled(&pool, "bus route change", delivery_at).await;

    let applied = store.mark_delivered(id, delivery_at - Duration::seconds(1), now).await.unwrap();
    assert!(!applied);
    let (still_at, delivered_at, status) = load_state(&pool, id).await;
    assert_eq!(still_at, Some(delivery_at));
    assert_eq!(delivered_at, None);
    assert_eq!(status, PostStatus::Scheduled);

    assert!(store.mark_delivered(id, delivery_at, now).await.unwrap());
    assert!(!store.mark_delivered(id, delivery_at, now).await.unwrap(), "Second delivery must be refused");

    delete_posts(&pool, &[id]).await;
}

#[tokio::test]
async fn test_deliver_policy_reaches_past_the_window() {
    let Some(pool) = common::get_test_pool().await else { return };

    let now = at(ERA_1990);
    let stale = insert_scheduled(&pool, "library closure", now - Duration::days(3)).await;

    let window = DeliveryWindow::unbounded(now);
    assert_eq!(window.start(), None);
    assert_eq!(pg_store(&pool).count_missed(&window).await.unwrap(), 0);

    let config = DeliveryConfig { missed_policy: MissedPolicy::Deliver, ..DeliveryConfig::default() };
    let report = DeliveryWorker::new(Arc::new(pg_store(&pool)), config).perform_sweep_at(now).await.unwrap();
    assert!(report.delivered >= 1);

    let (delivery_at, delivered_at, status) = load_state(&pool, stale).await;
    assert_eq!(delivery_at, None);
    assert_eq!(delivered_at, Some(now));
    assert_eq!(status, PostStatus::Delivered);

    delete_posts(&pool, &[stale]).await;
}
