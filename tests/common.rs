use post_courier::domain::post::{Post, PostStatus, Priority};
use time::OffsetDateTime;

pub fn setup_tracing() {
    post_courier::telemetry::init_test_telemetry();
}

#[allow(dead_code)]
pub fn scheduled_post(id: i64, delivery_at: Option<OffsetDateTime>) -> Post {
    Post {
        id,
        title: format!("Parent-teacher conference #{id}"),
        description: "Sign-up sheets are in the front office".to_string(),
        priority: Priority::Medium,
        status: if delivery_at.is_some() { PostStatus::Scheduled } else { PostStatus::Delivered },
        delivery_at,
        delivered_at: None,
        sent_at: OffsetDateTime::now_utc() - time::Duration::hours(1),
        edited_at: None,
    }
}

/// Connects to `DATABASE_URL` and applies migrations.
///
/// Returns `None` when no database is configured so the Postgres suites are skipped.
#[allow(dead_code)]
pub async fn get_test_pool() -> Option<sqlx::PgPool> {
    setup_tracing();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set, skipping Postgres test");
        return None;
    };

    let config = post_courier::config::DatabaseConfig {
        url,
        max_connections: 5,
        min_connections: 0,
        acquire_timeout_secs: 5,
        connect_attempts: 1,
        max_backoff_secs: 1,
    };
    let pool = post_courier::adapters::database::init_pool(&config)
        .await
        .expect("Failed to connect to DB. Is Postgres running?");
    post_courier::adapters::database::run_migrations(&pool).await.expect("Failed to run migrations");

    // Keep generated ids clear of the ids tests insert explicitly
    sqlx::query(
        "SELECT setval(pg_get_serial_sequence('posts', 'id'), GREATEST((SELECT last_value FROM posts_id_seq), 1000))",
    )
    .execute(&pool)
    .await
    .expect("Failed to advance post id sequence");

    Some(pool)
}
