use crate::config::{DeliveryConfig, MissedPolicy};
use crate::core::PostStore;
use crate::domain::post::DeliveryWindow;
use crate::error::Result;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge},
};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    delivered: Counter<u64>,
    failures: Counter<u64>,
    missed: Gauge<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("post-courier");
        Self {
            delivered: meter
                .u64_counter("posts_delivered_total")
                .with_description("Total scheduled posts marked as delivered")
                .build(),
            failures: meter
                .u64_counter("delivery_sweep_failures_total")
                .with_description("Total delivery sweeps aborted by a store error")
                .build(),
            missed: meter
                .u64_gauge("posts_missed")
                .with_description("Scheduled posts older than the lookback window at the last sweep")
                .build(),
        }
    }
}

/// Outcome of a single sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Posts matched by the due query.
    pub found: usize,
    /// Posts this sweep moved to delivered.
    pub delivered: usize,
    /// Posts another sweep delivered between our read and our write.
    pub skipped: usize,
    /// Posts stranded behind the lookback window. Only counted under [`MissedPolicy::Abandon`].
    pub missed: u64,
}

/// Promotes scheduled posts to delivered once their delivery time arrives.
#[derive(Debug)]
pub struct DeliveryWorker {
    store: Arc<dyn PostStore>,
    config: DeliveryConfig,
    metrics: Metrics,
}

impl DeliveryWorker {
    /// A batch limit below one is raised to one, so due posts always make progress.
    #[must_use]
    pub fn new(store: Arc<dyn PostStore>, mut config: DeliveryConfig) -> Self {
        if config.batch_limit < 1 {
            tracing::warn!(batch_limit = config.batch_limit, "Batch limit must be positive, using 1");
            config.batch_limit = 1;
        }
        Self { store, config, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.config.poll_interval_secs == 0 {
            tracing::info!("Scheduled post delivery is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.poll_interval_secs,
            lookback_secs = self.config.lookback_secs,
            missed_policy = ?self.config.missed_policy,
            "Scheduled post delivery started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_sweep()
                        .instrument(tracing::info_span!("delivery_sweep_iteration"))
                        .await
                    {
                        tracing::error!(error = ?e, "Scheduled post delivery iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Scheduled post delivery loop shutting down...");
    }

    /// Runs one sweep against the current wall clock.
    ///
    /// # Errors
    /// Returns an error if the due query or any delivery update fails.
    pub async fn perform_sweep(&self) -> Result<SweepReport> {
        self.perform_sweep_at(OffsetDateTime::now_utc()).await
    }

    /// Runs one sweep as if the current time were `now`.
    ///
    /// Posts are delivered one at a time. The first failed update aborts the rest of the
    /// batch; those posts still match the due query and are picked up by the next sweep.
    ///
    /// # Errors
    /// Returns an error if the due query or any delivery update fails.
    #[tracing::instrument(
        skip(self),
        err,
        fields(found = tracing::field::Empty, delivered = tracing::field::Empty)
    )]
    pub async fn perform_sweep_at(&self, now: OffsetDateTime) -> Result<SweepReport> {
        let result = self.sweep(now).await;
        if result.is_err() {
            self.metrics.failures.add(1, &[]);
        }
        result
    }

    fn window_at(&self, now: OffsetDateTime) -> DeliveryWindow {
        match self.config.missed_policy {
            MissedPolicy::Abandon => {
                let lookback = i64::try_from(self.config.lookback_secs).unwrap_or(i64::MAX);
                DeliveryWindow::trailing(now, time::Duration::seconds(lookback))
            }
            MissedPolicy::Deliver => DeliveryWindow::unbounded(now),
        }
    }

    async fn sweep(&self, now: OffsetDateTime) -> Result<SweepReport> {
        tracing::info!("Checking for scheduled posts to deliver...");

        let window = self.window_at(now);
        let due = self.store.find_due(&window, self.config.batch_limit).await?;
        tracing::Span::current().record("found", due.len());

        let mut report = SweepReport { found: due.len(), ..SweepReport::default() };

        if due.is_empty() {
            tracing::info!("No posts to deliver at this time");
        } else {
            tracing::info!(count = due.len(), "Found posts to deliver");

            for post in &due {
                tracing::info!(post_id = post.id, title = %post.title, "Delivering post");

                if self.store.mark_delivered(post.id, post.delivery_at, now).await? {
                    report.delivered += 1;
                    self.metrics.delivered.add(1, &[]);
                    tracing::info!(post_id = post.id, "Post delivered");
                } else {
                    report.skipped += 1;
                    tracing::debug!(post_id = post.id, "Post already delivered by a concurrent sweep");
                }
            }

            tracing::Span::current().record("delivered", report.delivered);
            if i64::try_from(due.len()).is_ok_and(|n| n >= self.config.batch_limit) {
                tracing::debug!(
                    limit = self.config.batch_limit,
                    "Batch limit reached, remaining posts wait for the next sweep"
                );
            }
        }

        if self.config.missed_policy == MissedPolicy::Abandon {
            report.missed = self.observe_missed(&window).await;
        }

        tracing::info!(
            found = report.found,
            delivered = report.delivered,
            skipped = report.skipped,
            "Scheduled post delivery sweep completed"
        );
        Ok(report)
    }

    async fn observe_missed(&self, window: &DeliveryWindow) -> u64 {
        match self.store.count_missed(window).await {
            Ok(count) => {
                self.metrics.missed.record(count, &[]);
                if count > 0 {
                    tracing::warn!(
                        count,
                        lookback_secs = self.config.lookback_secs,
                        "Scheduled posts fell outside the lookback window and will not be delivered"
                    );
                }
                count
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to count missed posts");
                0
            }
        }
    }
}
