//! Readers drive collection passes.
//!
//! The pull reader runs a pass when a scrape arrives; the optional push
//! reader runs one per timer tick and hands it to a [`MetricExporter`]. Both
//! call into the same [`Meter`], possibly at the same time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::exposition::{ExpositionError, encode_text};
use super::meter::{CollectionPass, Meter};
use super::otlp::{ExportError, MetricExporter};

/// On-demand reader backing the scrape endpoint.
#[derive(Clone)]
pub struct PullReader {
    meter: Arc<Meter>,
}

impl PullReader {
    pub fn new(meter: Arc<Meter>) -> Self {
        Self { meter }
    }

    /// Runs one synchronous pass on the calling thread.
    pub fn collect(&self) -> CollectionPass {
        self.meter.collect()
    }

    /// Runs one pass and renders it in the Prometheus text format.
    pub fn render(&self) -> Result<String, ExpositionError> {
        let t0 = Instant::now();
        let pass = self.collect();
        let text = encode_text(&pass)?;
        debug!(
            points = pass.point_count(),
            failures = pass.failures(),
            duration_ms = t0.elapsed().as_millis() as u64,
            "scrape pass rendered"
        );
        Ok(text)
    }
}

/// Timer-driven reader shipping every pass to an exporter.
pub struct PushReader {
    meter: Arc<Meter>,
    exporter: Arc<dyn MetricExporter>,
    interval: Duration,
}

impl PushReader {
    pub fn new(meter: Arc<Meter>, exporter: Arc<dyn MetricExporter>, interval: Duration) -> Self {
        Self {
            meter,
            exporter,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Collects on the blocking pool and exports the result once.
    pub async fn push_once(&self) -> Result<usize, ExportError> {
        let meter = Arc::clone(&self.meter);
        let pass = tokio::task::spawn_blocking(move || meter.collect())
            .await
            .map_err(ExportError::Collection)?;
        let points = pass.point_count();
        self.exporter.export(&pass).await?;
        Ok(points)
    }

    /// Exports one pass per interval until `cancel` fires.
    ///
    /// The first export happens one interval after start. Cancellation is
    /// checked between ticks, so an export already underway runs to
    /// completion; callers bound that with their own grace period.
    pub async fn run(self, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut tick = tokio::time::interval_at(start, self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "push reader started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }

            let t0 = Instant::now();
            let result = self.push_once().await;
            let elapsed = t0.elapsed();

            match result {
                Ok(points) => debug!(
                    points,
                    duration_ms = elapsed.as_millis() as u64,
                    "push tick completed"
                ),
                Err(e @ ExportError::Collection(_)) => error!(error = %e, "push tick failed"),
                Err(e) => warn!(error = %e, "metric export failed"),
            }

            if elapsed > self.interval / 2 {
                warn!(
                    duration_ms = elapsed.as_millis() as u64,
                    interval_ms = self.interval.as_millis() as u64,
                    "push tick exceeded 50% of interval"
                );
            }
        }

        info!("push reader stopped");
    }
}

/// The reader set of one meter: always a pull reader, a push reader only
/// when an export endpoint is configured.
pub struct Readers {
    pub pull: PullReader,
    pub push: Option<PushReader>,
}

impl Readers {
    pub fn new(meter: Arc<Meter>) -> Self {
        Self {
            pull: PullReader::new(meter),
            push: None,
        }
    }

    pub fn with_push(mut self, exporter: Arc<dyn MetricExporter>, interval: Duration) -> Self {
        self.push = Some(PushReader::new(
            Arc::clone(&self.pull.meter),
            exporter,
            interval,
        ));
        self
    }
}
