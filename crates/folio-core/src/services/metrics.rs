//! Visit and CV-download counters
//!
//! Tracking is de-duplicated per machine: the instant of the last recorded
//! event is kept in local state and further events inside the cooldown
//! window are skipped. The timestamp is written only after the backend
//! accepted the insert. This is best effort and not authoritative.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::backend::{Backend, Query, Row};
use crate::config::{MetricsConfig, SiteConfig};
use crate::error::Result;
use crate::local_store::KeyValueStore;
use crate::models::{DateRange, MetricEvent, MetricsSnapshot, TrackOutcome};
use crate::services::experiences::ExperienceService;
use crate::services::projects::ProjectService;

#[derive(Clone)]
pub struct MetricsService {
    backend: Arc<dyn Backend>,
    store: Arc<dyn KeyValueStore>,
    cooldown: Duration,
    feed_size: usize,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl MetricsService {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
        metrics: &MetricsConfig,
        site: &SiteConfig,
    ) -> Self {
        Self {
            backend,
            store,
            cooldown: Duration::hours(metrics.cooldown_hours),
            feed_size: site.new_experience_feed,
        }
    }

    pub async fn track(&self, event: MetricEvent) -> Result<TrackOutcome> {
        self.track_at(event, Utc::now()).await
    }

    /// Record `event` at `now` unless one was recorded within the cooldown
    pub async fn track_at(&self, event: MetricEvent, now: DateTime<Utc>) -> Result<TrackOutcome> {
        if let Some(last) = self.last_tracked(event)? {
            let next_allowed = last + self.cooldown;
            if now < next_allowed {
                debug!(event = %event, last = %last, "Already tracked recently");
                return Ok(TrackOutcome::Skipped { last, next_allowed });
            }
        }

        let mut row = Row::new();
        row.insert(
            event.timestamp_column().to_string(),
            Value::from(timestamp(now)),
        );
        self.backend.insert(event.table(), row).await?;
        self.store.set(event.storage_key(), &timestamp(now))?;
        info!(event = %event, "Tracked");
        Ok(TrackOutcome::Recorded { at: now })
    }

    /// Last recorded instant; an unreadable value counts as never tracked
    pub fn last_tracked(&self, event: MetricEvent) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .get(event.storage_key())?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Forget both de-duplication timestamps
    pub fn reset_tracking(&self) -> Result<()> {
        for event in MetricEvent::all() {
            self.store.remove(event.storage_key())?;
        }
        info!("Tracking flags reset");
        Ok(())
    }

    pub async fn snapshot(&self, range: DateRange) -> Result<MetricsSnapshot> {
        self.snapshot_at(range, Utc::now()).await
    }

    /// Dashboard figures with event counts bounded below by `range` (inclusive)
    pub async fn snapshot_at(&self, range: DateRange, now: DateTime<Utc>) -> Result<MetricsSnapshot> {
        let cutoff = range.cutoff(now);
        let events = |event: MetricEvent| {
            let mut query = Query::table(event.table());
            if let Some(cutoff) = cutoff {
                query = query.gte(event.timestamp_column(), timestamp(cutoff));
            }
            query
        };

        let projects = ProjectService::new(self.backend.clone());
        let experiences = ExperienceService::new(self.backend.clone());

        let visits = self.backend.count(&events(MetricEvent::Visit)).await?;
        let downloads = self.backend.count(&events(MetricEvent::Download)).await?;
        let total_projects = projects.count().await?;
        let published_experiences = experiences.count_published().await?;
        let latest_new = experiences.latest_new(self.feed_size).await?;

        Ok(MetricsSnapshot {
            range,
            cutoff,
            visits,
            downloads,
            total_projects,
            published_experiences,
            latest_new,
        })
    }
}
