//! Site metrics types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Experience;
use crate::error::{Error, Result};

/// Counted site event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricEvent {
    Visit,
    Download,
}

impl MetricEvent {
    pub fn table(&self) -> &'static str {
        match self {
            MetricEvent::Visit => "visits",
            MetricEvent::Download => "cv_downloads",
        }
    }

    /// Timestamp column of the event table
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            MetricEvent::Visit => "visited_at",
            MetricEvent::Download => "downloaded_at",
        }
    }

    /// Local state key holding the last tracked instant
    pub fn storage_key(&self) -> &'static str {
        match self {
            MetricEvent::Visit => "last_visit_tracked",
            MetricEvent::Download => "last_download_tracked",
        }
    }

    pub fn all() -> [MetricEvent; 2] {
        [MetricEvent::Visit, MetricEvent::Download]
    }
}

impl fmt::Display for MetricEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricEvent::Visit => f.write_str("visit"),
            MetricEvent::Download => f.write_str("download"),
        }
    }
}

/// Window for metric counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateRange {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "15d")]
    Last15Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl DateRange {
    pub fn days(&self) -> Option<i64> {
        match self {
            DateRange::Last7Days => Some(7),
            DateRange::Last15Days => Some(15),
            DateRange::Last30Days => Some(30),
            DateRange::All => None,
        }
    }

    /// Inclusive lower bound relative to `now`; `None` is unbounded
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days().map(|days| now - Duration::days(days))
    }
}

impl FromStr for DateRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "7d" => Ok(DateRange::Last7Days),
            "15d" => Ok(DateRange::Last15Days),
            "30d" => Ok(DateRange::Last30Days),
            "all" => Ok(DateRange::All),
            other => Err(Error::InvalidInput(format!(
                "unknown date range '{}' (expected 7d, 15d, 30d, all)",
                other
            ))),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DateRange::Last7Days => "7d",
            DateRange::Last15Days => "15d",
            DateRange::Last30Days => "30d",
            DateRange::All => "all",
        };
        f.write_str(s)
    }
}

/// Dashboard figures
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub range: DateRange,
    pub cutoff: Option<DateTime<Utc>>,
    pub visits: u64,
    pub downloads: u64,
    pub total_projects: u64,
    pub published_experiences: u64,
    /// Most recent experiences awaiting moderation
    pub latest_new: Vec<Experience>,
}

/// Result of a tracking attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrackOutcome {
    Recorded { at: DateTime<Utc> },
    /// Suppressed by the cooldown window
    Skipped {
        last: DateTime<Utc>,
        next_allowed: DateTime<Utc>,
    },
}

impl TrackOutcome {
    pub fn was_recorded(&self) -> bool {
        matches!(self, TrackOutcome::Recorded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_is_exact_offset() {
        let now: DateTime<Utc> = "2024-06-15T10:30:00Z".parse().unwrap();
        assert_eq!(
            DateRange::Last7Days.cutoff(now),
            Some("2024-06-08T10:30:00Z".parse().unwrap())
        );
        assert_eq!(DateRange::All.cutoff(now), None);
    }

    #[test]
    fn test_range_round_trips_through_text() {
        for range in ["7d", "15d", "30d", "all"] {
            assert_eq!(range.parse::<DateRange>().unwrap().to_string(), range);
        }
        assert!("1y".parse::<DateRange>().is_err());
    }

    #[test]
    fn test_event_tables() {
        assert_eq!(MetricEvent::Visit.table(), "visits");
        assert_eq!(MetricEvent::Download.timestamp_column(), "downloaded_at");
        assert_eq!(MetricEvent::Download.storage_key(), "last_download_tracked");
    }
}
