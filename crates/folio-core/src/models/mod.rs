//! Record types
//!
//! Explicit shapes for the rows Folio reads and writes. Rows are converted
//! into these at the service boundary; anything that does not fit is
//! rejected there.

pub mod experience;
pub mod metrics;
pub mod project;

pub use experience::{
    Experience, ExperienceDraft, ExperienceStatus, IMPROVEMENT_OTHER, ProjectRef, Rating,
    StatusAction, StatusFilter,
};
pub use metrics::{DateRange, MetricEvent, MetricsSnapshot, TrackOutcome};
pub use project::{
    Project, ProjectDraft, ProjectOption, SortOrder, filter_by_category, format_project_date,
    slugify, sort_projects,
};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept ids stored as either bigint or uuid/text columns
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, got {}",
            other
        ))),
    }
}

/// Optional foreign key stored as bigint or text
pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, got {}",
            other
        ))),
    }
}

/// Treat a SQL `NULL` like a missing value
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
