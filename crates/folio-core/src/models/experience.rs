//! Client experiences (testimonials) and their moderation lifecycle

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_id, deserialize_optional_id, null_as_default};
use crate::error::{Error, Result};

/// Aspect value that requires a free-text explanation
pub const IMPROVEMENT_OTHER: &str = "Otro";

/// Moderation state of an experience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceStatus {
    New,
    Published,
    Archived,
}

impl ExperienceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceStatus::New => "new",
            ExperienceStatus::Published => "published",
            ExperienceStatus::Archived => "archived",
        }
    }

    /// Actions an admin may take from this state
    pub fn available_actions(&self) -> &'static [StatusAction] {
        match self {
            ExperienceStatus::New => &[StatusAction::Publish],
            ExperienceStatus::Published => &[StatusAction::Archive],
            ExperienceStatus::Archived => &[StatusAction::Republish],
        }
    }
}

impl fmt::Display for ExperienceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(ExperienceStatus::New),
            "published" => Ok(ExperienceStatus::Published),
            "archived" => Ok(ExperienceStatus::Archived),
            other => Err(Error::InvalidInput(format!(
                "unknown status '{}' (expected new, published, archived)",
                other
            ))),
        }
    }
}

/// Status transitions available to admins
///
/// The graph is `new → published → archived → published`. No action leads
/// back to `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Publish,
    Archive,
    Republish,
}

impl StatusAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusAction::Publish => "publish",
            StatusAction::Archive => "archive",
            StatusAction::Republish => "republish",
        }
    }

    pub fn target(&self) -> ExperienceStatus {
        match self {
            StatusAction::Publish | StatusAction::Republish => ExperienceStatus::Published,
            StatusAction::Archive => ExperienceStatus::Archived,
        }
    }

    /// Resulting status, or `InvalidTransition` when `from` does not allow it
    pub fn apply(&self, from: ExperienceStatus) -> Result<ExperienceStatus> {
        let allowed = matches!(
            (self, from),
            (StatusAction::Publish, ExperienceStatus::New)
                | (StatusAction::Archive, ExperienceStatus::Published)
                | (StatusAction::Republish, ExperienceStatus::Archived)
        );
        if allowed {
            Ok(self.target())
        } else {
            Err(Error::InvalidTransition {
                from: from.to_string(),
                action: self.as_str().to_string(),
            })
        }
    }
}

/// Admin list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ExperienceStatus),
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

/// Star rating, 1 to 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self> {
        if (1..=i64::from(Self::MAX)).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(Error::InvalidRating(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// `★★★★☆`
    pub fn stars(&self) -> String {
        let filled = usize::from(self.0);
        format!(
            "{}{}",
            "★".repeat(filled),
            "☆".repeat(usize::from(Self::MAX) - filled)
        )
    }
}

impl Default for Rating {
    fn default() -> Self {
        Rating(Self::MAX)
    }
}

impl TryFrom<i64> for Rating {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Rating::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        i64::from(rating.0)
    }
}

/// Embedded `projects(title)` relation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRef {
    pub title: String,
}

/// An experience as stored in the `experiences` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experience {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub rating: Rating,
    #[serde(default, alias = "comment", deserialize_with = "null_as_default")]
    pub review: String,
    #[serde(default)]
    pub how_found: Option<String>,
    #[serde(default)]
    pub service_acquired: Option<String>,
    #[serde(default)]
    pub improvement_aspect: Option<String>,
    #[serde(default)]
    pub improvement_other: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub project_id: Option<String>,
    pub status: ExperienceStatus,
    #[serde(default = "default_show_on_home", deserialize_with = "show_on_home_or_default")]
    pub show_on_home: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing)]
    pub projects: Option<ProjectRef>,
}

fn default_show_on_home() -> bool {
    true
}

fn show_on_home_or_default<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

impl Experience {
    /// Title of the linked project, when the row was loaded with the relation
    pub fn project_title(&self) -> Option<&str> {
        self.projects.as_ref().map(|p| p.title.as_str())
    }

    /// Improvement aspect, replaced by the free text when "Otro" was chosen
    pub fn improvement(&self) -> Option<&str> {
        match self.improvement_aspect.as_deref() {
            Some(IMPROVEMENT_OTHER) => self.improvement_other.as_deref().or(Some(IMPROVEMENT_OTHER)),
            other => other,
        }
    }
}

/// Fields written on create and update (status is set separately)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExperienceDraft {
    pub name: String,
    pub image_url: Option<String>,
    pub rating: Rating,
    pub review: String,
    pub how_found: Option<String>,
    pub service_acquired: Option<String>,
    pub improvement_aspect: Option<String>,
    pub improvement_other: Option<String>,
    pub project_id: Option<String>,
    pub show_on_home: bool,
}

impl ExperienceDraft {
    pub fn from_experience(experience: &Experience) -> Self {
        Self {
            name: experience.name.clone(),
            image_url: experience.image_url.clone(),
            rating: experience.rating,
            review: experience.review.clone(),
            how_found: experience.how_found.clone(),
            service_acquired: experience.service_acquired.clone(),
            improvement_aspect: experience.improvement_aspect.clone(),
            improvement_other: experience.improvement_other.clone(),
            project_id: experience.project_id.clone(),
            show_on_home: experience.show_on_home,
        }
    }

    /// Name and review are required for every experience
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::MissingField("name".to_string()));
        }
        if self.review.trim().is_empty() {
            return Err(Error::MissingField("review".to_string()));
        }
        Ok(())
    }
}
