//! Portfolio projects

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_id, null_as_default};
use crate::error::{Error, Result};

/// A project as stored in the `projects` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Rich text (HTML)
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Hero first, then gallery tiles
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// Free-form: a year (`2023`) or a full date
    #[serde(default)]
    pub project_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// `images[0]`, falling back to the primary image
    pub fn hero_image(&self) -> Option<&str> {
        self.images
            .first()
            .map(String::as_str)
            .or(self.image_url.as_deref())
    }

    /// Gallery tiles after the hero
    pub fn gallery(&self) -> &[String] {
        self.images.get(1..).unwrap_or(&[])
    }

    /// Images shown on the detail page: the stored list, or just the
    /// primary image when the list is empty
    pub fn detail_images(&self) -> Vec<String> {
        if !self.images.is_empty() {
            return self.images.clone();
        }
        self.image_url.iter().cloned().collect()
    }

    /// Every stored image URL, primary first, without duplicates
    pub fn all_image_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for url in self.image_url.iter().chain(self.images.iter()) {
            if !url.is_empty() && !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    pub fn display_date(&self) -> Option<String> {
        self.project_date.as_deref().map(format_project_date)
    }

    /// Sort date used by the catalog; year-only dates resolve to the end or
    /// start of that year
    fn sort_date(&self, year_end: bool) -> DateTime<Utc> {
        self.project_date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .and_then(|d| parse_project_date(d, year_end))
            .unwrap_or(self.created_at)
    }
}

/// Lightweight projection used when linking experiences to projects
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectOption {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
}

/// Fields written on create and update
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectDraft {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub link: Option<String>,
    pub project_date: Option<String>,
}

impl ProjectDraft {
    /// Draft that recreates an existing project unchanged
    pub fn from_project(project: &Project) -> Self {
        Self {
            title: project.title.clone(),
            slug: project.slug.clone(),
            description: project.description.clone(),
            category: project.category.clone(),
            image_url: project.image_url.clone(),
            images: project.images.clone(),
            link: project.link.clone(),
            project_date: project.project_date.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::MissingField("title".to_string()));
        }
        if self.slug.trim().is_empty() {
            return Err(Error::MissingField("slug".to_string()));
        }
        if slugify(&self.slug) != self.slug {
            return Err(Error::InvalidInput(format!(
                "slug '{}' is not URL-safe (try '{}')",
                self.slug,
                slugify(&self.slug)
            )));
        }
        Ok(())
    }
}

/// Lowercase, collapse every run of characters outside `a-z0-9` into `-`,
/// trim leading and trailing dashes
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn is_year(value: &str) -> bool {
    value.len() == 4 && value.chars().all(|c| c.is_ascii_digit())
}

fn parse_project_date(value: &str, year_end: bool) -> Option<DateTime<Utc>> {
    if is_year(value) {
        let year: i32 = value.parse().ok()?;
        let date = if year_end {
            NaiveDate::from_ymd_opt(year, 12, 31)
        } else {
            NaiveDate::from_ymd_opt(year, 1, 1)
        }?;
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Display form of a project date: a bare year stays as is, a full date
/// becomes `dd/mm/yyyy`, anything unparseable is shown verbatim
pub fn format_project_date(value: &str) -> String {
    let trimmed = value.trim();
    if is_year(trimmed) {
        return trimmed.to_string();
    }
    match parse_project_date(trimmed, false) {
        Some(dt) => dt.format("%d/%m/%Y").to_string(),
        None => value.to_string(),
    }
}

/// Catalog ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Az,
    Za,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "az" | "a-z" => Ok(SortOrder::Az),
            "za" | "z-a" => Ok(SortOrder::Za),
            other => Err(Error::InvalidInput(format!(
                "unknown sort order '{}' (expected newest, oldest, az, za)",
                other
            ))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::Az => "az",
            SortOrder::Za => "za",
        };
        f.write_str(s)
    }
}

/// Keep projects in `category` (case-insensitive); `all` keeps everything
pub fn filter_by_category(projects: Vec<Project>, category: &str) -> Vec<Project> {
    if category.eq_ignore_ascii_case("all") || category.trim().is_empty() {
        return projects;
    }
    let wanted = category.to_lowercase();
    projects
        .into_iter()
        .filter(|p| {
            p.category
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == wanted)
        })
        .collect()
}

pub fn sort_projects(projects: &mut [Project], order: SortOrder) {
    let by_title = |a: &Project, b: &Project| -> Ordering {
        a.title.to_lowercase().cmp(&b.title.to_lowercase())
    };
    match order {
        SortOrder::Newest => projects.sort_by(|a, b| b.sort_date(true).cmp(&a.sort_date(true))),
        SortOrder::Oldest => projects.sort_by(|a, b| a.sort_date(false).cmp(&b.sort_date(false))),
        SortOrder::Az => projects.sort_by(by_title),
        SortOrder::Za => projects.sort_by(|a, b| by_title(b, a)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(title: &str, date: Option<&str>, created: &str) -> Project {
        Project {
            id: title.to_string(),
            title: title.to_string(),
            slug: slugify(title),
            description: None,
            category: Some("Desarrollo Web".to_string()),
            image_url: None,
            images: Vec::new(),
            link: None,
            project_date: date.map(str::to_string),
            created_at: created.parse().unwrap(),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Cool Project!"), "my-cool-project");
        assert_eq!(slugify("  --Hello   World--  "), "hello-world");
        assert_eq!(slugify("Diseño 2024"), "dise-o-2024");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_detail_images_fall_back_to_primary() {
        let mut p = project("A", None, "2024-01-01T00:00:00Z");
        p.image_url = Some("main.png".to_string());
        assert_eq!(p.detail_images(), vec!["main.png".to_string()]);
        assert_eq!(p.hero_image(), Some("main.png"));
        assert!(p.gallery().is_empty());

        p.images = vec!["hero.png".to_string(), "g1.png".to_string()];
        assert_eq!(p.detail_images().len(), 2);
        assert_eq!(p.hero_image(), Some("hero.png"));
        assert_eq!(p.gallery(), &["g1.png".to_string()]);
    }

    #[test]
    fn test_all_image_urls_deduplicates() {
        let mut p = project("A", None, "2024-01-01T00:00:00Z");
        p.image_url = Some("main.png".to_string());
        p.images = vec!["main.png".to_string(), "g1.png".to_string()];
        assert_eq!(p.all_image_urls(), vec!["main.png", "g1.png"]);
    }

    #[test]
    fn test_format_project_date() {
        assert_eq!(format_project_date("2023"), "2023");
        assert_eq!(format_project_date("2024-03-05"), "05/03/2024");
        assert_eq!(format_project_date("Primavera 2022"), "Primavera 2022");
    }

    #[test]
    fn test_deserialize_numeric_id_and_null_images() {
        let p: Project = serde_json::from_value(json!({
            "id": 7,
            "title": "T",
            "slug": "t",
            "images": null,
            "created_at": "2024-01-01T00:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(p.id, "7");
        assert!(p.images.is_empty());
    }

    #[test]
    fn test_sort_newest_treats_year_as_year_end() {
        let mut projects = vec![
            project("Year", Some("2023"), "2020-01-01T00:00:00Z"),
            project("Date", Some("2023-06-01"), "2020-01-01T00:00:00Z"),
            project("None", None, "2024-01-01T00:00:00Z"),
        ];
        sort_projects(&mut projects, SortOrder::Newest);
        let titles: Vec<&str> = projects.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["None", "Year", "Date"]);

        sort_projects(&mut projects, SortOrder::Oldest);
        let titles: Vec<&str> = projects.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Year", "Date", "None"]);
    }

    #[test]
    fn test_sort_by_title() {
        let mut projects = vec![
            project("beta", None, "2024-01-01T00:00:00Z"),
            project("Alpha", None, "2024-01-01T00:00:00Z"),
        ];
        sort_projects(&mut projects, SortOrder::Az);
        assert_eq!(projects[0].title, "Alpha");
        sort_projects(&mut projects, SortOrder::Za);
        assert_eq!(projects[0].title, "beta");
    }

    #[test]
    fn test_filter_by_category() {
        let mut other = project("Game", None, "2024-01-01T00:00:00Z");
        other.category = Some("Videojuegos".to_string());
        let projects = vec![project("Web", None, "2024-01-01T00:00:00Z"), other];

        assert_eq!(filter_by_category(projects.clone(), "all").len(), 2);
        let games = filter_by_category(projects, "videojuegos");
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].title, "Game");
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = ProjectDraft {
            title: "Site".to_string(),
            slug: "site".to_string(),
            ..Default::default()
        };
        assert!(draft.validate().is_ok());
        draft.slug = "Not Safe".to_string();
        assert!(matches!(draft.validate(), Err(Error::InvalidInput(_))));
        draft.title.clear();
        assert!(matches!(draft.validate(), Err(Error::MissingField(_))));
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("AZ".parse::<SortOrder>().unwrap(), SortOrder::Az);
        assert!("random".parse::<SortOrder>().is_err());
    }
}
