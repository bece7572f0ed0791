//! Public site views
//!
//! Data assembled for the home page, the project catalog, and a project's
//! detail page.

use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::models::{Experience, Project, SortOrder, filter_by_category, sort_projects};
use crate::services::{ExperienceService, ProjectService};

/// Home page content
#[derive(Debug, Clone, Serialize)]
pub struct HomeView {
    pub projects: Vec<Project>,
    pub testimonials: Vec<Experience>,
}

/// Project detail page content
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: Project,
    /// Gallery, or just the primary image when the gallery is empty
    pub images: Vec<String>,
    pub display_date: Option<String>,
    pub related: Vec<Project>,
    pub experiences: Vec<Experience>,
}

pub async fn load_home(
    projects: &ProjectService,
    experiences: &ExperienceService,
    project_limit: usize,
) -> Result<HomeView> {
    let (projects, testimonials) = tokio::join!(
        projects.list(Some(project_limit)),
        experiences.public_feed()
    );
    Ok(HomeView {
        projects: projects?,
        testimonials: testimonials?,
    })
}

/// Catalog page: category filter then sort, over every project
pub async fn load_catalog(
    projects: &ProjectService,
    category: &str,
    order: SortOrder,
) -> Result<Vec<Project>> {
    let mut list = filter_by_category(projects.list(None).await?, category);
    sort_projects(&mut list, order);
    Ok(list)
}

/// Load a project by slug with its related projects and published
/// experiences. Only the project lookup can fail; the secondary lists
/// degrade to empty.
pub async fn load_project_detail(
    projects: &ProjectService,
    experiences: &ExperienceService,
    slug: &str,
    related_limit: usize,
) -> Result<ProjectDetail> {
    let project = projects.get_by_slug(slug).await?;

    let (related, linked) = tokio::join!(
        projects.related(&project, related_limit),
        experiences.for_project(&project.id)
    );
    let related = related.unwrap_or_else(|e| {
        warn!(slug = %slug, error = %e, "Related projects unavailable");
        Vec::new()
    });
    let experiences = linked.unwrap_or_else(|e| {
        warn!(slug = %slug, error = %e, "Project experiences unavailable");
        Vec::new()
    });

    Ok(ProjectDetail {
        images: project.detail_images(),
        display_date: project.display_date(),
        project,
        related,
        experiences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::Error;
    use serde_json::json;
    use std::sync::Arc;

    fn services() -> (Arc<MemoryBackend>, ProjectService, ExperienceService) {
        let backend = Arc::new(MemoryBackend::new());
        (
            backend.clone(),
            ProjectService::new(backend.clone()),
            ExperienceService::new(backend),
        )
    }

    #[tokio::test]
    async fn test_detail_without_gallery_shows_primary_image() {
        let (backend, projects, experiences) = services();
        backend.seed(
            "projects",
            vec![json!({"id": "1", "title": "Solo", "slug": "solo", "image_url": "main.png",
                        "images": [], "project_date": "2024-02-10", "category": "Videojuegos"})],
        );

        let detail = load_project_detail(&projects, &experiences, "solo", 4)
            .await
            .unwrap();
        assert_eq!(detail.images, vec!["main.png".to_string()]);
        assert_eq!(detail.display_date.as_deref(), Some("10/02/2024"));
        assert!(detail.related.is_empty());
        assert!(detail.experiences.is_empty());
    }

    #[tokio::test]
    async fn test_detail_for_unknown_slug_fails() {
        let (_, projects, experiences) = services();
        assert!(matches!(
            load_project_detail(&projects, &experiences, "ghost", 4).await,
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_filters_then_sorts() {
        let (backend, projects, _) = services();
        backend.seed(
            "projects",
            vec![
                json!({"id": "1", "title": "Beta", "slug": "beta", "category": "Desarrollo Web"}),
                json!({"id": "2", "title": "Alpha", "slug": "alpha", "category": "desarrollo web"}),
                json!({"id": "3", "title": "Game", "slug": "game", "category": "Videojuegos"}),
            ],
        );
        let list = load_catalog(&projects, "Desarrollo Web", SortOrder::Az)
            .await
            .unwrap();
        let titles: Vec<&str> = list.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn test_home_limits_projects() {
        let (backend, projects, experiences) = services();
        for i in 0..8 {
            backend.seed(
                "projects",
                vec![json!({"title": format!("P{}", i), "slug": format!("p{}", i)})],
            );
        }
        let home = load_home(&projects, &experiences, 6).await.unwrap();
        assert_eq!(home.projects.len(), 6);
        assert!(home.testimonials.is_empty());
    }
}
