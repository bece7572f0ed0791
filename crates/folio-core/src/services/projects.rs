//! Project data access

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::info;

use crate::backend::{Backend, Query, from_row, from_rows, to_row};
use crate::error::{Error, Result};
use crate::models::{Project, ProjectDraft, ProjectOption};

pub const PROJECTS_TABLE: &str = "projects";

#[derive(Clone)]
pub struct ProjectService {
    backend: Arc<dyn Backend>,
}

impl ProjectService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Public listing: most recent `project_date` first (undated last), then
    /// newest created
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<Project>> {
        let mut query = Query::table(PROJECTS_TABLE)
            .order_nulls("project_date", false, false)
            .order("created_at", false);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        from_rows(PROJECTS_TABLE, self.backend.select(&query).await?)
    }

    /// Admin listing: newest created first
    pub async fn list_recent(&self) -> Result<Vec<Project>> {
        let query = Query::table(PROJECTS_TABLE).order("created_at", false);
        from_rows(PROJECTS_TABLE, self.backend.select(&query).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Project> {
        self.find_one(Query::table(PROJECTS_TABLE).eq("id", id), id)
            .await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Project> {
        self.find_one(Query::table(PROJECTS_TABLE).eq("slug", slug), slug)
            .await
    }

    async fn find_one(&self, query: Query, key: &str) -> Result<Project> {
        let row = self
            .backend
            .select(&query.limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProjectNotFound(key.to_string()))?;
        from_row(PROJECTS_TABLE, row)
    }

    /// Up to `n` other projects from the same category, in random order
    pub async fn related(&self, project: &Project, n: usize) -> Result<Vec<Project>> {
        let Some(category) = project.category.as_deref() else {
            return Ok(Vec::new());
        };
        let query = Query::table(PROJECTS_TABLE)
            .eq("category", category)
            .neq("slug", project.slug.as_str());
        let mut related: Vec<Project> =
            from_rows(PROJECTS_TABLE, self.backend.select(&query).await?)?;
        related.shuffle(&mut rand::thread_rng());
        related.truncate(n);
        Ok(related)
    }

    /// Id and title of every project, alphabetical
    pub async fn options(&self) -> Result<Vec<ProjectOption>> {
        let query = Query::table(PROJECTS_TABLE)
            .select("id, title")
            .order("title", true);
        from_rows(PROJECTS_TABLE, self.backend.select(&query).await?)
    }

    pub async fn create(&self, draft: &ProjectDraft) -> Result<Project> {
        draft.validate()?;
        let row = self.backend.insert(PROJECTS_TABLE, to_row(draft)?).await?;
        let project: Project = from_row(PROJECTS_TABLE, row)?;
        info!(id = %project.id, slug = %project.slug, "Project created");
        Ok(project)
    }

    pub async fn update(&self, id: &str, draft: &ProjectDraft) -> Result<Project> {
        draft.validate()?;
        let row = self
            .backend
            .update(PROJECTS_TABLE, id, to_row(draft)?)
            .await
            .map_err(|e| not_found_as_project(e, id))?;
        let project: Project = from_row(PROJECTS_TABLE, row)?;
        info!(id = %project.id, "Project updated");
        Ok(project)
    }

    /// Delete the row only; stored images are the caller's to clean up
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.backend
            .delete(PROJECTS_TABLE, id)
            .await
            .map_err(|e| not_found_as_project(e, id))?;
        info!(id = %id, "Project deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        self.backend.count(&Query::table(PROJECTS_TABLE)).await
    }
}

fn not_found_as_project(error: Error, id: &str) -> Error {
    match error {
        Error::RowNotFound { .. } => Error::ProjectNotFound(id.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::slugify;
    use serde_json::json;

    fn service() -> (Arc<MemoryBackend>, ProjectService) {
        let backend = Arc::new(MemoryBackend::new());
        (backend.clone(), ProjectService::new(backend))
    }

    fn draft(title: &str, category: &str) -> ProjectDraft {
        ProjectDraft {
            title: title.to_string(),
            slug: slugify(title),
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_returns_submitted_fields_plus_generated() {
        let (_, service) = service();
        let mut input = draft("Landing Page", "Desarrollo Web");
        input.images = vec!["hero.png".to_string()];
        input.project_date = Some("2024".to_string());

        let project = service.create(&input).await.unwrap();
        assert!(!project.id.is_empty());
        assert_eq!(ProjectDraft::from_project(&project), input);
    }

    #[tokio::test]
    async fn test_delete_then_repeat_delete() {
        let (_, service) = service();
        let project = service.create(&draft("A", "Videojuegos")).await.unwrap();

        service.delete(&project.id).await.unwrap();
        assert!(service.list(None).await.unwrap().is_empty());
        assert!(matches!(
            service.delete(&project.id).await,
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_public_list_orders_undated_last() {
        let (backend, service) = service();
        backend.seed(
            PROJECTS_TABLE,
            vec![
                json!({"id": "1", "title": "Undated", "slug": "undated", "project_date": null,
                       "created_at": "2024-09-01T00:00:00Z"}),
                json!({"id": "2", "title": "Old", "slug": "old", "project_date": "2021",
                       "created_at": "2024-01-01T00:00:00Z"}),
                json!({"id": "3", "title": "Recent", "slug": "recent", "project_date": "2023",
                       "created_at": "2024-02-01T00:00:00Z"}),
            ],
        );

        let titles: Vec<String> = service
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Recent", "Old", "Undated"]);

        assert_eq!(service.list(Some(1)).await.unwrap().len(), 1);
        assert_eq!(service.list_recent().await.unwrap()[0].title, "Undated");
    }

    #[tokio::test]
    async fn test_get_by_slug_and_missing() {
        let (_, service) = service();
        service.create(&draft("Brand Identity", "Diseño Gráfico")).await.unwrap();
        let found = service.get_by_slug("brand-identity").await.unwrap();
        assert_eq!(found.title, "Brand Identity");
        assert!(matches!(
            service.get_by_slug("nope").await,
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_related_excludes_self_and_other_categories() {
        let (_, service) = service();
        let base = service.create(&draft("Base", "Desarrollo Web")).await.unwrap();
        for i in 0..6 {
            service
                .create(&draft(&format!("Web {}", i), "Desarrollo Web"))
                .await
                .unwrap();
        }
        service.create(&draft("Game", "Videojuegos")).await.unwrap();

        let related = service.related(&base, 4).await.unwrap();
        assert_eq!(related.len(), 4);
        assert!(related.iter().all(|p| p.slug != "base"));
        assert!(
            related
                .iter()
                .all(|p| p.category.as_deref() == Some("Desarrollo Web"))
        );
    }

    #[tokio::test]
    async fn test_update_missing_project() {
        let (_, service) = service();
        assert!(matches!(
            service.update("missing", &draft("A", "B")).await,
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_options_and_count() {
        let (_, service) = service();
        service.create(&draft("Zeta", "X")).await.unwrap();
        service.create(&draft("Alpha", "X")).await.unwrap();
        let options = service.options().await.unwrap();
        assert_eq!(options[0].title, "Alpha");
        assert_eq!(service.count().await.unwrap(), 2);
    }
}
