//! Experience (testimonial) data access

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::backend::{Backend, Query, Row, from_row, from_rows, to_row};
use crate::error::{Error, Result};
use crate::models::{Experience, ExperienceDraft, ExperienceStatus, StatusAction, StatusFilter};

pub const EXPERIENCES_TABLE: &str = "experiences";

/// Experience columns plus the linked project's title
const WITH_PROJECT: &str = "*, projects(title)";

#[derive(Clone)]
pub struct ExperienceService {
    backend: Arc<dyn Backend>,
}

impl ExperienceService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Admin listing, newest first
    pub async fn list(&self, filter: StatusFilter) -> Result<Vec<Experience>> {
        let mut query = Query::table(EXPERIENCES_TABLE)
            .select(WITH_PROJECT)
            .order("created_at", false);
        if let StatusFilter::Only(status) = filter {
            query = query.eq("status", status.as_str());
        }
        self.fetch(&query).await
    }

    pub async fn get(&self, id: &str) -> Result<Experience> {
        let query = Query::table(EXPERIENCES_TABLE)
            .select(WITH_PROJECT)
            .eq("id", id)
            .limit(1);
        self.fetch(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ExperienceNotFound(id.to_string()))
    }

    /// Insert with an explicit initial status
    pub async fn create(&self, draft: &ExperienceDraft, status: ExperienceStatus) -> Result<Experience> {
        draft.validate()?;
        let mut row = to_row(draft)?;
        row.insert("status".to_string(), Value::from(status.as_str()));
        let stored = self.backend.insert(EXPERIENCES_TABLE, row).await?;
        let experience: Experience = from_row(EXPERIENCES_TABLE, stored)?;
        info!(id = %experience.id, status = %status, "Experience created");
        Ok(experience)
    }

    /// Public intake; always lands in `new`
    pub async fn submit(&self, draft: &ExperienceDraft) -> Result<Experience> {
        self.create(draft, ExperienceStatus::New).await
    }

    pub async fn update(&self, id: &str, draft: &ExperienceDraft) -> Result<Experience> {
        draft.validate()?;
        self.patch(id, to_row(draft)?).await
    }

    /// Apply a moderation action after checking it against the current status
    pub async fn transition(&self, id: &str, action: StatusAction) -> Result<Experience> {
        let current = self.get(id).await?;
        let target = action.apply(current.status)?;

        let mut patch = Row::new();
        patch.insert("status".to_string(), Value::from(target.as_str()));
        let mut updated = self.patch(id, patch).await?;
        updated.projects = current.projects;
        info!(id = %id, from = %current.status, to = %target, "Experience status changed");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.backend
            .delete(EXPERIENCES_TABLE, id)
            .await
            .map_err(|e| not_found_as_experience(e, id))?;
        info!(id = %id, "Experience deleted");
        Ok(())
    }

    /// Published experiences linked to a project, newest first
    pub async fn for_project(&self, project_id: &str) -> Result<Vec<Experience>> {
        let query = Query::table(EXPERIENCES_TABLE)
            .eq("project_id", project_id)
            .eq("status", ExperienceStatus::Published.as_str())
            .order("created_at", false);
        self.fetch(&query).await
    }

    /// Testimonials shown on the home page, oldest first
    pub async fn public_feed(&self) -> Result<Vec<Experience>> {
        let query = Query::table(EXPERIENCES_TABLE)
            .select(WITH_PROJECT)
            .eq("status", ExperienceStatus::Published.as_str())
            .order("created_at", true);
        // A missing show_on_home column counts as shown
        let mut feed = self.fetch(&query).await?;
        feed.retain(|e| e.show_on_home);
        Ok(feed)
    }

    /// Most recent submissions awaiting moderation
    pub async fn latest_new(&self, n: usize) -> Result<Vec<Experience>> {
        let query = Query::table(EXPERIENCES_TABLE)
            .select(WITH_PROJECT)
            .eq("status", ExperienceStatus::New.as_str())
            .order("created_at", false)
            .limit(n);
        self.fetch(&query).await
    }

    pub async fn count_published(&self) -> Result<u64> {
        self.backend
            .count(
                &Query::table(EXPERIENCES_TABLE)
                    .eq("status", ExperienceStatus::Published.as_str()),
            )
            .await
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Experience>> {
        from_rows(EXPERIENCES_TABLE, self.backend.select(query).await?)
    }

    async fn patch(&self, id: &str, patch: Row) -> Result<Experience> {
        let row = self
            .backend
            .update(EXPERIENCES_TABLE, id, patch)
            .await
            .map_err(|e| not_found_as_experience(e, id))?;
        from_row(EXPERIENCES_TABLE, row)
    }
}

fn not_found_as_experience(error: Error, id: &str) -> Error {
    match error {
        Error::RowNotFound { .. } => Error::ExperienceNotFound(id.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::Rating;
    use serde_json::json;

    fn service() -> (Arc<MemoryBackend>, ExperienceService) {
        let backend = Arc::new(MemoryBackend::new());
        (backend.clone(), ExperienceService::new(backend))
    }

    fn draft(name: &str) -> ExperienceDraft {
        ExperienceDraft {
            name: name.to_string(),
            rating: Rating::new(4).unwrap(),
            review: "Excelente trabajo".to_string(),
            show_on_home: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_submit_is_always_new() {
        let (_, service) = service();
        let experience = service.submit(&draft("Ana")).await.unwrap();
        assert_eq!(experience.status, ExperienceStatus::New);
        assert_eq!(experience.rating.value(), 4);
    }

    #[tokio::test]
    async fn test_transitions_follow_graph() {
        let (_, service) = service();
        let e = service.submit(&draft("Ana")).await.unwrap();

        assert!(matches!(
            service.transition(&e.id, StatusAction::Archive).await,
            Err(Error::InvalidTransition { .. })
        ));
        let published = service.transition(&e.id, StatusAction::Publish).await.unwrap();
        assert_eq!(published.status, ExperienceStatus::Published);
        let archived = service.transition(&e.id, StatusAction::Archive).await.unwrap();
        assert_eq!(archived.status, ExperienceStatus::Archived);
        let again = service.transition(&e.id, StatusAction::Republish).await.unwrap();
        assert_eq!(again.status, ExperienceStatus::Published);
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_joins_title() {
        let (backend, service) = service();
        backend.seed("projects", vec![json!({"id": "p1", "title": "Brand"})]);
        let mut linked = draft("Ana");
        linked.project_id = Some("p1".to_string());
        service.create(&linked, ExperienceStatus::Published).await.unwrap();
        service.submit(&draft("Luis")).await.unwrap();

        let all = service.list(StatusFilter::All).await.unwrap();
        assert_eq!(all.len(), 2);
        let published = service
            .list(StatusFilter::Only(ExperienceStatus::Published))
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].project_title(), Some("Brand"));
    }

    #[tokio::test]
    async fn test_public_feed_is_oldest_first_and_visible_only() {
        let (backend, service) = service();
        backend.seed(
            EXPERIENCES_TABLE,
            vec![
                json!({"id": "late", "name": "B", "rating": 5, "review": "r", "status": "published",
                       "show_on_home": true, "created_at": "2024-03-01T00:00:00Z"}),
                json!({"id": "early", "name": "A", "rating": 5, "review": "r", "status": "published",
                       "show_on_home": true, "created_at": "2024-01-01T00:00:00Z"}),
                json!({"id": "hidden", "name": "C", "rating": 5, "review": "r", "status": "published",
                       "show_on_home": false, "created_at": "2024-02-01T00:00:00Z"}),
                json!({"id": "pending", "name": "D", "rating": 5, "review": "r", "status": "new",
                       "show_on_home": true, "created_at": "2024-02-15T00:00:00Z"}),
            ],
        );

        let ids: Vec<String> = service
            .public_feed()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(service.count_published().await.unwrap(), 3);
        assert_eq!(service.latest_new(5).await.unwrap()[0].id, "pending");
    }

    #[tokio::test]
    async fn test_public_feed_shows_rows_without_home_flag() {
        let (backend, service) = service();
        backend.seed(
            EXPERIENCES_TABLE,
            vec![
                json!({"id": "legacy", "name": "A", "rating": 5, "review": "r", "status": "published",
                       "created_at": "2024-01-01T00:00:00Z"}),
                json!({"id": "null", "name": "B", "rating": 4, "review": "r", "status": "published",
                       "show_on_home": null, "created_at": "2024-02-01T00:00:00Z"}),
            ],
        );

        let feed = service.public_feed().await.unwrap();
        assert_eq!(feed.len(), 2);
        assert!(feed.iter().all(|e| e.show_on_home));
    }

    #[tokio::test]
    async fn test_for_project_only_published() {
        let (_, service) = service();
        let mut a = draft("Ana");
        a.project_id = Some("p1".to_string());
        service.create(&a, ExperienceStatus::Published).await.unwrap();
        service.submit(&a).await.unwrap();

        assert_eq!(service.for_project("p1").await.unwrap().len(), 1);
        assert!(service.for_project("p2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_experience() {
        let (_, service) = service();
        assert!(matches!(
            service.delete("nope").await,
            Err(Error::ExperienceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_validates_before_insert() {
        let (backend, service) = service();
        let mut bad = draft("Ana");
        bad.review.clear();
        assert!(matches!(
            service.submit(&bad).await,
            Err(Error::MissingField(_))
        ));
        assert!(backend.rows(EXPERIENCES_TABLE).is_empty());
    }
}
