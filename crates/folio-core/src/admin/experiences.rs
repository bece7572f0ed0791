//! Experiences admin screen: moderation and manual entry

use tracing::warn;

use super::Confirm;
use super::workflow::CrudWorkflow;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    Experience, ExperienceDraft, ExperienceStatus, ProjectOption, ProjectRef, StatusAction,
    StatusFilter,
};
use crate::notify::Notifier;
use crate::services::{ExperienceService, ImageFile, ImageStorage, ProjectService, validate_image_file};

/// Experience editor contents
#[derive(Debug, Clone, Default)]
pub struct ExperienceForm {
    pub draft: ExperienceDraft,
    /// Newly selected photo, replacing `draft.image_url` when uploaded
    pub photo: Option<ImageFile>,
}

pub struct ExperiencesAdmin {
    experiences: ExperienceService,
    projects: ProjectService,
    storage: ImageStorage,
    notifier: Notifier,
    folder: String,
    filter: StatusFilter,
    project_options: Vec<ProjectOption>,
    workflow: CrudWorkflow<Experience>,
}

impl ExperiencesAdmin {
    pub fn new(
        experiences: ExperienceService,
        projects: ProjectService,
        storage: ImageStorage,
        notifier: Notifier,
        config: &Config,
    ) -> Self {
        Self {
            experiences,
            projects,
            storage,
            notifier,
            folder: config.storage.experience_folder.clone(),
            filter: StatusFilter::All,
            project_options: Vec::new(),
            workflow: CrudWorkflow::new(),
        }
    }

    pub fn workflow(&self) -> &CrudWorkflow<Experience> {
        &self.workflow
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    /// Projects an experience can be linked to
    pub fn project_options(&self) -> &[ProjectOption] {
        &self.project_options
    }

    pub async fn set_filter(&mut self, filter: StatusFilter) -> Result<()> {
        self.filter = filter;
        self.refresh().await
    }

    /// Reload the list for the current filter together with project options
    pub async fn refresh(&mut self) -> Result<()> {
        let (items, options) = tokio::join!(
            self.experiences.list(self.filter),
            self.projects.options()
        );
        match options {
            Ok(options) => self.project_options = options,
            Err(e) => warn!(error = %e, "Project options unavailable"),
        }
        match items {
            Ok(items) => {
                self.workflow.set_items(items);
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .error(format!("Could not load experiences: {}", e));
                Err(e)
            }
        }
    }

    pub fn new_experience(&mut self) -> ExperienceForm {
        self.workflow.start_create();
        ExperienceForm {
            draft: ExperienceDraft {
                show_on_home: true,
                ..Default::default()
            },
            photo: None,
        }
    }

    pub fn edit(&mut self, id: &str) -> Result<ExperienceForm> {
        let draft = self.workflow.start_edit(id)?.clone();
        Ok(ExperienceForm { draft, photo: None })
    }

    pub fn cancel(&mut self) {
        self.workflow.cancel();
    }

    /// Save the open form; experiences created here are published directly
    pub async fn submit(&mut self, form: ExperienceForm) -> Result<Experience> {
        if !self.workflow.is_editing() {
            return Err(Error::InvalidInput(
                "no experience form is open".to_string(),
            ));
        }
        let target = self.workflow.editing_target().map(|e| e.id.clone());

        match self.save(form, target.as_deref()).await {
            Ok(mut experience) => {
                experience.projects = self.linked_project(experience.project_id.as_deref());
                self.workflow.apply_saved(experience.clone());
                let verb = if target.is_some() { "updated" } else { "created" };
                self.notifier
                    .success(format!("Experience from '{}' {}", experience.name, verb));
                Ok(experience)
            }
            Err(e) => {
                self.workflow.fail(e.to_string());
                self.notifier
                    .error(format!("Could not save experience: {}", e));
                Err(e)
            }
        }
    }

    async fn save(&self, form: ExperienceForm, target: Option<&str>) -> Result<Experience> {
        let ExperienceForm { mut draft, photo } = form;
        draft.validate()?;
        let mut uploaded = None;
        if let Some(photo) = &photo {
            validate_image_file(photo, self.storage.max_bytes())?;
            let url = self.storage.upload_image(photo, &self.folder).await?;
            draft.image_url = Some(url.clone());
            uploaded = Some(url);
        }

        let saved = match target {
            Some(id) => self.experiences.update(id, &draft).await,
            None => {
                self.experiences
                    .create(&draft, ExperienceStatus::Published)
                    .await
            }
        };
        if let (Err(_), Some(url)) = (&saved, uploaded) {
            if let Err(e) = self.storage.delete_image(&url).await {
                warn!(url = %url, error = %e, "Could not remove orphaned photo");
            }
        }
        saved
    }

    fn linked_project(&self, project_id: Option<&str>) -> Option<ProjectRef> {
        let id = project_id?;
        self.project_options
            .iter()
            .find(|o| o.id == id)
            .map(|o| ProjectRef {
                title: o.title.clone(),
            })
    }

    pub async fn publish(&mut self, id: &str) -> Result<Experience> {
        self.change_status(id, StatusAction::Publish).await
    }

    pub async fn archive(&mut self, id: &str) -> Result<Experience> {
        self.change_status(id, StatusAction::Archive).await
    }

    pub async fn republish(&mut self, id: &str) -> Result<Experience> {
        self.change_status(id, StatusAction::Republish).await
    }

    async fn change_status(&mut self, id: &str, action: StatusAction) -> Result<Experience> {
        let result = self.experiences.transition(id, action).await;
        if let Ok(updated) = &result {
            self.workflow.replace(updated.clone());
        }
        self.notifier.report(
            &result,
            |e| format!("Status updated to: {}", e.status),
            "Could not update status",
        );
        result
    }

    /// Delete after confirmation, removing the photo first (best effort)
    pub async fn delete(&mut self, id: &str, confirm: &dyn Confirm) -> Result<()> {
        let experience = self
            .workflow
            .find(id)
            .cloned()
            .ok_or_else(|| Error::ExperienceNotFound(id.to_string()))?;
        if !confirm.confirm(&format!(
            "Delete the experience from \"{}\"?",
            experience.name
        )) {
            return Err(Error::UserCancelled);
        }
        self.workflow.begin_delete(id)?;

        if let Some(url) = &experience.image_url {
            if let Err(e) = self.storage.delete_image(url).await {
                warn!(id = %id, error = %e, "Experience photo could not be removed");
            }
        }

        let result = self.experiences.delete(id).await;
        self.workflow.finish_delete(id, result.is_ok());
        self.notifier.report(
            &result,
            |_| format!("Experience from '{}' deleted", experience.name),
            "Could not delete experience",
        );
        result
    }
}
