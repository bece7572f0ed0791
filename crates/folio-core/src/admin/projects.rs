//! Projects admin screen

use futures_util::future::join_all;
use tracing::{info, warn};

use super::Confirm;
use super::workflow::CrudWorkflow;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Project, ProjectDraft, slugify};
use crate::notify::Notifier;
use crate::services::{ImageFile, ImageStorage, ProjectService, validate_image_file};

/// Square gallery tiles after the hero image
pub const GALLERY_SLOTS: usize = 4;

/// Project editor contents, including newly selected image files
#[derive(Debug, Clone, Default)]
pub struct ProjectForm {
    pub title: String,
    /// Empty means "derive from the title"
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub link: Option<String>,
    pub project_date: Option<String>,
    pub main_image: Option<ImageFile>,
    pub hero_image: Option<ImageFile>,
    pub gallery: [Option<ImageFile>; GALLERY_SLOTS],
}

impl ProjectForm {
    pub fn from_draft(draft: &ProjectDraft) -> Self {
        Self {
            title: draft.title.clone(),
            slug: draft.slug.clone(),
            description: draft.description.clone(),
            category: draft.category.clone(),
            link: draft.link.clone(),
            project_date: draft.project_date.clone(),
            ..Default::default()
        }
    }

    /// Change the title and re-derive the slug from it
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.slug = slugify(&self.title);
    }

    pub fn resolved_slug(&self) -> String {
        if self.slug.trim().is_empty() {
            slugify(&self.title)
        } else {
            self.slug.trim().to_string()
        }
    }

    fn files(&self) -> impl Iterator<Item = &ImageFile> {
        self.main_image
            .iter()
            .chain(self.hero_image.iter())
            .chain(self.gallery.iter().flatten())
    }

    /// Everything that can be checked without the network
    pub fn validate(&self, categories: &[String], max_image_bytes: u64) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::MissingField("title".to_string()));
        }
        if self.resolved_slug().is_empty() {
            return Err(Error::MissingField("slug".to_string()));
        }
        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::MissingField("category".to_string()))?;
        if !categories.is_empty() && !categories.iter().any(|c| c == category) {
            return Err(Error::InvalidInput(format!(
                "unknown category '{}' (expected one of: {})",
                category,
                categories.join(", ")
            )));
        }
        for file in self.files() {
            validate_image_file(file, max_image_bytes)?;
        }
        Ok(())
    }
}

pub struct ProjectsAdmin {
    projects: ProjectService,
    storage: ImageStorage,
    notifier: Notifier,
    folder: String,
    categories: Vec<String>,
    workflow: CrudWorkflow<Project>,
}

impl ProjectsAdmin {
    pub fn new(
        projects: ProjectService,
        storage: ImageStorage,
        notifier: Notifier,
        config: &Config,
    ) -> Self {
        Self {
            projects,
            storage,
            notifier,
            folder: config.storage.project_folder.clone(),
            categories: config.site.categories.clone(),
            workflow: CrudWorkflow::new(),
        }
    }

    pub fn workflow(&self) -> &CrudWorkflow<Project> {
        &self.workflow
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Reload the list, newest first
    pub async fn refresh(&mut self) -> Result<()> {
        match self.projects.list_recent().await {
            Ok(items) => {
                self.workflow.set_items(items);
                Ok(())
            }
            Err(e) => {
                self.notifier.error(format!("Could not load projects: {}", e));
                Err(e)
            }
        }
    }

    pub fn new_project(&mut self) -> ProjectForm {
        self.workflow.start_create();
        ProjectForm::default()
    }

    pub fn edit(&mut self, id: &str) -> Result<ProjectForm> {
        let draft = self.workflow.start_edit(id)?;
        Ok(ProjectForm::from_draft(draft))
    }

    pub fn cancel(&mut self) {
        self.workflow.cancel();
    }

    /// Save the open form: upload images, then create or update the row
    pub async fn submit(&mut self, form: ProjectForm) -> Result<Project> {
        if !self.workflow.is_editing() {
            return Err(Error::InvalidInput("no project form is open".to_string()));
        }
        let previous = self.workflow.editing_target().cloned();

        match self.save(&form, previous.as_ref()).await {
            Ok(project) => {
                self.workflow.apply_saved(project.clone());
                let verb = if previous.is_some() { "updated" } else { "created" };
                self.notifier
                    .success(format!("Project '{}' {}", project.title, verb));
                Ok(project)
            }
            Err(e) => {
                self.workflow.fail(e.to_string());
                self.notifier.error(format!("Could not save project: {}", e));
                Err(e)
            }
        }
    }

    async fn upload_slot(&self, file: Option<&ImageFile>) -> Option<Result<String>> {
        match file {
            Some(file) => Some(self.storage.upload_image(file, &self.folder).await),
            None => None,
        }
    }

    async fn save(&self, form: &ProjectForm, previous: Option<&Project>) -> Result<Project> {
        form.validate(&self.categories, self.storage.max_bytes())?;

        let (main, hero, gallery) = tokio::join!(
            self.upload_slot(form.main_image.as_ref()),
            self.upload_slot(form.hero_image.as_ref()),
            join_all(form.gallery.iter().map(|f| self.upload_slot(f.as_ref())))
        );

        let uploaded: Vec<String> = main
            .iter()
            .chain(hero.iter())
            .chain(gallery.iter().flatten())
            .filter_map(|r| r.as_ref().ok().cloned())
            .collect();
        let previous_images = previous.map(|p| p.images.as_slice()).unwrap_or(&[]);

        let (image_url, images) = match assemble_images(main, hero, gallery, previous, previous_images) {
            Ok(assembled) => assembled,
            Err(e) => {
                self.storage.delete_images(&uploaded).await;
                return Err(e);
            }
        };

        let draft = ProjectDraft {
            title: form.title.trim().to_string(),
            slug: form.resolved_slug(),
            description: form.description.clone(),
            category: form.category.clone(),
            image_url,
            images,
            link: form.link.clone().filter(|l| !l.trim().is_empty()),
            project_date: form.project_date.clone().filter(|d| !d.trim().is_empty()),
        };

        let saved = match previous {
            Some(project) => self.projects.update(&project.id, &draft).await,
            None => self.projects.create(&draft).await,
        };
        if saved.is_err() {
            self.storage.delete_images(&uploaded).await;
        }
        saved
    }

    /// Delete a project after confirmation; its stored images are removed
    /// first on a best-effort basis
    pub async fn delete(&mut self, id: &str, confirm: &dyn Confirm) -> Result<()> {
        let project = self
            .workflow
            .find(id)
            .cloned()
            .ok_or_else(|| Error::ProjectNotFound(id.to_string()))?;
        if !confirm.confirm(&format!("Delete \"{}\"?", project.title)) {
            return Err(Error::UserCancelled);
        }
        self.workflow.begin_delete(id)?;

        let cleanup = self.storage.delete_images(&project.all_image_urls()).await;
        let failed = cleanup.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            info!(id = %id, failed, "Some project images could not be removed");
        }

        let result = self.projects.delete(id).await;
        self.workflow.finish_delete(id, result.is_ok());
        self.notifier.report(
            &result,
            |_| format!("Project '{}' deleted", project.title),
            "Could not delete project",
        );
        result
    }
}

/// Primary image and ordered image list from the upload outcomes.
/// Main and hero failures abort; a failed gallery slot keeps the image
/// it had before.
fn assemble_images(
    main: Option<Result<String>>,
    hero: Option<Result<String>>,
    gallery: Vec<Option<Result<String>>>,
    previous: Option<&Project>,
    previous_images: &[String],
) -> Result<(Option<String>, Vec<String>)> {
    let image_url = match main {
        Some(Ok(url)) => Some(url),
        Some(Err(e)) => return Err(Error::UploadFailed(format!("main image: {}", e))),
        None => previous.and_then(|p| p.image_url.clone()),
    };

    let mut images = Vec::new();
    match hero {
        Some(Ok(url)) => images.push(url),
        Some(Err(e)) => return Err(Error::UploadFailed(format!("hero image: {}", e))),
        None => images.extend(previous_images.first().cloned()),
    }

    for (slot, outcome) in gallery.into_iter().enumerate() {
        let kept = previous_images.get(slot + 1).cloned();
        match outcome {
            Some(Ok(url)) => images.push(url),
            Some(Err(e)) => {
                warn!(slot = slot + 1, error = %e, "Gallery upload failed, keeping previous image");
                images.extend(kept);
            }
            None => images.extend(kept),
        }
    }

    Ok((image_url, images))
}
