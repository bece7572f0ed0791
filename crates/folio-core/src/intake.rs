//! Public experience intake
//!
//! Two-step popup flow: the visitor fills the form, then sees a thank-you
//! step. Submissions always land as `new` and wait for moderation.

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Experience, ExperienceDraft, IMPROVEMENT_OTHER, Rating};
use crate::services::{ExperienceService, ImageFile, ImageStorage, validate_image_file};

pub const HOW_FOUND_OPTIONS: &[&str] = &[
    "Redes sociales",
    "Búsqueda web",
    "Recomendación de amigo o familiar",
];

pub const SERVICE_OPTIONS: &[&str] = &[
    "Diseño Gráfico",
    "Desarrollo Web",
    "Aplicaciones Móviles",
    "Videojuegos",
];

pub const IMPROVEMENT_OPTIONS: &[&str] = &[
    "Tiempo de respuesta",
    "Ampliar servicios",
    "Soporte a clientes",
    IMPROVEMENT_OTHER,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntakeStep {
    #[default]
    Form,
    ThankYou,
}

/// Everything the visitor types into the form
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeFields {
    pub how_found: String,
    pub service_acquired: String,
    pub improvement_aspect: String,
    pub improvement_other: String,
    pub name: String,
    pub review: String,
    pub rating: i64,
}

impl Default for IntakeFields {
    fn default() -> Self {
        Self {
            how_found: String::new(),
            service_acquired: String::new(),
            improvement_aspect: String::new(),
            improvement_other: String::new(),
            name: String::new(),
            review: String::new(),
            rating: i64::from(Rating::MAX),
        }
    }
}

impl IntakeFields {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("how_found", &self.how_found),
            ("service_acquired", &self.service_acquired),
            ("improvement_aspect", &self.improvement_aspect),
            ("name", &self.name),
            ("review", &self.review),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::MissingField(field.to_string()));
            }
        }
        if self.improvement_aspect == IMPROVEMENT_OTHER && self.improvement_other.trim().is_empty()
        {
            return Err(Error::MissingField("improvement_other".to_string()));
        }
        Rating::new(self.rating)?;
        Ok(())
    }

    fn to_draft(&self, image_url: Option<String>) -> Result<ExperienceDraft> {
        Ok(ExperienceDraft {
            name: self.name.trim().to_string(),
            image_url,
            rating: Rating::new(self.rating)?,
            review: self.review.trim().to_string(),
            how_found: Some(self.how_found.clone()),
            service_acquired: Some(self.service_acquired.clone()),
            improvement_aspect: Some(self.improvement_aspect.clone()),
            improvement_other: non_empty(&self.improvement_other),
            project_id: None,
            show_on_home: true,
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub struct IntakeForm {
    experiences: ExperienceService,
    storage: ImageStorage,
    folder: String,
    max_photo_bytes: u64,
    step: IntakeStep,
    fields: IntakeFields,
    photo: Option<ImageFile>,
    error: Option<String>,
    submitting: bool,
}

impl IntakeForm {
    pub fn new(experiences: ExperienceService, storage: ImageStorage, config: &Config) -> Self {
        Self {
            experiences,
            storage,
            folder: config.storage.experience_folder.clone(),
            max_photo_bytes: config.storage.max_photo_bytes(),
            step: IntakeStep::Form,
            fields: IntakeFields::default(),
            photo: None,
            error: None,
            submitting: false,
        }
    }

    pub fn step(&self) -> IntakeStep {
        self.step
    }

    pub fn fields(&self) -> &IntakeFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut IntakeFields {
        &mut self.fields
    }

    pub fn photo(&self) -> Option<&ImageFile> {
        self.photo.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Select the optional photo; rejected files leave the previous choice
    pub fn attach_photo(&mut self, file: ImageFile) -> Result<()> {
        if let Err(e) = validate_image_file(&file, self.max_photo_bytes) {
            self.error = Some(e.to_string());
            return Err(e);
        }
        self.error = None;
        self.photo = Some(file);
        Ok(())
    }

    pub fn remove_photo(&mut self) {
        self.photo = None;
    }

    /// Upload the photo (if any), then insert the experience as `new`
    pub async fn submit(&mut self) -> Result<Experience> {
        if self.step == IntakeStep::ThankYou {
            return Err(Error::InvalidInput(
                "this form was already submitted".to_string(),
            ));
        }
        self.error = None;
        self.submitting = true;
        let result = self.send().await;
        self.submitting = false;

        match result {
            Ok(experience) => {
                info!(id = %experience.id, "Experience submitted for review");
                self.step = IntakeStep::ThankYou;
                Ok(experience)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn send(&self) -> Result<Experience> {
        self.fields.validate()?;
        let image_url = match &self.photo {
            Some(photo) => Some(
                self.storage
                    .upload_image(photo, &self.folder)
                    .await
                    .map_err(|e| Error::UploadFailed(format!("photo could not be uploaded: {}", e)))?,
            ),
            None => None,
        };
        let draft = self.fields.to_draft(image_url.clone())?;
        let submitted = self.experiences.submit(&draft).await;
        if let (Err(_), Some(url)) = (&submitted, image_url) {
            if let Err(e) = self.storage.delete_image(&url).await {
                warn!(url = %url, error = %e, "Could not remove orphaned photo");
            }
        }
        submitted
    }

    /// Close the popup: back to a blank first step
    pub fn reset(&mut self) {
        self.step = IntakeStep::Form;
        self.fields = IntakeFields::default();
        self.photo = None;
        self.error = None;
        self.submitting = false;
    }
}
