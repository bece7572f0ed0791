//! Data-access services
//!
//! One service per resource. Each translates an operation into backend
//! calls and returns typed records; failures come back as `Err`, never as
//! panics.

pub mod experiences;
pub mod metrics;
pub mod projects;
pub mod storage;

pub use experiences::{EXPERIENCES_TABLE, ExperienceService};
pub use metrics::MetricsService;
pub use projects::{PROJECTS_TABLE, ProjectService};
pub use storage::{
    ImageFile, ImageStorage, content_type_for, generate_file_name, storage_path_from_url,
    validate_image_file,
};
