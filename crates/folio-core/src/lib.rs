//! Folio Core Library
//!
//! Data layer and workflows for a personal portfolio site:
//! - Backend boundary (hosted tables, object storage, auth) with HTTP and in-memory implementations
//! - Services for projects, experiences, images, and visit/download metrics
//! - Loadable resources and the auth context
//! - Admin CRUD workflows and experience moderation
//! - Public intake form, contact relay, and route table

pub mod admin;
pub mod auth;
pub mod backend;
pub mod config;
pub mod contact;
pub mod error;
pub mod intake;
pub mod local_store;
pub mod models;
pub mod notify;
pub mod resources;
pub mod routing;
pub mod services;
pub mod site;

pub use error::{Error, ErrorKind, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::auth::{AuthContext, Session, User};
    pub use crate::backend::{Backend, MemoryBackend, SupabaseClient};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::models::{DateRange, Experience, ExperienceStatus, Project};
    pub use crate::notify::Notifier;
}
