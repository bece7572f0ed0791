//! Admin panel workflows
//!
//! Screen state for managing projects and experiences. Operations return
//! plain results; outcomes are additionally reported to the `Notifier`.

pub mod experiences;
pub mod projects;
pub mod workflow;

pub use experiences::{ExperienceForm, ExperiencesAdmin};
pub use projects::{GALLERY_SLOTS, ProjectForm, ProjectsAdmin};
pub use workflow::{CrudWorkflow, Mode, Record};

/// Confirmation step before destructive actions
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answer decided ahead of time (e.g. a `--force` flag)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preapproved(pub bool);

impl Confirm for Preapproved {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}
