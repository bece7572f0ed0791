//! List/form state machine shared by the admin screens
//!
//! A screen is either showing its list or editing one draft. Saved records
//! are merged into the local list (prepended on create, replaced on update)
//! instead of refetching. At most one delete runs at a time.

use crate::error::{Error, Result};
use crate::models::{Experience, ExperienceDraft, Project, ProjectDraft};

/// A record managed by a `CrudWorkflow`
pub trait Record: Clone {
    type Draft: Clone + Default;

    fn id(&self) -> &str;

    fn to_draft(&self) -> Self::Draft;

    fn not_found(id: &str) -> Error;
}

impl Record for Project {
    type Draft = ProjectDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn to_draft(&self) -> ProjectDraft {
        ProjectDraft::from_project(self)
    }

    fn not_found(id: &str) -> Error {
        Error::ProjectNotFound(id.to_string())
    }
}

impl Record for Experience {
    type Draft = ExperienceDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn to_draft(&self) -> ExperienceDraft {
        ExperienceDraft::from_experience(self)
    }

    fn not_found(id: &str) -> Error {
        Error::ExperienceNotFound(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode<D> {
    ViewingList,
    /// `target` is `None` when creating
    Editing { target: Option<String>, draft: D },
}

#[derive(Debug, Clone)]
pub struct CrudWorkflow<R: Record> {
    items: Vec<R>,
    mode: Mode<R::Draft>,
    error: Option<String>,
    deleting: Option<String>,
}

impl<R: Record> Default for CrudWorkflow<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            mode: Mode::ViewingList,
            error: None,
            deleting: None,
        }
    }
}

impl<R: Record> CrudWorkflow<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[R] {
        &self.items
    }

    pub fn find(&self, id: &str) -> Option<&R> {
        self.items.iter().find(|r| r.id() == id)
    }

    pub fn mode(&self) -> &Mode<R::Draft> {
        &self.mode
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, Mode::Editing { .. })
    }

    /// Record being edited, if editing an existing one
    pub fn editing_target(&self) -> Option<&R> {
        match &self.mode {
            Mode::Editing {
                target: Some(id), ..
            } => self.find(id),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&R::Draft> {
        match &self.mode {
            Mode::Editing { draft, .. } => Some(draft),
            Mode::ViewingList => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut R::Draft> {
        match &mut self.mode {
            Mode::Editing { draft, .. } => Some(draft),
            Mode::ViewingList => None,
        }
    }

    /// Inline error of the form
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the list with freshly loaded records
    pub fn set_items(&mut self, items: Vec<R>) {
        self.items = items;
    }

    pub fn start_create(&mut self) {
        self.error = None;
        self.mode = Mode::Editing {
            target: None,
            draft: R::Draft::default(),
        };
    }

    pub fn start_edit(&mut self, id: &str) -> Result<&R::Draft> {
        let draft = self.find(id).ok_or_else(|| R::not_found(id))?.to_draft();
        self.error = None;
        self.mode = Mode::Editing {
            target: Some(id.to_string()),
            draft,
        };
        match &self.mode {
            Mode::Editing { draft, .. } => Ok(draft),
            Mode::ViewingList => Err(R::not_found(id)),
        }
    }

    /// Discard in-memory edits
    pub fn cancel(&mut self) {
        self.error = None;
        self.mode = Mode::ViewingList;
    }

    /// Merge a saved record and return to the list
    pub fn apply_saved(&mut self, record: R) {
        let updating = matches!(&self.mode, Mode::Editing { target: Some(_), .. });
        if updating {
            self.replace(record);
        } else {
            self.items.insert(0, record);
        }
        self.error = None;
        self.mode = Mode::ViewingList;
    }

    /// Record a save failure; the form stays open
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Swap in an updated copy of a listed record
    pub fn replace(&mut self, record: R) {
        if let Some(slot) = self.items.iter_mut().find(|r| r.id() == record.id()) {
            *slot = record;
        }
    }

    pub fn begin_delete(&mut self, id: &str) -> Result<()> {
        if let Some(current) = &self.deleting {
            return Err(Error::DeleteInProgress(current.clone()));
        }
        self.deleting = Some(id.to_string());
        Ok(())
    }

    /// End the delete started for `id`; the record leaves the list only when
    /// it was actually removed
    pub fn finish_delete(&mut self, id: &str, removed: bool) {
        if removed {
            self.items.retain(|r| r.id() != id);
        }
        if self.deleting.as_deref() == Some(id) {
            self.deleting = None;
        }
    }

    pub fn is_deleting(&self, id: &str) -> bool {
        self.deleting.as_deref() == Some(id)
    }

    pub fn delete_in_progress(&self) -> bool {
        self.deleting.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        label: String,
    }

    impl Record for Item {
        type Draft = String;

        fn id(&self) -> &str {
            &self.id
        }

        fn to_draft(&self) -> String {
            self.label.clone()
        }

        fn not_found(id: &str) -> Error {
            Error::Other(format!("no item {}", id))
        }
    }

    fn item(id: &str, label: &str) -> Item {
        Item {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    fn workflow() -> CrudWorkflow<Item> {
        let mut wf = CrudWorkflow::new();
        wf.set_items(vec![item("1", "one"), item("2", "two")]);
        wf
    }

    #[test]
    fn test_create_prepends_and_returns_to_list() {
        let mut wf = workflow();
        wf.start_create();
        assert_eq!(wf.draft(), Some(&String::new()));
        wf.apply_saved(item("3", "three"));
        assert_eq!(wf.items()[0].id, "3");
        assert_eq!(*wf.mode(), Mode::ViewingList);
    }

    #[test]
    fn test_edit_replaces_in_place() {
        let mut wf = workflow();
        assert_eq!(wf.start_edit("2").unwrap(), "two");
        wf.draft_mut().unwrap().push_str("!");
        assert_eq!(wf.editing_target().map(|i| i.label.as_str()), Some("two"));
        wf.apply_saved(item("2", "two!"));
        assert_eq!(wf.items().len(), 2);
        assert_eq!(wf.items()[1].label, "two!");
    }

    #[test]
    fn test_cancel_discards_edits() {
        let mut wf = workflow();
        wf.start_edit("1").unwrap();
        wf.draft_mut().unwrap().clear();
        wf.cancel();
        assert!(!wf.is_editing());
        assert_eq!(wf.items()[0].label, "one");
    }

    #[test]
    fn test_failure_keeps_form_open() {
        let mut wf = workflow();
        wf.start_create();
        wf.fail("backend down");
        assert!(wf.is_editing());
        assert_eq!(wf.error(), Some("backend down"));
    }

    #[test]
    fn test_edit_unknown_record() {
        let mut wf = workflow();
        assert!(wf.start_edit("9").is_err());
        assert!(!wf.is_editing());
    }

    #[test]
    fn test_deletes_are_serialized() {
        let mut wf = workflow();
        wf.begin_delete("1").unwrap();
        assert!(wf.is_deleting("1"));
        assert!(matches!(
            wf.begin_delete("2"),
            Err(Error::DeleteInProgress(ref id)) if id == "1"
        ));

        wf.finish_delete("1", true);
        assert!(!wf.delete_in_progress());
        assert_eq!(wf.items().len(), 1);

        wf.begin_delete("2").unwrap();
        wf.finish_delete("2", false);
        assert_eq!(wf.items().len(), 1);
    }
}
