use std::collections::BTreeMap;

use shared::domain::RecordKey;

use crate::{
    fetcher::{Loaded, Page},
    record::Record,
    transport::FilePart,
};

/// Lifecycle of one pending action target (edit draft or delete confirmation).
///
/// `Idle -> Selected -> Submitting -> Idle` on success, or
/// `Submitting -> Failed -> Selected` on failure. `cancel` returns to `Idle`
/// from any state except `Submitting`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSlot<T> {
    Idle,
    Selected(T),
    Submitting(T),
    Failed { target: T, message: String },
}

impl<T> Default for ActionSlot<T> {
    fn default() -> Self {
        ActionSlot::Idle
    }
}

impl<T> ActionSlot<T> {
    pub fn select(&mut self, target: T) -> bool {
        if self.is_submitting() {
            return false;
        }
        *self = ActionSlot::Selected(target);
        true
    }

    pub fn cancel(&mut self) -> bool {
        match self {
            ActionSlot::Selected(_) | ActionSlot::Failed { .. } => {
                *self = ActionSlot::Idle;
                true
            }
            ActionSlot::Idle | ActionSlot::Submitting(_) => false,
        }
    }

    /// Moves `Selected` or `Failed` to `Submitting`. Returns the target, or
    /// `None` when there is nothing to submit or a submission is already running.
    pub fn begin_submit(&mut self) -> Option<&T> {
        match std::mem::take(self) {
            ActionSlot::Selected(target) | ActionSlot::Failed { target, .. } => {
                *self = ActionSlot::Submitting(target);
            }
            other => {
                *self = other;
                return None;
            }
        }
        self.target()
    }

    pub fn finish_ok(&mut self) {
        if self.is_submitting() {
            *self = ActionSlot::Idle;
        }
    }

    pub fn finish_err(&mut self, message: impl Into<String>) {
        *self = match std::mem::take(self) {
            ActionSlot::Submitting(target) => ActionSlot::Failed {
                target,
                message: message.into(),
            },
            other => other,
        };
    }

    /// Acknowledges a failure and returns the target to `Selected` for another try.
    pub fn reselect(&mut self) {
        *self = match std::mem::take(self) {
            ActionSlot::Failed { target, .. } => ActionSlot::Selected(target),
            other => other,
        };
    }

    pub fn target(&self) -> Option<&T> {
        match self {
            ActionSlot::Idle => None,
            ActionSlot::Selected(target)
            | ActionSlot::Submitting(target)
            | ActionSlot::Failed { target, .. } => Some(target),
        }
    }

    /// Only an open, non-submitting target can be edited.
    pub fn target_mut(&mut self) -> Option<&mut T> {
        match self {
            ActionSlot::Selected(target) | ActionSlot::Failed { target, .. } => Some(target),
            ActionSlot::Idle | ActionSlot::Submitting(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            ActionSlot::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, ActionSlot::Idle)
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, ActionSlot::Submitting(_))
    }
}

/// Local copy of a record being edited, plus any files to upload with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft<R> {
    pub key: RecordKey,
    pub record: R,
    pub attachments: Vec<FilePart>,
}

impl<R: Record> Draft<R> {
    pub fn of(record: &R) -> Self {
        Self {
            key: record.key(),
            record: record.clone(),
            attachments: Vec::new(),
        }
    }

    pub fn attach(&mut self, part: FilePart) {
        self.attachments.retain(|existing| existing.field != part.field);
        self.attachments.push(part);
    }
}

/// In-memory state of one list screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<R> {
    page: Loaded<R>,
    editing: ActionSlot<Draft<R>>,
    pending_delete: ActionSlot<RecordKey>,
    message: Option<String>,
    error: Option<String>,
    field_errors: BTreeMap<String, Vec<String>>,
}

impl<R> Default for ViewState<R> {
    fn default() -> Self {
        Self {
            page: Loaded::NotLoaded,
            editing: ActionSlot::Idle,
            pending_delete: ActionSlot::Idle,
            message: None,
            error: None,
            field_errors: BTreeMap::new(),
        }
    }
}

impl<R: Record> ViewState<R> {
    pub fn page(&self) -> &Loaded<R> {
        &self.page
    }

    pub fn records(&self) -> &[R] {
        self.page.records()
    }

    /// True once a fetch succeeded with zero rows; the screen shows "no records".
    pub fn is_empty_result(&self) -> bool {
        self.page.page().is_some_and(Page::is_empty)
    }

    pub fn replace_page(&mut self, page: Page<R>) {
        self.page = Loaded::Loaded(page);
    }

    pub fn find(&self, key: &RecordKey) -> Option<&R> {
        self.records().iter().find(|r| &r.key() == key)
    }

    /// Replaces the cached row with the same key. Returns false when it is not on this page.
    pub fn patch_record(&mut self, record: R) -> bool {
        let key = record.key();
        let Some(page) = self.page.page_mut() else {
            return false;
        };
        match page.records.iter_mut().find(|r| r.key() == key) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    pub fn remove_record(&mut self, key: &RecordKey) -> bool {
        let Some(page) = self.page.page_mut() else {
            return false;
        };
        let before = page.records.len();
        page.records.retain(|r| &r.key() != key);
        let removed = page.records.len() != before;
        if removed {
            page.count = page.count.saturating_sub(1);
        }
        removed
    }

    pub fn begin_edit(&mut self, record: &R) -> bool {
        self.field_errors.clear();
        self.editing.select(Draft::of(record))
    }

    pub fn cancel_edit(&mut self) -> bool {
        self.field_errors.clear();
        self.editing.cancel()
    }

    pub fn editing(&self) -> &ActionSlot<Draft<R>> {
        &self.editing
    }

    pub fn editing_mut(&mut self) -> &mut ActionSlot<Draft<R>> {
        &mut self.editing
    }

    pub fn draft_mut(&mut self) -> Option<&mut Draft<R>> {
        self.editing.target_mut()
    }

    pub fn begin_delete(&mut self, key: RecordKey) -> bool {
        self.pending_delete.select(key)
    }

    pub fn cancel_delete(&mut self) -> bool {
        self.pending_delete.cancel()
    }

    pub fn pending_delete(&self) -> &ActionSlot<RecordKey> {
        &self.pending_delete
    }

    pub fn pending_delete_mut(&mut self) -> &mut ActionSlot<RecordKey> {
        &mut self.pending_delete
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn field_errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.field_errors
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
        self.error = None;
        self.field_errors.clear();
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.message = None;
    }

    pub fn set_field_errors(&mut self, field_errors: BTreeMap<String, Vec<String>>) {
        self.field_errors = field_errors;
    }

    pub fn dismiss_message(&mut self) {
        self.message = None;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
        self.field_errors.clear();
    }
}

#[cfg(test)]
#[path = "tests/view_state_tests.rs"]
mod tests;
