use shared::domain::RecordKey;

use crate::{pagination::DEFAULT_PAGE_SIZE, transport::Method};

/// How a view brings its cached page back in line after a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Replace the matching row with the server's (or merged) record.
    PatchInPlace,
    /// Fetch the current page again.
    Refetch,
}

/// Descriptor of one remote collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    noun: String,
    list_path: String,
    item_path: String,
    paginated: bool,
    page_size: u32,
    after_update: Reconcile,
    membership_flags: Vec<String>,
    partial_flags: Vec<String>,
    flag_context_fields: Vec<String>,
    edit_fields: Vec<String>,
}

impl Collection {
    pub fn new(noun: impl Into<String>, list_path: impl Into<String>) -> Self {
        let list_path = with_trailing_slash(list_path.into());
        Self {
            noun: noun.into(),
            item_path: list_path.clone(),
            list_path,
            paginated: false,
            page_size: DEFAULT_PAGE_SIZE,
            after_update: Reconcile::Refetch,
            membership_flags: vec!["is_deleted".to_string()],
            partial_flags: vec!["status".to_string()],
            flag_context_fields: Vec::new(),
            edit_fields: Vec::new(),
        }
    }

    pub fn paginated(mut self, paginated: bool) -> Self {
        self.paginated = paginated;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Mutations go to `{item_path}{key}/` instead of `{list_path}{key}/`.
    pub fn with_item_path(mut self, item_path: impl Into<String>) -> Self {
        self.item_path = with_trailing_slash(item_path.into());
        self
    }

    pub fn with_after_update(mut self, reconcile: Reconcile) -> Self {
        self.after_update = reconcile;
        self
    }

    /// Fields copied from the cached row into every flag payload, for
    /// endpoints whose PUT replaces the whole record.
    pub fn with_flag_context_fields(mut self, fields: &[&str]) -> Self {
        self.flag_context_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Restricts an edit submission to these fields. Empty sends the whole record.
    pub fn with_edit_fields(mut self, fields: &[&str]) -> Self {
        self.edit_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn leaves() -> Self {
        Self::new("leave", "leave/")
            .paginated(true)
            .with_item_path("update-leave-status/")
    }

    pub fn all_leaves() -> Self {
        Self::new("leave", "all-leaves/").with_item_path("update-leave-status/")
    }

    pub fn employees() -> Self {
        Self::new("employee", "employees/")
            .with_after_update(Reconcile::PatchInPlace)
            .with_edit_fields(&[
                "username",
                "first_name",
                "last_name",
                "email",
                "gender",
                "relationship_status",
                "department",
                "date_of_joining",
                "phone_number",
                "address",
            ])
    }

    pub fn attendance_report() -> Self {
        Self::new("attendance report", "attendanceReport/").paginated(true)
    }

    pub fn holidays() -> Self {
        Self::new("holiday", "holidays/")
            .with_page_size(1)
            .with_flag_context_fields(&["date", "name"])
            .with_edit_fields(&["name", "date"])
    }

    pub fn birthdays() -> Self {
        Self::new("birthday", "birthdays/")
    }

    pub fn noun(&self) -> &str {
        &self.noun
    }

    pub fn list_path(&self) -> &str {
        &self.list_path
    }

    pub fn item_path(&self, key: &RecordKey) -> String {
        format!("{}{key}/", self.item_path)
    }

    pub fn is_paginated(&self) -> bool {
        self.paginated
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn after_create(&self) -> Reconcile {
        Reconcile::Refetch
    }

    pub fn after_update(&self) -> Reconcile {
        self.after_update
    }

    /// Flags that can move a record out of the active list force a re-fetch.
    pub fn after_flag(&self, flag: &str) -> Reconcile {
        if self.membership_flags.iter().any(|f| f == flag) {
            Reconcile::Refetch
        } else {
            Reconcile::PatchInPlace
        }
    }

    pub fn flag_method(&self, flag: &str) -> Method {
        if self.partial_flags.iter().any(|f| f == flag) {
            Method::Patch
        } else {
            Method::Put
        }
    }

    pub fn flag_context_fields(&self) -> &[String] {
        &self.flag_context_fields
    }

    pub fn edit_fields(&self) -> &[String] {
        &self.edit_fields
    }
}

fn with_trailing_slash(mut path: String) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.len() != path.len() {
        path = trimmed.to_string();
    }
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}
