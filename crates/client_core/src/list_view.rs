use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde_json::Value;
use shared::domain::RecordKey;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    collection::{Collection, Reconcile},
    dispatcher::{ActionDispatcher, Mutation},
    error::{ActionError, FetchError},
    fetcher::{FetchTicket, Fetched, ListFetcher},
    filter::Filter,
    pagination::PaginationController,
    record::Record,
    transport::{CollectionTransport, FilePart, MultipartForm, RequestBody},
    view_state::{Draft, ViewState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced the cached page.
    Applied,
    /// The requested page is outside `1..=total_pages`; nothing was fetched.
    Skipped,
    /// A newer request was issued while this one was in flight; its response was dropped.
    Stale,
    /// The view was detached before the response arrived.
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    PageLoaded {
        page: u32,
        total_pages: u32,
        count: u64,
    },
    FetchFailed {
        message: String,
    },
    ActionSucceeded {
        key: Option<RecordKey>,
        message: String,
    },
    ActionFailed {
        key: Option<RecordKey>,
        message: String,
    },
    AuthRequired {
        message: String,
    },
}

/// Read-only copy of a view, taken once per render.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot<R> {
    pub pagination: PaginationController,
    pub filter: Filter,
    pub state: ViewState<R>,
}

impl<R: Record> ViewSnapshot<R> {
    pub fn records(&self) -> &[R] {
        self.state.records()
    }
}

struct ViewInner<R> {
    pagination: PaginationController,
    filter: Filter,
    cache: ViewState<R>,
    /// Every row of the last locally sliced listing.
    listing: Vec<R>,
}

impl<R: Record> ViewInner<R> {
    fn lookup(&self, key: &RecordKey) -> Option<&R> {
        self.cache
            .find(key)
            .or_else(|| self.listing.iter().find(|r| &r.key() == key))
    }

    fn patch(&mut self, record: R) {
        let key = record.key();
        if let Some(slot) = self.listing.iter_mut().find(|r| r.key() == key) {
            *slot = record.clone();
        }
        self.cache.patch_record(record);
    }

    /// Drops a row that left the collection and shrinks the page range to match.
    fn forget(&mut self, key: &RecordKey) {
        self.listing.retain(|r| &r.key() != key);
        if self.cache.remove_record(key) {
            if let Some(page) = self.cache.page().page() {
                self.pagination.set_total_count(page.count);
            }
        }
    }

    fn apply(&mut self, page: u32, filter: Filter, fetched: Fetched<R>) {
        self.pagination.settle(page, fetched.page.count);
        self.filter = filter;
        self.cache.replace_page(fetched.page);
        self.listing = fetched.listing;
        self.cache.dismiss_error();
    }
}

/// Paginated list-and-detail screen over one remote collection.
pub struct ListView<R: Record> {
    fetcher: ListFetcher<R>,
    dispatcher: ActionDispatcher<R>,
    inner: Mutex<ViewInner<R>>,
    detached: AtomicBool,
    events: broadcast::Sender<ViewEvent>,
}

impl<R: Record> ListView<R> {
    pub fn new(collection: Collection, transport: Arc<dyn CollectionTransport>) -> Arc<Self> {
        Self::with_filter(collection, transport, Filter::new())
    }

    pub fn with_filter(
        collection: Collection,
        transport: Arc<dyn CollectionTransport>,
        filter: Filter,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let pagination = PaginationController::new(collection.page_size());
        Arc::new(Self {
            fetcher: ListFetcher::new(collection.clone(), transport.clone()),
            dispatcher: ActionDispatcher::new(collection, transport),
            inner: Mutex::new(ViewInner {
                pagination,
                filter,
                cache: ViewState::default(),
                listing: Vec::new(),
            }),
            detached: AtomicBool::new(false),
            events,
        })
    }

    pub fn collection(&self) -> &Collection {
        self.fetcher.collection()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ViewSnapshot<R> {
        let inner = self.inner.lock().await;
        ViewSnapshot {
            pagination: inner.pagination,
            filter: inner.filter.clone(),
            state: inner.cache.clone(),
        }
    }

    /// Component unmount: every continuation still in flight is discarded.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
        self.fetcher.supersede_all();
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ViewEvent) {
        let _ = self.events.send(event);
    }

    /// Fetches page 1 under `filter`. The view switches to the new filter
    /// only once that page has loaded.
    pub async fn on_filter_change(&self, filter: Filter) -> Result<FetchOutcome, FetchError> {
        self.run_fetch(self.fetcher.issue(1), filter).await
    }

    pub async fn update_filter(
        &self,
        change: impl FnOnce(&mut Filter),
    ) -> Result<FetchOutcome, FetchError> {
        let mut filter = self.inner.lock().await.filter.clone();
        change(&mut filter);
        self.on_filter_change(filter).await
    }

    /// Fetches `page` and moves there once it loads. Out-of-range pages are a no-op.
    pub async fn on_page_change(&self, page: u32) -> Result<FetchOutcome, FetchError> {
        let (ticket, filter) = {
            let inner = self.inner.lock().await;
            if !inner.pagination.contains(page) {
                debug!(
                    collection = self.collection().noun(),
                    page,
                    total_pages = inner.pagination.total_pages(),
                    "page change ignored"
                );
                return Ok(FetchOutcome::Skipped);
            }
            (self.fetcher.issue(page), inner.filter.clone())
        };
        self.run_fetch(ticket, filter).await
    }

    pub async fn next_page(&self) -> Result<FetchOutcome, FetchError> {
        let page = self.inner.lock().await.pagination.current_page() + 1;
        self.on_page_change(page).await
    }

    pub async fn previous_page(&self) -> Result<FetchOutcome, FetchError> {
        let page = self.inner.lock().await.pagination.current_page();
        self.on_page_change(page.saturating_sub(1)).await
    }

    /// Re-fetches the current page; used after mutations and as the manual retry.
    pub async fn on_action_complete(&self) -> Result<FetchOutcome, FetchError> {
        let (ticket, filter) = self.current_ticket().await;
        let outcome = match self.fetch_page(ticket, filter.clone(), true).await {
            Err(FetchError::PageOutOfRange { page }) if page > 1 => {
                debug!(
                    collection = self.collection().noun(),
                    page, "page vanished on the server; stepping back"
                );
                return self.run_fetch(self.fetcher.issue(page - 1), filter).await;
            }
            other => other?,
        };

        // A shrinking result can leave the current page past the end. Load the
        // last real page once instead of showing an empty one.
        let clamped_to = {
            let inner = self.inner.lock().await;
            let page = inner.pagination.current_page();
            (outcome == FetchOutcome::Applied
                && page != ticket.page()
                && inner.cache.is_empty_result())
            .then_some(page)
        };
        match clamped_to {
            Some(page) => {
                let filter = self.inner.lock().await.filter.clone();
                self.run_fetch(self.fetcher.issue(page), filter).await
            }
            None => Ok(outcome),
        }
    }

    pub async fn refresh(&self) -> Result<FetchOutcome, FetchError> {
        self.on_action_complete().await
    }

    async fn current_ticket(&self) -> (FetchTicket, Filter) {
        let inner = self.inner.lock().await;
        (
            self.fetcher.issue(inner.pagination.current_page()),
            inner.filter.clone(),
        )
    }

    async fn run_fetch(
        &self,
        ticket: FetchTicket,
        filter: Filter,
    ) -> Result<FetchOutcome, FetchError> {
        self.fetch_page(ticket, filter, false).await
    }

    /// Page and filter are committed only when the response applies; a failed
    /// fetch leaves the view on the last page that loaded. With `recovering`,
    /// a vanished page is returned to the caller without an inline error.
    async fn fetch_page(
        &self,
        ticket: FetchTicket,
        filter: Filter,
        recovering: bool,
    ) -> Result<FetchOutcome, FetchError> {
        let result = self.fetcher.fetch(&filter, ticket.page()).await;
        let noun = self.collection().noun();

        if self.is_detached() {
            debug!(collection = noun, seq = ticket.seq(), "view detached; response discarded");
            return Ok(FetchOutcome::Discarded);
        }

        let mut inner = self.inner.lock().await;
        if !self.fetcher.is_current(ticket) {
            debug!(
                collection = noun,
                seq = ticket.seq(),
                page = ticket.page(),
                "stale response dropped"
            );
            return Ok(FetchOutcome::Stale);
        }

        match result {
            Ok(fetched) => {
                let count = fetched.page.count;
                inner.apply(ticket.page(), filter, fetched);
                let total_pages = inner.pagination.total_pages();
                drop(inner);
                self.emit(ViewEvent::PageLoaded {
                    page: ticket.page(),
                    total_pages,
                    count,
                });
                Ok(FetchOutcome::Applied)
            }
            Err(FetchError::Auth(err)) => {
                drop(inner);
                warn!(collection = noun, "session rejected while fetching");
                self.emit(ViewEvent::AuthRequired {
                    message: err.message.clone(),
                });
                Err(FetchError::Auth(err))
            }
            Err(err @ FetchError::PageOutOfRange { .. }) if recovering => Err(err),
            Err(err) => {
                let message = err.message();
                inner.cache.set_error(message.clone());
                drop(inner);
                self.emit(ViewEvent::FetchFailed { message });
                Err(err)
            }
        }
    }

    pub async fn begin_edit(&self, key: &RecordKey) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.lookup(key).cloned() else {
            return false;
        };
        inner.cache.begin_edit(&record)
    }

    pub async fn edit_draft(&self, change: impl FnOnce(&mut R)) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.cache.draft_mut() {
            Some(draft) => {
                change(&mut draft.record);
                true
            }
            None => false,
        }
    }

    pub async fn attach_file(&self, part: FilePart) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.cache.draft_mut() {
            Some(draft) => {
                draft.attach(part);
                true
            }
            None => false,
        }
    }

    pub async fn cancel_edit(&self) -> bool {
        self.inner.lock().await.cache.cancel_edit()
    }

    pub async fn submit_edit(&self) -> Result<R, ActionError> {
        let draft: Draft<R> = {
            let mut inner = self.inner.lock().await;
            if inner.cache.editing().is_submitting() {
                return Err(ActionError::busy(inner.cache.editing().target().map(|d| &d.key)));
            }
            inner
                .cache
                .editing_mut()
                .begin_submit()
                .cloned()
                .ok_or(ActionError::NothingSelected)?
        };

        let body = draft_body(&draft, self.collection().edit_fields())?;
        let cached = self.cached(&draft.key).await;
        let result = self
            .dispatcher
            .update(&draft.key, body, cached.as_ref())
            .await;

        let message = format!("{} updated successfully", capitalize(self.collection().noun()));
        let outcome = self
            .finish_action(Some(draft.key.clone()), result, message, |inner, result| {
                match result {
                    Ok(_) => inner.cache.editing_mut().finish_ok(),
                    Err(err) => inner.cache.editing_mut().finish_err(err.to_string()),
                }
            })
            .await?;
        outcome.ok_or(ActionError::UnexpectedResponse(
            "server did not return the updated record".to_string(),
        ))
    }

    /// Opens a draft for `key`, applies `change`, attaches `files` and submits it.
    pub async fn edit(
        &self,
        key: &RecordKey,
        change: impl FnOnce(&mut R),
        files: Vec<FilePart>,
    ) -> Result<R, ActionError> {
        if !self.begin_edit(key).await {
            return Err(ActionError::NotAllowed(format!(
                "{} {key} is not loaded or is being saved",
                self.collection().noun()
            )));
        }
        self.edit_draft(change).await;
        for file in files {
            self.attach_file(file).await;
        }
        self.submit_edit().await
    }

    pub async fn begin_delete(&self, key: RecordKey) -> bool {
        self.inner.lock().await.cache.begin_delete(key)
    }

    pub async fn cancel_delete(&self) -> bool {
        self.inner.lock().await.cache.cancel_delete()
    }

    /// Soft-deletes the record awaiting confirmation.
    pub async fn confirm_delete(&self) -> Result<Option<R>, ActionError> {
        let key = {
            let mut inner = self.inner.lock().await;
            if inner.cache.pending_delete().is_submitting() {
                return Err(ActionError::busy(inner.cache.pending_delete().target()));
            }
            inner
                .cache
                .pending_delete_mut()
                .begin_submit()
                .cloned()
                .ok_or(ActionError::NothingSelected)?
        };

        let cached = self.cached(&key).await;
        let result = self
            .dispatcher
            .set_flag(&key, "is_deleted", Value::from(1), cached.as_ref())
            .await;

        let message = format!("{} deleted successfully", capitalize(self.collection().noun()));
        let deleted = key.clone();
        self.finish_action(Some(key), result, message, move |inner, result| match result {
            Ok(_) => {
                inner.cache.pending_delete_mut().finish_ok();
                // Hidden right away; the re-fetch that follows loads what now fills the page.
                inner.forget(&deleted);
            }
            Err(err) => inner.cache.pending_delete_mut().finish_err(err.to_string()),
        })
        .await
    }

    pub async fn set_flag(
        &self,
        key: &RecordKey,
        flag: &str,
        value: Value,
    ) -> Result<Option<R>, ActionError> {
        let message = format!("{} updated successfully", capitalize(self.collection().noun()));
        self.set_flag_with_message(key, flag, value, message).await
    }

    pub async fn set_flag_with_message(
        &self,
        key: &RecordKey,
        flag: &str,
        value: Value,
        message: String,
    ) -> Result<Option<R>, ActionError> {
        let cached = self.cached(key).await;
        let result = self
            .dispatcher
            .set_flag(key, flag, value, cached.as_ref())
            .await;
        self.finish_action(Some(key.clone()), result, message, |_, _| {})
            .await
    }

    pub async fn create(&self, body: RequestBody) -> Result<Option<R>, ActionError> {
        let result = self.dispatcher.create(body).await;
        let message = format!("{} created successfully", capitalize(self.collection().noun()));
        self.finish_action(None, result, message, |_, _| {}).await
    }

    /// The row from the current page, or from the full listing of a locally
    /// sliced collection.
    pub async fn cached(&self, key: &RecordKey) -> Option<R> {
        self.inner.lock().await.lookup(key).cloned()
    }

    pub async fn dismiss_message(&self) {
        self.inner.lock().await.cache.dismiss_message();
    }

    pub async fn dismiss_error(&self) {
        self.inner.lock().await.cache.dismiss_error();
    }

    /// Applies a finished mutation to the cached state, then reconciles.
    /// A failure never touches the cached page.
    async fn finish_action(
        &self,
        key: Option<RecordKey>,
        result: Result<Mutation<R>, ActionError>,
        message: String,
        settle: impl FnOnce(&mut ViewInner<R>, &Result<Mutation<R>, ActionError>),
    ) -> Result<Option<R>, ActionError> {
        let noun = self.collection().noun().to_string();
        if self.is_detached() {
            debug!(collection = %noun, key = ?key, "view detached; action result discarded");
            return result.map(|m| m.record);
        }

        let reconcile = {
            let mut inner = self.inner.lock().await;
            settle(&mut *inner, &result);
            match &result {
                Ok(mutation) => {
                    if mutation.reconcile == Reconcile::PatchInPlace {
                        if let Some(record) = &mutation.record {
                            inner.patch(record.clone());
                        }
                    }
                    inner.cache.set_message(message.clone());
                    Some(mutation.reconcile)
                }
                Err(ActionError::Auth(_)) => None,
                Err(err) => {
                    inner.cache.set_error(err.to_string());
                    if let Some(fields) = err.field_errors() {
                        inner.cache.set_field_errors(fields.clone());
                    }
                    None
                }
            }
        };

        match &result {
            Ok(_) => self.emit(ViewEvent::ActionSucceeded {
                key: key.clone(),
                message,
            }),
            Err(ActionError::Auth(err)) => self.emit(ViewEvent::AuthRequired {
                message: err.message.clone(),
            }),
            Err(err) => self.emit(ViewEvent::ActionFailed {
                key: key.clone(),
                message: err.to_string(),
            }),
        }

        if reconcile == Some(Reconcile::Refetch) {
            if let Err(err) = self.on_action_complete().await {
                warn!(collection = %noun, key = ?key, error = %err, "re-fetch after action failed");
            }
        }
        if result.is_ok() {
            info!(collection = %noun, key = ?key, "action completed");
        }
        result.map(|m| m.record)
    }
}

fn draft_body<R: Record>(draft: &Draft<R>, editable: &[String]) -> Result<RequestBody, ActionError> {
    let mut fields = serde_json::to_value(&draft.record)
        .map_err(|e| ActionError::UnexpectedResponse(format!("draft did not serialize: {e}")))?;
    if let (Value::Object(map), false) = (&mut fields, editable.is_empty()) {
        map.retain(|name, _| editable.contains(name));
    }
    if draft.attachments.is_empty() {
        Ok(RequestBody::Json(fields))
    } else {
        Ok(RequestBody::Multipart(MultipartForm::from_fields(
            &fields,
            draft.attachments.clone(),
        )))
    }
}

fn capitalize(noun: &str) -> String {
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
#[path = "tests/list_view_tests.rs"]
mod tests;
