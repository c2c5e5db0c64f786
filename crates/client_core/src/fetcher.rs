use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::protocol::ListResponse;
use tracing::{info, warn};

use crate::{
    collection::Collection,
    error::{FetchError, TransportError},
    filter::Filter,
    record::Record,
    transport::CollectionTransport,
};

/// One batch of records plus the collection's total count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub records: Vec<R>,
    pub count: u64,
}

impl<R> Page<R> {
    pub fn new(records: Vec<R>, count: u64) -> Self {
        Self { records, count }
    }

    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Result of one list request. `listing` holds every row the server sent
/// when the collection is sliced locally, so rows on other pages stay
/// addressable; it is empty for server-paginated collections.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<R> {
    pub page: Page<R>,
    pub listing: Vec<R>,
}

/// Keeps "nothing fetched yet" apart from "fetched, zero rows".
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Loaded<R> {
    #[default]
    NotLoaded,
    Loaded(Page<R>),
}

impl<R> Loaded<R> {
    pub fn page(&self) -> Option<&Page<R>> {
        match self {
            Loaded::NotLoaded => None,
            Loaded::Loaded(page) => Some(page),
        }
    }

    pub fn page_mut(&mut self) -> Option<&mut Page<R>> {
        match self {
            Loaded::NotLoaded => None,
            Loaded::Loaded(page) => Some(page),
        }
    }

    pub fn records(&self) -> &[R] {
        self.page()
            .map(|p| p.records.as_slice())
            .unwrap_or_default()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Loaded::Loaded(_))
    }
}

/// Sequence stamp of an issued fetch. Only the latest ticket may apply its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    page: u32,
}

impl FetchTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

pub struct ListFetcher<R> {
    transport: Arc<dyn CollectionTransport>,
    collection: Collection,
    latest: AtomicU64,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> ListFetcher<R> {
    pub fn new(collection: Collection, transport: Arc<dyn CollectionTransport>) -> Self {
        Self {
            transport,
            collection,
            latest: AtomicU64::new(0),
            _record: PhantomData,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Stamps a new request, superseding every ticket issued before it.
    pub fn issue(&self, page: u32) -> FetchTicket {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        FetchTicket { seq, page }
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.seq
    }

    /// Invalidates every outstanding ticket without issuing a new request.
    pub fn supersede_all(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn fetch(&self, filter: &Filter, page: u32) -> Result<Fetched<R>, FetchError> {
        let noun = self.collection.noun();
        let mut query = filter.query_pairs();
        if self.collection.is_paginated() {
            query.push(("page".to_string(), page.to_string()));
        }

        let raw = self
            .transport
            .get(self.collection.list_path(), &query)
            .await
            .map_err(|err| {
                warn!(collection = noun, page, error = %err, "list fetch failed");
                match err {
                    TransportError::Status { status: 404, .. }
                        if self.collection.is_paginated() && page > 1 =>
                    {
                        FetchError::PageOutOfRange { page }
                    }
                    other => FetchError::from_transport(noun, other),
                }
            })?;

        let response: ListResponse<R> = serde_json::from_value(raw).map_err(|e| {
            warn!(collection = noun, page, error = %e, "list response did not decode");
            FetchError::from_transport(noun, TransportError::Decode(e.to_string()))
        })?;

        let page_size = self.collection.page_size() as usize;
        let (mut records, count) = response.into_parts();
        let mut listing = Vec::new();
        if !self.collection.is_paginated() {
            let start = (page.max(1) as usize - 1) * page_size;
            listing = records;
            records = listing.iter().skip(start).take(page_size).cloned().collect();
        } else if records.len() > page_size {
            warn!(
                collection = noun,
                page,
                received = records.len(),
                page_size,
                "server page larger than the configured page size; truncating"
            );
            records.truncate(page_size);
        }

        info!(collection = noun, page, rows = records.len(), count, "fetched page");
        Ok(Fetched {
            page: Page::new(records, count),
            listing,
        })
    }
}
