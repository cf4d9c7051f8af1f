use std::{collections::HashSet, sync::Arc};

use shared::{
    domain::{BreachRecord, FilterMode},
    error::FetchError,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{query, BreachDataSource, FetchMode, PageRequest};

pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Everything the presentation layer can observe about the breach list.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    all_records: Vec<Arc<BreachRecord>>,
    visible_records: Vec<Arc<BreachRecord>>,
    is_loading: bool,
    error: Option<String>,
    search_query: String,
    filter_mode: FilterMode,
    page_size: Option<usize>,
    next_page: usize,
    is_exhausted: bool,
}

impl QueryState {
    fn new(mode: FetchMode) -> Self {
        let page_size = match mode {
            FetchMode::Bulk => None,
            FetchMode::Paged { page_size } => Some(page_size),
        };
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn visible_records(&self) -> &[Arc<BreachRecord>] {
        &self.visible_records
    }

    pub fn all_records(&self) -> &[Arc<BreachRecord>] {
        &self.all_records
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    pub fn is_paged(&self) -> bool {
        self.page_size.is_some()
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn next_page(&self) -> usize {
        self.next_page
    }

    pub fn is_exhausted(&self) -> bool {
        self.is_exhausted
    }

    pub fn find(&self, name: &str) -> Option<&Arc<BreachRecord>> {
        self.all_records
            .iter()
            .find(|record| record.name.eq_ignore_ascii_case(name))
    }

    fn can_start_fetch(&self) -> bool {
        !self.is_loading && !(self.is_paged() && self.is_exhausted)
    }

    fn page_request(&self) -> Option<PageRequest> {
        self.page_size.map(|size| PageRequest {
            index: self.next_page,
            size,
        })
    }

    fn recompute_visible(&mut self) {
        self.visible_records =
            query::visible_records(&self.all_records, &self.search_query, self.filter_mode);
    }

    fn replace_all(&mut self, records: Vec<BreachRecord>) {
        self.all_records = records.into_iter().map(Arc::new).collect();
        self.recompute_visible();
    }

    fn append_page(&mut self, page: PageRequest, records: Vec<BreachRecord>) {
        if records.is_empty() {
            self.is_exhausted = true;
            return;
        }

        let short_page = records.len() < page.size;
        let mut known: HashSet<String> = self
            .all_records
            .iter()
            .map(|record| record.name.clone())
            .collect();
        for record in records {
            if known.insert(record.name.clone()) {
                self.all_records.push(Arc::new(record));
            } else {
                debug!(name = %record.name, "dropping duplicate breach from page");
            }
        }
        self.next_page += 1;
        if short_page {
            self.is_exhausted = true;
        }
        self.recompute_visible();
    }
}

fn display_message(err: &FetchError) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

/// Owns the breach list state and the single in-flight fetch.
///
/// State is published through a watch channel; every mutation is a single
/// `send_modify`/`send_if_modified` call so observers only ever see complete
/// transitions.
pub struct BreachQueryEngine {
    source: Arc<dyn BreachDataSource>,
    state: watch::Sender<QueryState>,
}

impl BreachQueryEngine {
    pub fn new(source: Arc<dyn BreachDataSource>) -> Arc<Self> {
        let mode = source.mode();
        let (state, _) = watch::channel(QueryState::new(mode));
        Arc::new(Self { source, state })
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> QueryState {
        self.state.borrow().clone()
    }

    /// Starts a fetch unless one is already running or paging is exhausted.
    ///
    /// Returns the handle of the spawned fetch, or `None` when the call was a
    /// no-op. Must be called from within a tokio runtime.
    pub fn load(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut page = None;
        let started = self.state.send_if_modified(|state| {
            if !state.can_start_fetch() {
                return false;
            }
            state.is_loading = true;
            state.error = None;
            page = state.page_request();
            true
        });

        if !started {
            debug!("load skipped; fetch in flight or pages exhausted");
            return None;
        }

        let engine = Arc::clone(self);
        Some(tokio::spawn(async move { engine.run_fetch(page).await }))
    }

    pub fn retry(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.state.send_if_modified(|state| state.error.take().is_some());
        self.load()
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.state.send_modify(|state| {
            state.search_query = query;
            state.recompute_visible();
        });
    }

    pub fn set_filter_mode(&self, mode: FilterMode) {
        self.state.send_modify(|state| {
            state.filter_mode = mode;
            state.recompute_visible();
        });
    }

    /// Drops all fetched records and rewinds paging. Search and filter are kept.
    ///
    /// Refused (returns `false`) while a fetch is in flight.
    pub fn reset(&self) -> bool {
        let cleared = self.state.send_if_modified(|state| {
            if state.is_loading {
                return false;
            }
            state.all_records.clear();
            state.visible_records.clear();
            state.error = None;
            state.next_page = 0;
            state.is_exhausted = false;
            true
        });
        if cleared {
            info!("breach list reset");
        }
        cleared
    }

    async fn run_fetch(&self, page: Option<PageRequest>) {
        let source = Arc::clone(&self.source);
        let outcome = match tokio::spawn(async move { source.fetch(page).await }).await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(FetchError::transport(format!(
                "breach fetch task failed: {join_err}"
            ))),
        };

        match &outcome {
            Ok(records) => info!(
                page = page.map(|p| p.index),
                count = records.len(),
                "breach fetch completed"
            ),
            Err(err) => warn!(
                page = page.map(|p| p.index),
                kind = ?err.kind(),
                error = %err,
                "breach fetch failed"
            ),
        }

        self.state.send_modify(|state| {
            match outcome {
                Ok(records) => match page {
                    Some(page) => state.append_page(page, records),
                    None => state.replace_all(records),
                },
                Err(err) => state.error = Some(display_message(&err)),
            }
            state.is_loading = false;
        });
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
