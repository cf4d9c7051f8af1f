use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::BreachRecord,
    error::{FetchError, FetchErrorKind},
    protocol::decode_breach_list,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::{BreachDataSource, FetchMode, PageRequest};

pub const DEFAULT_ENDPOINT: &str = "https://haveibeenpwned.com/api/v3/breaches";
pub const DEFAULT_USER_AGENT: &str = concat!("breach-browser/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum SourceConfigError {
    #[error("invalid breach endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },
    #[error("unsupported scheme '{scheme}' in breach endpoint; expected http or https")]
    UnsupportedScheme { scheme: String },
    #[error("page size must be greater than zero")]
    ZeroPageSize,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

fn fetch_failure(kind: FetchErrorKind, cause: impl Display) -> FetchError {
    FetchError::new(kind, format!("Failed to fetch breaches: {cause}"))
}

/// Bulk source reading the whole breach list with a single GET.
pub struct HttpBreachSource {
    http: Client,
    endpoint: Url,
}

impl HttpBreachSource {
    pub fn new(endpoint: &str) -> Result<Self, SourceConfigError> {
        Self::with_user_agent(endpoint, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(endpoint: &str, user_agent: &str) -> Result<Self, SourceConfigError> {
        let endpoint = parse_endpoint(endpoint)?;
        let http = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

pub fn parse_endpoint(raw: &str) -> Result<Url, SourceConfigError> {
    let endpoint = Url::parse(raw.trim()).map_err(|source| SourceConfigError::InvalidEndpoint {
        endpoint: raw.to_string(),
        source,
    })?;
    match endpoint.scheme() {
        "http" | "https" => Ok(endpoint),
        other => Err(SourceConfigError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

#[async_trait]
impl BreachDataSource for HttpBreachSource {
    fn mode(&self) -> FetchMode {
        FetchMode::Bulk
    }

    async fn fetch(&self, _page: Option<PageRequest>) -> Result<Vec<BreachRecord>, FetchError> {
        debug!(endpoint = %self.endpoint, "requesting breach list");
        let response = self
            .http
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| fetch_failure(FetchErrorKind::Transport, e))?;

        let status = response.status();
        let response = response.error_for_status().map_err(|e| {
            warn!(endpoint = %self.endpoint, %status, "breach service rejected request");
            fetch_failure(FetchErrorKind::Status, e)
        })?;

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_failure(FetchErrorKind::Transport, e))?;
        let records =
            decode_breach_list(&body).map_err(|e| fetch_failure(e.kind(), e.message()))?;

        info!(
            endpoint = %self.endpoint,
            bytes = body.len(),
            count = records.len(),
            "fetched breach list"
        );
        Ok(records)
    }
}

/// Serves a bulk source page by page.
///
/// The first successful inner fetch is kept for the lifetime of the adapter and
/// later pages are sliced from it. Failed inner fetches are not remembered.
pub struct PagedSource<S> {
    inner: S,
    page_size: usize,
    collection: Mutex<Option<Arc<Vec<BreachRecord>>>>,
}

impl<S: BreachDataSource> PagedSource<S> {
    pub fn new(inner: S, page_size: usize) -> Result<Self, SourceConfigError> {
        if page_size == 0 {
            return Err(SourceConfigError::ZeroPageSize);
        }
        Ok(Self {
            inner,
            page_size,
            collection: Mutex::new(None),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    async fn collection(&self) -> Result<Arc<Vec<BreachRecord>>, FetchError> {
        let mut guard = self.collection.lock().await;
        if let Some(collection) = guard.as_ref() {
            return Ok(Arc::clone(collection));
        }
        let collection = Arc::new(self.inner.fetch(None).await?);
        debug!(count = collection.len(), "cached collection for paging");
        *guard = Some(Arc::clone(&collection));
        Ok(collection)
    }
}

#[async_trait]
impl<S: BreachDataSource> BreachDataSource for PagedSource<S> {
    fn mode(&self) -> FetchMode {
        FetchMode::Paged {
            page_size: self.page_size,
        }
    }

    async fn fetch(&self, page: Option<PageRequest>) -> Result<Vec<BreachRecord>, FetchError> {
        let page = page.unwrap_or(PageRequest {
            index: 0,
            size: self.page_size,
        });
        let collection = self.collection().await?;
        let start = page.index.saturating_mul(page.size);
        Ok(collection
            .iter()
            .skip(start)
            .take(page.size)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
