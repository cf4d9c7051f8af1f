use std::sync::Arc;

use async_trait::async_trait;
use shared::{domain::BreachRecord, error::FetchError};

pub mod engine;
pub mod query;
pub mod source;

pub use engine::{BreachQueryEngine, QueryState, UNKNOWN_ERROR_MESSAGE};
pub use source::{
    HttpBreachSource, PagedSource, SourceConfigError, DEFAULT_ENDPOINT, DEFAULT_USER_AGENT,
};

/// How a data source hands out the breach collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One call returns the complete collection.
    Bulk,
    /// Each call returns at most `page_size` records; an empty page means exhausted.
    Paged { page_size: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub index: usize,
    pub size: usize,
}

#[async_trait]
pub trait BreachDataSource: Send + Sync {
    fn mode(&self) -> FetchMode;

    /// `page` is `Some` only for sources in [`FetchMode::Paged`].
    async fn fetch(&self, page: Option<PageRequest>) -> Result<Vec<BreachRecord>, FetchError>;
}

#[async_trait]
impl<S: BreachDataSource + ?Sized> BreachDataSource for Arc<S> {
    fn mode(&self) -> FetchMode {
        (**self).mode()
    }

    async fn fetch(&self, page: Option<PageRequest>) -> Result<Vec<BreachRecord>, FetchError> {
        (**self).fetch(page).await
    }
}
