//! Capability interface for the hosted search index.
//!
//! The rename engine only ever talks to an [`IndexService`]: an empty-query
//! paged search and a batched partial update. [`AlgoliaIndex`] implements it
//! over HTTPS; [`InMemoryIndex`] keeps records in memory for tests and dry
//! experiments.

use std::sync::Arc;

use async_trait::async_trait;
use core_types::{PartialRecord, SearchOptions, SearchPage};
use thiserror::Error;

pub mod algolia;
pub mod memory;

pub use algolia::AlgoliaIndex;
pub use memory::{InMemoryIndex, IndexCall};

/// Errors surfaced by an index implementation.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("index returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed index response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid index client configuration: {0}")]
    Config(String),
    /// A chunked write failed after earlier chunks were applied.
    #[error("partial update stopped after {applied} of {total} records: {source}")]
    Incomplete {
        applied: usize,
        total: usize,
        #[source]
        source: Box<IndexError>,
    },
}

#[async_trait]
pub trait IndexService: Send + Sync {
    /// Run `query` and return the requested page, or `None` when the page is
    /// out of range.
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Option<SearchPage>, IndexError>;

    /// Merge each record's fields into the stored record with the same
    /// `objectID`, leaving other stored fields untouched.
    async fn partial_update_objects(&self, records: Vec<PartialRecord>) -> Result<(), IndexError>;
}

#[async_trait]
impl<T: IndexService + ?Sized> IndexService for Arc<T> {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Option<SearchPage>, IndexError> {
        (**self).search(query, options).await
    }

    async fn partial_update_objects(&self, records: Vec<PartialRecord>) -> Result<(), IndexError> {
        (**self).partial_update_objects(records).await
    }
}

#[async_trait]
impl<T: IndexService + ?Sized> IndexService for Box<T> {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Option<SearchPage>, IndexError> {
        (**self).search(query, options).await
    }

    async fn partial_update_objects(&self, records: Vec<PartialRecord>) -> Result<(), IndexError> {
        (**self).partial_update_objects(records).await
    }
}
