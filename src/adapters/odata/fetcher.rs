//! Record fetcher trait
//!
//! The engine only depends on [`RecordFetcher`]; [`super::ODataClient`] is the
//! HTTP implementation and tests substitute in-memory fakes.

use super::query::FetchRequest;
use crate::domain::{FetchError, Record};
use async_trait::async_trait;
use std::sync::Arc;

/// Complete record set of one logical query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRecords {
    /// Records in server order across all pages
    pub records: Vec<Record>,

    /// Pages received
    pub pages: u32,

    /// Data requests issued, retries included
    pub attempts: u32,
}

impl FetchedRecords {
    /// Wraps records obtained in a single request
    pub fn single_page(records: Vec<Record>) -> Self {
        Self {
            records,
            pages: 1,
            attempts: 1,
        }
    }
}

/// Source of complete, paged-through record sets
///
/// Zero records is a successful result.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Fetches every record matching `request`
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Auth`], [`FetchError::Transient`] after retries
    /// are exhausted, or [`FetchError::Query`] for non-retryable rejections.
    async fn fetch_all(&self, request: &FetchRequest) -> Result<FetchedRecords, FetchError>;
}

#[async_trait]
impl<T: RecordFetcher + ?Sized> RecordFetcher for Arc<T> {
    async fn fetch_all(&self, request: &FetchRequest) -> Result<FetchedRecords, FetchError> {
        (**self).fetch_all(request).await
    }
}
