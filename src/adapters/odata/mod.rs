//! P21 OData service adapter
//!
//! - [`query`] - request composition and `$filter` helpers
//! - [`client`] - authenticated, paging, retrying HTTP client
//! - [`auth`] - shared bearer-token cache
//! - [`fetcher`] - the [`RecordFetcher`] seam used by the engine

pub mod auth;
pub mod client;
pub mod fetcher;
pub mod models;
pub mod query;

pub use client::{ODataClient, MAX_FILTER_VALUES, MAX_PAGES};
pub use fetcher::{FetchedRecords, RecordFetcher};
pub use query::{before_filter, date_range_filter, quote, AnyOf, FetchRequest};
