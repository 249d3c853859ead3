//! External system integrations
//!
//! - [`odata`] - Prophet 21 OData client with token auth, retry and paging
//! - [`sink`] - Result sinks that persist report tables and failures

pub mod odata;
pub mod sink;
