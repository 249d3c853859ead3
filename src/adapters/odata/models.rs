//! Wire models for the P21 OData service

use crate::domain::Record;
use serde::Deserialize;

/// One page of a view query
#[derive(Debug, Clone, Deserialize)]
pub struct ODataPage {
    /// Records in server order; a missing or null array is an empty page
    #[serde(default)]
    pub value: Option<Vec<Record>>,

    /// Server-driven continuation URL
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,

    /// Total matching records, present when `$count=true` was honoured
    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
}

impl ODataPage {
    /// Takes the page's records, leaving the page empty
    pub fn take_records(&mut self) -> Vec<Record> {
        self.value.take().unwrap_or_default()
    }
}

/// Response of `POST /api/security/token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token
    #[serde(rename = "AccessToken")]
    pub access_token: String,

    /// Lifetime in seconds, when the server reports one
    #[serde(rename = "ExpiresInSeconds", default)]
    pub expires_in_seconds: Option<u64>,
}
