//! Domain identifier types with validation
//!
//! Newtype wrappers for report and group identifiers. Identifiers are
//! lowercase snake_case so they double as file-name stems.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn validate_identifier(kind: &str, id: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err(format!("{kind} cannot be empty"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(format!(
            "{kind} must contain only lowercase letters, digits and underscores, got: {id}"
        ));
    }
    Ok(())
}

/// Report identifier newtype wrapper
///
/// # Examples
///
/// ```
/// use p21_export::domain::ids::ReportName;
/// use std::str::FromStr;
///
/// let name = ReportName::from_str("daily_sales").unwrap();
/// assert_eq!(name.as_str(), "daily_sales");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportName(String);

impl ReportName {
    /// Creates a new ReportName from a string
    ///
    /// Surrounding whitespace is trimmed; the remaining text must be a
    /// non-empty snake_case identifier.
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into().trim().to_string();
        validate_identifier("Report name", &name)?;
        Ok(Self(name))
    }

    /// Returns the report name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ReportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReportName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ReportName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReportName> for String {
    fn from(name: ReportName) -> Self {
        name.0
    }
}

impl AsRef<str> for ReportName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Report group identifier (e.g. `monthly`, `inventory`, `po`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl GroupName {
    /// Creates a new GroupName from a string
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into().trim().to_lowercase();
        validate_identifier("Report group", &name)?;
        Ok(Self(name))
    }

    /// Returns the group name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for GroupName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupName> for String {
    fn from(name: GroupName) -> Self {
        name.0
    }
}
