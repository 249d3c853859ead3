//! Report descriptor domain model
//!
//! A [`ReportDescriptor`] is a request to produce one named report over a date or
//! filter range. It is immutable once handed to the scheduler.

use super::ids::ReportName;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A request to produce one named report
///
/// # Examples
///
/// ```
/// use p21_export::domain::report::ReportDescriptor;
/// use p21_export::domain::ids::ReportName;
/// use chrono::NaiveDate;
///
/// let descriptor = ReportDescriptor::builder()
///     .name(ReportName::new("daily_sales").unwrap())
///     .start_date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
///     .build()
///     .unwrap();
///
/// // End date defaults to the end of the start month
/// assert_eq!(
///     descriptor.effective_end_date(),
///     NaiveDate::from_ymd_opt(2024, 2, 29)
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDescriptor {
    /// Registered report identifier
    pub name: ReportName,

    /// Overrides the primary OData view the report queries
    pub view: Option<String>,

    /// First day covered by the report
    pub start_date: Option<NaiveDate>,

    /// Last day covered by the report
    pub end_date: Option<NaiveDate>,

    /// Extra `$filter` expressions, already in wire syntax
    pub filters: Vec<String>,
}

impl ReportDescriptor {
    /// Creates a descriptor with no date range or extra filters
    pub fn new(name: ReportName) -> Self {
        Self {
            name,
            view: None,
            start_date: None,
            end_date: None,
            filters: Vec::new(),
        }
    }

    /// Creates a new builder for constructing a ReportDescriptor
    pub fn builder() -> ReportDescriptorBuilder {
        ReportDescriptorBuilder::default()
    }

    /// End of the reporting window
    ///
    /// Falls back to the last day of the start month when no explicit end date
    /// was given. `None` when the descriptor carries no start date either.
    pub fn effective_end_date(&self) -> Option<NaiveDate> {
        match (self.start_date, self.end_date) {
            (_, Some(end)) => Some(end),
            (Some(start), None) => Some(end_of_month(start)),
            (None, None) => None,
        }
    }

    /// Start and effective end of the reporting window, if any
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.start_date?;
        Some((start, self.effective_end_date().unwrap_or(start)))
    }
}

/// Builder for constructing ReportDescriptor instances
#[derive(Debug, Default)]
pub struct ReportDescriptorBuilder {
    name: Option<ReportName>,
    view: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    filters: Vec<String>,
}

impl ReportDescriptorBuilder {
    /// Creates a new ReportDescriptorBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the report name
    pub fn name(mut self, name: ReportName) -> Self {
        self.name = Some(name);
        self
    }

    /// Overrides the primary view
    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Sets the start date
    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Sets the end date
    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Sets both ends of the date range
    pub fn date_range(mut self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.start_date = Some(start);
        self.end_date = end;
        self
    }

    /// Adds an extra filter expression
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filters.push(expression.into());
        self
    }

    /// Builds the ReportDescriptor
    ///
    /// # Errors
    ///
    /// Returns an error if the name is missing or the end date precedes the start date
    pub fn build(self) -> Result<ReportDescriptor, String> {
        let name = self.name.ok_or("name is required")?;

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(format!(
                    "end_date {end} is before start_date {start} for report {name}"
                ));
            }
        }

        Ok(ReportDescriptor {
            name,
            view: self.view,
            start_date: self.start_date,
            end_date: self.end_date,
            filters: self.filters,
        })
    }
}

/// First day of the month containing `date`
pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}
