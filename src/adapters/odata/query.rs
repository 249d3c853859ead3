//! OData query composition
//!
//! A [`FetchRequest`] describes one logical query against a P21 view. Paging
//! parameters (`$top`, `$skip`, `$count`) are added by the client per page.
//! Membership filters built from earlier results are kept apart as an
//! [`AnyOf`] so the client can split long value lists over several requests.

use chrono::NaiveDate;
use serde_json::Value;

/// One logical query against an OData view
///
/// # Examples
///
/// ```
/// use p21_export::adapters::odata::FetchRequest;
///
/// let request = FetchRequest::new("invoice_hdr", "p21_view_invoice_hdr")
///     .select(&["invoice_no", "total_amount"])
///     .filter("consolidated eq 'Y'")
///     .order_by(&["invoice_no asc"]);
///
/// assert_eq!(request.filter_expression().as_deref(), Some("consolidated eq 'Y'"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Name the fetched records are stored under for the transform
    pub key: String,

    /// View name, e.g. `p21_view_invoice_hdr`
    pub entity: String,

    /// `$filter` clauses, joined with `and`
    pub filters: Vec<String>,

    /// `$select` fields
    pub select: Vec<String>,

    /// `$orderby` keys
    pub order_by: Vec<String>,

    /// Membership clause, ANDed with `filters`
    pub any_of: Option<AnyOf>,

    /// Overrides the configured page size
    pub page_size: Option<usize>,
}

impl FetchRequest {
    /// Creates a request with no filters, selection or ordering
    pub fn new(key: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entity: entity.into(),
            filters: Vec::new(),
            select: Vec::new(),
            order_by: Vec::new(),
            any_of: None,
            page_size: None,
        }
    }

    /// Sets the `$select` list
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Adds a `$filter` clause
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filters.push(expression.into());
        self
    }

    /// Adds several `$filter` clauses
    pub fn filters<I, S>(mut self, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(expressions.into_iter().map(Into::into));
        self
    }

    /// Sets the `$orderby` keys
    pub fn order_by(mut self, keys: &[&str]) -> Self {
        self.order_by = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Restricts the request to rows whose `field` equals one of `values`
    ///
    /// Returns `None` when no non-null value remains, so callers can skip the
    /// follow-up query instead of sending an empty filter.
    pub fn any_of<'a, I>(mut self, field: &str, values: I, quoted: bool) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.any_of = Some(AnyOf::new(field, values, quoted)?);
        Some(self)
    }

    /// Overrides the page size for this request
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Replaces the view name
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    /// Combined `$filter` value, `None` when there are no clauses
    pub fn filter_expression(&self) -> Option<String> {
        let clauses: Vec<String> = self
            .any_of
            .iter()
            .map(AnyOf::clause)
            .chain(self.filters.iter().cloned())
            .collect();
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" and "))
        }
    }

    /// Splits the request so no part tests more than `max_values` values
    ///
    /// Requests without a membership clause, or with a short one, come back
    /// as a single part.
    pub fn split(&self, max_values: usize) -> Vec<FetchRequest> {
        let max_values = max_values.max(1);
        match &self.any_of {
            Some(any_of) if any_of.values.len() > max_values => any_of
                .values
                .chunks(max_values)
                .map(|chunk| FetchRequest {
                    any_of: Some(AnyOf {
                        field: any_of.field.clone(),
                        values: chunk.to_vec(),
                    }),
                    ..self.clone()
                })
                .collect(),
            _ => vec![self.clone()],
        }
    }

    /// Query pairs for one page
    pub fn query_pairs(&self, top: usize, skip: usize) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(6);
        if !self.select.is_empty() {
            pairs.push(("$select", self.select.join(",")));
        }
        if let Some(filter) = self.filter_expression() {
            pairs.push(("$filter", filter));
        }
        if !self.order_by.is_empty() {
            pairs.push(("$orderby", self.order_by.join(",")));
        }
        pairs.push(("$count", "true".to_string()));
        pairs.push(("$top", top.to_string()));
        pairs.push(("$skip", skip.to_string()));
        pairs
    }
}

fn timestamp(date: NaiveDate, end_of_day: bool) -> String {
    if end_of_day {
        format!("{}T23:59:59Z", date.format("%Y-%m-%d"))
    } else {
        format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
    }
}

/// Inclusive date window on `field`
///
/// The end date covers the whole day.
///
/// ```
/// use chrono::NaiveDate;
/// use p21_export::adapters::odata::date_range_filter;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
/// assert_eq!(
///     date_range_filter("date_created", start, end),
///     vec![
///         "date_created ge 2024-01-01T00:00:00Z".to_string(),
///         "date_created le 2024-01-31T23:59:59Z".to_string(),
///     ]
/// );
/// ```
pub fn date_range_filter(field: &str, start: NaiveDate, end: NaiveDate) -> Vec<String> {
    vec![
        format!("{field} ge {}", timestamp(start, false)),
        format!("{field} le {}", timestamp(end, true)),
    ]
}

/// Strictly-before filter on `field`
pub fn before_filter(field: &str, date: NaiveDate) -> String {
    format!("{field} lt {}", timestamp(date, false))
}

/// Quotes a string literal for `$filter`, doubling embedded quotes
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders a JSON value as a `$filter` literal
///
/// Strings are quoted when `quoted` is set; numbers are emitted verbatim.
/// Returns `None` for null values.
pub fn literal(value: &Value, quoted: bool) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if quoted => Some(quote(s)),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if quoted => Some(quote(&n.to_string())),
        other => Some(other.to_string()),
    }
}

/// `(field eq a or field eq b ...)` over a list of distinct literals
///
/// ```
/// use p21_export::adapters::odata::AnyOf;
/// use serde_json::json;
///
/// let values = [json!("1001"), json!("1002"), json!("1001")];
/// let any_of = AnyOf::new("invoice_no", values.iter(), true).unwrap();
/// assert_eq!(any_of.clause(), "(invoice_no eq '1001' or invoice_no eq '1002')");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyOf {
    pub field: String,

    /// Rendered literals in first-seen order
    pub values: Vec<String>,
}

impl AnyOf {
    /// Collects the distinct non-null `values`; `None` when nothing remains
    pub fn new<'a, I>(field: &str, values: I, quoted: bool) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut literals: Vec<String> = Vec::new();
        for value in values {
            if let Some(lit) = literal(value, quoted) {
                if !literals.contains(&lit) {
                    literals.push(lit);
                }
            }
        }

        if literals.is_empty() {
            return None;
        }

        Some(Self {
            field: field.to_string(),
            values: literals,
        })
    }

    pub fn clause(&self) -> String {
        let clauses: Vec<String> = self
            .values
            .iter()
            .map(|lit| format!("{} eq {lit}", self.field))
            .collect();
        format!("({})", clauses.join(" or "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_order_and_content() {
        let request = FetchRequest::new("po_hdr", "p21_view_po_hdr")
            .select(&["po_no", "supplier_id"])
            .filter("complete eq 'N'")
            .filter("order_date lt 2024-02-01T00:00:00Z")
            .order_by(&["supplier_id asc", "order_date asc"]);

        let pairs = request.query_pairs(1000, 2000);
        assert_eq!(
            pairs,
            vec![
                ("$select", "po_no,supplier_id".to_string()),
                (
                    "$filter",
                    "complete eq 'N' and order_date lt 2024-02-01T00:00:00Z".to_string()
                ),
                ("$orderby", "supplier_id asc,order_date asc".to_string()),
                ("$count", "true".to_string()),
                ("$top", "1000".to_string()),
                ("$skip", "2000".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_without_optional_parts() {
        let pairs = FetchRequest::new("inv_loc", "p21_view_inv_loc").query_pairs(50, 0);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0, "$count");
    }

    #[test]
    fn test_with_entity_replaces_view() {
        let request = FetchRequest::new("k", "a").with_entity("b").page_size(10);
        assert_eq!(request.entity, "b");
        assert_eq!(request.page_size, Some(10));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_any_of_unquoted_skips_nulls() {
        let values = [json!(11777), Value::Null, json!(12000)];
        assert_eq!(
            AnyOf::new("supplier_id", values.iter(), false).map(|a| a.clause()).as_deref(),
            Some("(supplier_id eq 11777 or supplier_id eq 12000)")
        );
    }

    #[test]
    fn test_any_of_empty_is_none() {
        let values = [Value::Null];
        assert!(AnyOf::new("supplier_id", values.iter(), false).is_none());
        assert!(FetchRequest::new("k", "v")
            .any_of("supplier_id", std::iter::empty(), false)
            .is_none());
    }

    #[test]
    fn test_any_of_comes_first_in_filter() {
        let values = [json!("5001")];
        let request = FetchRequest::new("lines", "p21_view_oe_line")
            .filter("delete_flag eq 'N'")
            .any_of("order_no", values.iter(), true)
            .unwrap();
        assert_eq!(
            request.filter_expression().as_deref(),
            Some("(order_no eq '5001') and delete_flag eq 'N'")
        );
    }

    #[test]
    fn test_split_long_membership_into_bounded_parts() {
        let uids: Vec<Value> = (1..=300).map(|n| json!(n)).collect();
        let request = FetchRequest::new("items", "p21_view_inv_mast")
            .select(&["inv_mast_uid", "item_id"])
            .filter("delete_flag eq 'N'")
            .any_of("inv_mast_uid", uids.iter(), false)
            .unwrap();

        let parts = request.split(50);
        assert_eq!(parts.len(), 6);
        for (i, part) in parts.iter().enumerate() {
            let any_of = part.any_of.as_ref().unwrap();
            assert_eq!(any_of.values.len(), 50);
            assert_eq!(any_of.values[0], (i * 50 + 1).to_string());
            assert_eq!(part.filters, request.filters);
            assert_eq!(part.select, request.select);
            assert_eq!(part.key, "items");
        }
    }

    #[test]
    fn test_split_keeps_short_requests_whole() {
        let values = [json!(1), json!(2)];
        let request = FetchRequest::new("items", "p21_view_inv_mast")
            .any_of("inv_mast_uid", values.iter(), false)
            .unwrap();
        assert_eq!(request.split(50), vec![request.clone()]);
        assert_eq!(FetchRequest::new("a", "b").split(50).len(), 1);
    }

    #[test]
    fn test_before_filter() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        assert_eq!(
            before_filter("order_date", date),
            "order_date lt 2024-05-17T00:00:00Z"
        );
    }
}
