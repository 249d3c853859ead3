//! Table helpers shared by report transforms

pub mod join;

pub use join::inner_join;

use crate::domain::Record;
use serde_json::Value;

/// Values of `field` across `records`, skipping records without it
pub fn field_values<'a>(records: &'a [Record], field: &'a str) -> impl Iterator<Item = &'a Value> {
    records.iter().filter_map(move |record| record.get(field))
}

/// True when `value` starts with any of `prefixes`
pub fn starts_with_any(value: Option<&str>, prefixes: &[&str]) -> bool {
    value.is_some_and(|v| prefixes.iter().any(|p| v.starts_with(p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_values_skips_missing() {
        let records: Vec<Record> = vec![
            json!({"po_no": 1}).as_object().cloned().unwrap(),
            json!({"other": 2}).as_object().cloned().unwrap(),
            json!({"po_no": 3}).as_object().cloned().unwrap(),
        ];
        let values: Vec<&Value> = field_values(&records, "po_no").collect();
        assert_eq!(values, vec![&json!(1), &json!(3)]);
    }

    #[test]
    fn test_starts_with_any() {
        assert!(starts_with_any(Some("KDB-100"), &["KDB", "PRE"]));
        assert!(!starts_with_any(Some("XYZ"), &["KDB", "PRE"]));
        assert!(!starts_with_any(None, &["KDB"]));
    }
}
