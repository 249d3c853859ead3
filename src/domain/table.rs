//! Tabular data model
//!
//! Raw OData records are JSON objects; report output is a [`Table`] with an
//! explicit column order so the sink can write a stable header.

use super::errors::TransformError;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// One raw record as returned by the OData service
pub type Record = Map<String, Value>;

/// Ordered output table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of a single table row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Value of `column`, or `None` when the table has no such column
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Value of `column` as a string slice, if it is a JSON string
    pub fn get_str(&self, column: &str) -> Option<&'a str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Value of `column` as a number, accepting numeric strings
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(as_f64)
    }

    /// Raw cell values in column order
    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

impl Table {
    /// Creates an empty table with the given header
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from raw records using an explicit column list
    ///
    /// Fields absent from a record become `null`; fields not listed are dropped.
    pub fn from_records(records: &[Record], columns: &[&str]) -> Self {
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(*c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Builds a table from raw records, taking every field any record carries
    ///
    /// Columns follow the records in order: a record contributes the fields
    /// not seen in earlier records. Within one record fields come in the
    /// key order of [`Record`], which is sorted by name.
    pub fn from_records_inferred(records: &[Record]) -> Self {
        let mut columns: Vec<&str> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key.as_str());
                }
            }
        }
        Self::from_records(records, &columns)
    }

    /// Appends a row
    ///
    /// # Errors
    ///
    /// Returns an error if the row width does not match the header
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<(), TransformError> {
        if values.len() != self.columns.len() {
            return Err(TransformError::Other(format!(
                "row has {} values but table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(values);
        Ok(())
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of `column` in the header
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Iterates rows in order
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Rows as column-name keyed records
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|values| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Projects the table onto `columns`, in the given order
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::MissingColumn`] if any column is absent
    pub fn cut(&self, columns: &[&str]) -> Result<Table, TransformError> {
        let indices = columns
            .iter()
            .map(|c| {
                self.column_index(c)
                    .ok_or_else(|| TransformError::MissingColumn {
                        dataset: "table".to_string(),
                        column: c.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Keeps rows for which `predicate` holds
    pub fn filter<F>(&self, predicate: F) -> Table
    where
        F: Fn(&Row<'_>) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows()
                .filter(|row| predicate(row))
                .map(|row| row.values.to_vec())
                .collect(),
        }
    }

    /// Appends a computed column
    pub fn add_field<F>(&self, column: &str, compute: F) -> Table
    where
        F: Fn(&Row<'_>) -> Value,
    {
        let mut columns = self.columns.clone();
        columns.push(column.to_string());
        let rows = self
            .rows()
            .map(|row| {
                let mut values = row.values.to_vec();
                values.push(compute(&row));
                values
            })
            .collect();
        Table { columns, rows }
    }

    /// Stable sort by the given columns, ascending
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::MissingColumn`] if any sort column is absent
    pub fn sort_by(&self, columns: &[&str]) -> Result<Table, TransformError> {
        let indices = columns
            .iter()
            .map(|c| {
                self.column_index(c)
                    .ok_or_else(|| TransformError::MissingColumn {
                        dataset: "table".to_string(),
                        column: c.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| compare_values(&a[i], &b[i]))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }
}

/// Interprets a JSON value as a number; numeric strings are accepted
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Canonical join key for a value; `null` never matches
pub fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => Some((f as i64).to_string()),
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Total order used for sorting: null < bool < number < string < other
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn sample() -> Table {
        Table::from_records(
            &[
                record(json!({"po_no": "B2", "qty_ordered": 10, "qty_received": 4})),
                record(json!({"po_no": "A1", "qty_ordered": 5, "qty_received": 5})),
                record(json!({"po_no": "C3", "qty_ordered": 7})),
            ],
            &["po_no", "qty_ordered", "qty_received"],
        )
    }

    #[test]
    fn test_from_records_fills_missing_with_null() {
        let table = sample();
        assert_eq!(table.len(), 3);
        let last = table.rows().last().unwrap();
        assert_eq!(last.get("qty_received"), Some(&Value::Null));
    }

    #[test]
    fn test_from_records_inferred_keeps_first_seen_order() {
        let table = Table::from_records_inferred(&[
            record(json!({"a": 1})),
            record(json!({"a": 2, "b": 3})),
        ]);
        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.rows().next().unwrap().get("b"), Some(&Value::Null));
    }

    #[test]
    fn test_from_records_inferred_sorts_fields_within_a_record() {
        let table = Table::from_records_inferred(&[
            record(json!({"qty": 1, "item_id": "KDB-1"})),
            record(json!({"cost": 2.5, "qty": 3})),
        ]);
        assert_eq!(table.columns(), &["item_id", "qty", "cost"]);
    }

    #[test]
    fn test_cut_reorders_and_rejects_missing() {
        let table = sample();
        let cut = table.cut(&["qty_ordered", "po_no"]).unwrap();
        assert_eq!(cut.columns(), &["qty_ordered".to_string(), "po_no".to_string()]);
        assert!(matches!(
            table.cut(&["nope"]),
            Err(TransformError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_sort_by_is_stable_and_typed() {
        let sorted = sample().sort_by(&["po_no"]).unwrap();
        let keys: Vec<_> = sorted.rows().map(|r| r.get_str("po_no").unwrap()).collect();
        assert_eq!(keys, vec!["A1", "B2", "C3"]);
    }

    #[test]
    fn test_add_field_and_filter() {
        let table = sample().add_field("qty_remaining", |row| {
            match (row.get_f64("qty_ordered"), row.get_f64("qty_received")) {
                (Some(o), Some(r)) => json!(o - r),
                _ => Value::Null,
            }
        });
        let open = table.filter(|row| row.get_f64("qty_remaining").unwrap_or(0.0) > 0.0);
        assert_eq!(open.len(), 1);
        assert_eq!(open.rows().next().unwrap().get_str("po_no"), Some("B2"));
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut table = Table::new(["a", "b"]);
        assert!(table.push_row(vec![json!(1)]).is_err());
        assert!(table.push_row(vec![json!(1), json!(2)]).is_ok());
        assert_eq!(table.to_records()[0]["b"], json!(2));
    }

    #[test]
    fn test_value_key_normalises_numbers() {
        assert_eq!(value_key(&json!(11777)), Some("11777".to_string()));
        assert_eq!(value_key(&json!(11777.0)), Some("11777".to_string()));
        assert_eq!(value_key(&json!("11777")), Some("11777".to_string()));
        assert_eq!(value_key(&Value::Null), None);
    }

    #[test]
    fn test_compare_values_orders_null_first() {
        assert_eq!(compare_values(&Value::Null, &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    }
}
