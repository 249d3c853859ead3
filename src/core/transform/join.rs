//! Key-based joins between tables

use crate::domain::table::value_key;
use crate::domain::{Table, TransformError};
use std::collections::HashMap;

fn key_indices(table: &Table, keys: &[&str], side: &str) -> Result<Vec<usize>, TransformError> {
    keys.iter()
        .map(|key| {
            table
                .column_index(key)
                .ok_or_else(|| TransformError::MissingColumn {
                    dataset: side.to_string(),
                    column: key.to_string(),
                })
        })
        .collect()
}

fn row_key(values: &[serde_json::Value], indices: &[usize]) -> Option<Vec<String>> {
    indices.iter().map(|&i| value_key(&values[i])).collect()
}

/// Inner join of `left` and `right` on equal values of `keys`
///
/// Output columns are the left columns followed by the right columns that
/// are neither join keys nor already present on the left. Rows come out in
/// left order, each followed by its matches in right order. Null keys never
/// match; `1001` and `"1001"` do.
///
/// # Errors
///
/// Returns [`TransformError::MissingColumn`] if a key column is absent on
/// either side
///
/// ```
/// use p21_export::core::transform::inner_join;
/// use p21_export::domain::Table;
/// use serde_json::json;
///
/// let mut orders = Table::new(["order_no", "customer_id"]);
/// orders.push_row(vec![json!("A1"), json!(7)]).unwrap();
/// let mut customers = Table::new(["customer_id", "customer_name"]);
/// customers.push_row(vec![json!(7), json!("Acme")]).unwrap();
///
/// let joined = inner_join(&orders, &customers, &["customer_id"]).unwrap();
/// assert_eq!(joined.columns(), &["order_no", "customer_id", "customer_name"]);
/// assert_eq!(joined.len(), 1);
/// ```
pub fn inner_join(left: &Table, right: &Table, keys: &[&str]) -> Result<Table, TransformError> {
    let left_keys = key_indices(left, keys, "left")?;
    let right_keys = key_indices(right, keys, "right")?;

    let carried: Vec<usize> = right
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, column)| !right_keys.contains(i) && left.column_index(column).is_none())
        .map(|(i, _)| i)
        .collect();

    let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (position, row) in right.rows().enumerate() {
        if let Some(key) = row_key(row.values(), &right_keys) {
            index.entry(key).or_default().push(position);
        }
    }

    let right_rows: Vec<_> = right.rows().collect();
    let mut columns: Vec<String> = left.columns().to_vec();
    columns.extend(carried.iter().map(|&i| right.columns()[i].clone()));
    let mut joined = Table::new(columns);

    for row in left.rows() {
        let Some(key) = row_key(row.values(), &left_keys) else {
            continue;
        };
        let Some(matches) = index.get(&key) else {
            continue;
        };
        for &position in matches {
            let other = right_rows[position].values();
            let mut values = row.values().to_vec();
            values.extend(carried.iter().map(|&i| other[i].clone()));
            joined.push_row(values)?;
        }
    }

    Ok(joined)
}
