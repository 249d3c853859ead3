//! Dead inventory: stock on hand with no sale since the start date
//!
//! Quantity on hand is summed over every location of an item; the unit cost
//! is the first non-null standard cost seen. Dates are compared as ISO
//! strings, so `2024-01-31T00:00:00` sorts after the cutoff `2024-01-31`.

use super::{FetchedData, ReportUnit};
use crate::adapters::odata::FetchRequest;
use crate::domain::table::as_f64;
use crate::domain::{Record, ReportDescriptor, Table, TransformError};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

const ITEM_LOCATIONS: &str = "item_locations";
const SALES: &str = "sales";
const RECEIPTS: &str = "receipts";

pub const COLUMNS: &[&str] = &[
    "Item ID",
    "Quantity on hand (QOH)",
    "Last sales date",
    "Last received date",
    "Unit cost",
    "Value on hand",
];

/// Latest non-empty `date_field` per item
fn latest_dates<'a>(records: &'a [Record], date_field: &str) -> HashMap<&'a str, &'a str> {
    let mut latest: HashMap<&str, &str> = HashMap::new();
    for record in records {
        let item = record.get("item_id").and_then(Value::as_str).filter(|s| !s.is_empty());
        let date = record.get(date_field).and_then(Value::as_str).filter(|s| !s.is_empty());
        if let (Some(item), Some(date)) = (item, date) {
            let entry = latest.entry(item).or_insert(date);
            if date > *entry {
                *entry = date;
            }
        }
    }
    latest
}

#[derive(Debug, Default)]
struct Stock {
    qty_on_hand: f64,
    unit_cost: Option<f64>,
}

/// Items with stock on hand, in first-seen order
fn stock_by_item(records: &[Record]) -> Vec<(&str, Stock)> {
    let mut order: Vec<&str> = Vec::new();
    let mut stock: HashMap<&str, Stock> = HashMap::new();

    for record in records {
        let Some(item) = record.get("item_id").and_then(Value::as_str).filter(|s| !s.is_empty())
        else {
            continue;
        };
        let entry = stock.entry(item).or_insert_with(|| {
            order.push(item);
            Stock::default()
        });
        if let Some(qty) = record.get("qty_on_hand").and_then(as_f64) {
            entry.qty_on_hand += qty;
        }
        if entry.unit_cost.is_none() {
            entry.unit_cost = record.get("standard_cost").and_then(as_f64);
        }
    }

    order
        .into_iter()
        .filter_map(|item| stock.remove(item).map(|s| (item, s)))
        .collect()
}

fn by_value_desc(a: &Option<f64>, b: &Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Items on hand that have not sold since the start date
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadInventory;

impl ReportUnit for DeadInventory {
    fn name(&self) -> &'static str {
        "dead_inventory"
    }

    fn description(&self) -> &'static str {
        "Items on hand with no sales since the start date, by value on hand"
    }

    fn build_request(&self, _descriptor: &ReportDescriptor) -> FetchRequest {
        FetchRequest::new(ITEM_LOCATIONS, "p21_view_inv_loc").select(&[
            "item_id",
            "qty_on_hand",
            "standard_cost",
        ])
    }

    fn next_request(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Option<FetchRequest> {
        if !fetched.contains(SALES) {
            return Some(
                FetchRequest::new(SALES, "p21_sales_history_view")
                    .select(&["item_id", "invoice_date"]),
            );
        }
        if !fetched.contains(RECEIPTS) {
            return Some(
                FetchRequest::new(RECEIPTS, "p21_view_inventory_receipts_line")
                    .select(&["item_id", "date_created"]),
            );
        }
        None
    }

    fn transform(
        &self,
        descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        let cutoff = descriptor
            .start_date
            .ok_or_else(|| TransformError::InvalidValue {
                column: "start_date".to_string(),
                message: "dead inventory needs a start date as the sales cutoff".to_string(),
            })?
            .format("%Y-%m-%d")
            .to_string();

        let last_sale = latest_dates(fetched.records_or_empty(SALES), "invoice_date");
        let last_received = latest_dates(fetched.records_or_empty(RECEIPTS), "date_created");

        let mut rows: Vec<(Option<f64>, Vec<Value>)> = Vec::new();
        for (item, stock) in stock_by_item(fetched.require(ITEM_LOCATIONS)?) {
            if stock.qty_on_hand <= 0.0 {
                continue;
            }
            let sold = last_sale.get(item).copied();
            if sold.is_some_and(|date| date >= cutoff.as_str()) {
                continue;
            }

            let value = stock.unit_cost.map(|cost| cost * stock.qty_on_hand);
            rows.push((
                value,
                vec![
                    Value::from(item),
                    Value::from(stock.qty_on_hand),
                    Value::from(sold.unwrap_or_default()),
                    Value::from(last_received.get(item).copied().unwrap_or_default()),
                    stock.unit_cost.map_or(Value::Null, Value::from),
                    value.map_or(Value::Null, Value::from),
                ],
            ));
        }

        rows.sort_by(|(a, _), (b, _)| by_value_desc(a, b));

        let mut table = Table::new(COLUMNS.iter().copied());
        for (_, row) in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }
}
