//! Kennametal point-of-sale report
//!
//! Sales history lines for supplier 11777 within the month, joined with the
//! customer's tax exemption numbers and the supplier cost of each item, and
//! grouped by week of the month.

use super::{FetchedData, ReportUnit};
use crate::adapters::odata::{date_range_filter, FetchRequest};
use crate::core::transform::inner_join;
use crate::domain::{Record, ReportDescriptor, Table, TransformError};
use chrono::{Datelike, NaiveDate};
use serde_json::Value;

const SALES: &str = "sales";
const CUSTOMERS: &str = "customers";
const SUPPLIER_ITEMS: &str = "supplier_items";

const SUPPLIER_FILTER: &str = "supplier_id eq 11777";

const SALES_COLUMNS: &[&str] = &[
    "bill2_country",
    "cogs_amount",
    "customer_id",
    "inv_mast_uid",
    "invoice_date",
    "invoice_no",
    "item_desc",
    "period",
    "qty_shipped",
    "ship2_address1",
    "ship2_city",
    "ship2_name",
    "ship2_postal_code",
    "ship2_state",
    "supplier_id",
    "unit_price",
    "year_for_period",
    "salesrep_id",
];

const CUSTOMER_COLUMNS: &[&str] = &[
    "customer_id",
    "customer_id_string",
    "federal_exemption_number",
    "other_exemption_number",
    "state_excise_tax_exemption_no",
];

const SUPPLIER_COLUMNS: &[&str] = &["cost", "inv_mast_uid", "item_id", "supplier_id"];

const OUTPUT_COLUMNS: &[&str] = &[
    "bill2_country",
    "cogs_amount",
    "invoice_date",
    "invoice_no",
    "item_desc",
    "qty_shipped",
    "ship2_address1",
    "ship2_city",
    "ship2_name",
    "ship2_postal_code",
    "ship2_state",
    "unit_price",
    "federal_exemption_number",
    "other_exemption_number",
    "state_excise_tax_exemption_no",
    "cost",
    "item_id",
    "salesrep_id",
    "week_in_month",
];

/// Week of the month `date` falls in, shifted by the weekday of the 1st
/// (Monday = 0)
fn week_in_month(date: NaiveDate) -> u32 {
    let offset = date
        .with_day(1)
        .map_or(0, |first| first.weekday().num_days_from_monday());
    (date.day() + offset) / 7 + 1
}

fn parse_invoice_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()
}

/// Customers keyed by the string id sales history refers to
fn customers_by_string_id(records: &[Record]) -> Table {
    let columns: Vec<&str> = CUSTOMER_COLUMNS
        .iter()
        .copied()
        .filter(|c| *c != "customer_id_string")
        .collect();
    let renamed: Vec<Record> = records
        .iter()
        .map(|record| {
            let mut renamed = record.clone();
            let key = record.get("customer_id_string").cloned().unwrap_or(Value::Null);
            renamed.insert("customer_id".to_string(), key);
            renamed
        })
        .collect();
    Table::from_records(&renamed, &columns)
}

/// Supplier 11777 sell-through for Kennametal
#[derive(Debug, Clone, Copy, Default)]
pub struct KennametalPos;

impl ReportUnit for KennametalPos {
    fn name(&self) -> &'static str {
        "kennametal_pos"
    }

    fn description(&self) -> &'static str {
        "Kennametal point-of-sale lines by week of the month"
    }

    fn build_request(&self, descriptor: &ReportDescriptor) -> FetchRequest {
        let request = FetchRequest::new(SALES, "p21_sales_history_view")
            .select(SALES_COLUMNS)
            .filter(SUPPLIER_FILTER);

        match descriptor.date_range() {
            Some((start, end)) => request.filters(date_range_filter("invoice_date", start, end)),
            None => request,
        }
    }

    fn next_request(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Option<FetchRequest> {
        if fetched.get(SALES)?.is_empty() {
            return None;
        }

        if !fetched.contains(CUSTOMERS) {
            return Some(
                FetchRequest::new(CUSTOMERS, "p21_view_customer")
                    .select(CUSTOMER_COLUMNS)
                    .filter("customer_id ne 1")
                    .order_by(&["customer_id asc"]),
            );
        }

        if !fetched.contains(SUPPLIER_ITEMS) {
            return Some(
                FetchRequest::new(SUPPLIER_ITEMS, "p21_view_inventory_supplier")
                    .select(SUPPLIER_COLUMNS)
                    .filter(SUPPLIER_FILTER),
            );
        }

        None
    }

    fn transform(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        let sales = Table::from_records(fetched.require(SALES)?, SALES_COLUMNS);
        let customers = customers_by_string_id(fetched.records_or_empty(CUSTOMERS));
        let supplier_items =
            Table::from_records(fetched.records_or_empty(SUPPLIER_ITEMS), SUPPLIER_COLUMNS);

        let with_customer = inner_join(&sales, &customers, &["customer_id"])?;
        let with_cost = inner_join(&with_customer, &supplier_items, &["inv_mast_uid", "supplier_id"])?;

        with_cost
            .add_field("week_in_month", |row| {
                row.get("invoice_date")
                    .and_then(parse_invoice_date)
                    .map_or(Value::Null, |date| Value::from(week_in_month(date)))
            })
            .cut(OUTPUT_COLUMNS)?
            .sort_by(&["week_in_month"])
    }
}
