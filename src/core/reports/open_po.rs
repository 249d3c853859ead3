//! Open purchase orders with supplier names and outstanding quantities

use super::{FetchedData, ReportUnit};
use crate::adapters::odata::FetchRequest;
use crate::core::transform::{field_values, inner_join};
use crate::domain::table::as_f64;
use crate::domain::{ReportDescriptor, Table, TransformError};
use chrono::Utc;
use serde_json::Value;

const PO_HEADERS: &str = "po_headers";
const PO_LINES: &str = "po_lines";
const SUPPLIERS: &str = "suppliers";

const HEADER_COLUMNS: &[&str] = &["supplier_id", "po_no", "order_date", "expected_date"];
const LINE_COLUMNS: &[&str] = &[
    "po_no",
    "line_no",
    "item_id",
    "item_description",
    "qty_ordered",
    "qty_received",
];
const SUPPLIER_COLUMNS: &[&str] = &["supplier_id", "supplier_name"];

const OUTPUT_COLUMNS: &[&str] = &[
    "supplier_id",
    "supplier_name",
    "po_no",
    "order_date",
    "expected_date",
    "item_id",
    "item_description",
    "qty_ordered",
    "qty_received",
    "qty_remaining",
];

fn now_literal() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// `ordered - received`, integral when both sides are
fn remaining(ordered: Option<&Value>, received: Option<&Value>) -> Value {
    let (Some(ordered), Some(received)) = (ordered, received) else {
        return Value::Null;
    };
    if let (Some(o), Some(r)) = (ordered.as_i64(), received.as_i64()) {
        return Value::from(o - r);
    }
    match (as_f64(ordered), as_f64(received)) {
        (Some(o), Some(r)) => Value::from(o - r),
        _ => Value::Null,
    }
}

/// Open purchase order lines ordered before today
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPurchaseOrders;

impl ReportUnit for OpenPurchaseOrders {
    fn name(&self) -> &'static str {
        "open_po"
    }

    fn description(&self) -> &'static str {
        "Open purchase order lines with supplier and remaining quantity"
    }

    fn build_request(&self, _descriptor: &ReportDescriptor) -> FetchRequest {
        FetchRequest::new(PO_HEADERS, "p21_view_po_hdr")
            .select(HEADER_COLUMNS)
            .filter(format!("order_date lt {}", now_literal()))
            .filter("complete eq 'N'")
            .order_by(&["supplier_id asc", "order_date asc"])
    }

    fn next_request(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Option<FetchRequest> {
        let headers = fetched.get(PO_HEADERS)?;
        if headers.is_empty() {
            return None;
        }

        if !fetched.contains(PO_LINES) {
            return Some(
                FetchRequest::new(PO_LINES, "p21_view_po_line")
                    .select(LINE_COLUMNS)
                    .filter(format!("date_created lt {}", now_literal()))
                    .filter("complete eq 'N'")
                    .order_by(&["po_no asc", "line_no asc"]),
            );
        }

        if !fetched.contains(SUPPLIERS) {
            return Some(
                FetchRequest::new(SUPPLIERS, "p21_view_supplier")
                    .select(SUPPLIER_COLUMNS)
                    .any_of("supplier_id", field_values(headers, "supplier_id"), false)?
                    .order_by(&["supplier_id asc"]),
            );
        }

        None
    }

    fn transform(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        let headers = Table::from_records(fetched.require(PO_HEADERS)?, HEADER_COLUMNS);
        let lines = Table::from_records(fetched.records_or_empty(PO_LINES), LINE_COLUMNS);
        let suppliers = Table::from_records(fetched.records_or_empty(SUPPLIERS), SUPPLIER_COLUMNS);

        let with_supplier = inner_join(&headers, &suppliers, &["supplier_id"])?;
        let joined = inner_join(&with_supplier, &lines, &["po_no"])?;

        joined
            .add_field("qty_remaining", |row| {
                remaining(row.get("qty_ordered"), row.get("qty_received"))
            })
            .cut(OUTPUT_COLUMNS)
    }
}
