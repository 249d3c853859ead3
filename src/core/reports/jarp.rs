//! JARP customer invoice detail
//!
//! Invoice headers for the two JARP ship-to addresses, expanded to line level
//! through invoice lines, sales history and inventory supplier rows.
//! Headers whose PO number starts with `P` are excluded.

use super::{FetchedData, ReportUnit};
use crate::adapters::odata::{date_range_filter, FetchRequest};
use crate::core::transform::{field_values, inner_join};
use crate::domain::{Record, ReportDescriptor, Table, TransformError};

const INVOICES: &str = "invoices";
const INVOICE_LINES: &str = "invoice_lines";
const SALES_HISTORY: &str = "sales_history";
const SUPPLIERS: &str = "suppliers";

const PAGE_SIZE: usize = 500;

const INVOICE_COLUMNS: &[&str] = &[
    "bill2_name",
    "freight",
    "invoice_date",
    "invoice_no",
    "other_charge_amount",
    "period",
    "po_no",
    "ship2_address1",
    "tax_amount",
    "total_amount",
    "year_for_period",
    "ship_to_id",
    "salesrep_id",
];

const INVOICE_LINE_COLUMNS: &[&str] = &[
    "item_id",
    "item_desc",
    "qty_requested",
    "qty_shipped",
    "unit_price",
    "extended_price",
    "customer_part_number",
    "invoice_no",
    "line_no",
];

const SALES_HISTORY_COLUMNS: &[&str] = &[
    "item_id",
    "item_desc",
    "unit_price",
    "customer_id",
    "inv_mast_uid",
    "supplier_id",
    "invoice_no",
    "line_no",
    "ship_to_id",
];

const SUPPLIER_COLUMNS: &[&str] = &["inv_mast_uid", "supplier_id", "item_id"];

const OUTPUT_COLUMNS: &[&str] = &[
    "bill2_name",
    "ship2_address1",
    "invoice_date",
    "invoice_no",
    "item_id",
    "item_desc",
    "qty_requested",
    "qty_shipped",
    "unit_price",
    "extended_price",
    "customer_part_number",
    "po_no",
];

fn is_excluded_po(record: &Record) -> bool {
    record
        .get("po_no")
        .and_then(|v| v.as_str())
        .is_some_and(|po| po.starts_with('P'))
}

fn kept_invoices(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .filter(|record| !is_excluded_po(record))
        .cloned()
        .collect()
}

fn for_kept_invoices(request: FetchRequest, fetched: &FetchedData) -> Option<FetchRequest> {
    let invoices = kept_invoices(fetched.get(INVOICES)?);
    request.any_of("invoice_no", field_values(&invoices, "invoice_no"), true)
}

/// Invoice detail for JARP ship-to addresses
#[derive(Debug, Clone, Copy, Default)]
pub struct Jarp;

impl ReportUnit for Jarp {
    fn name(&self) -> &'static str {
        "jarp"
    }

    fn description(&self) -> &'static str {
        "Line-level invoice detail for the JARP ship-to addresses"
    }

    fn build_request(&self, descriptor: &ReportDescriptor) -> FetchRequest {
        let request = FetchRequest::new(INVOICES, "p21_view_invoice_hdr")
            .select(INVOICE_COLUMNS)
            .filter("(ship_to_id eq 12755 or ship_to_id eq 15097)")
            .order_by(&["invoice_date asc"])
            .page_size(PAGE_SIZE);

        match descriptor.date_range() {
            Some((start, end)) => request.filters(date_range_filter("date_created", start, end)),
            None => request,
        }
    }

    fn next_request(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Option<FetchRequest> {
        if !fetched.contains(INVOICE_LINES) {
            return for_kept_invoices(
                FetchRequest::new(INVOICE_LINES, "p21_view_invoice_line")
                    .select(INVOICE_LINE_COLUMNS)
                    .page_size(PAGE_SIZE),
                fetched,
            );
        }

        if !fetched.contains(SALES_HISTORY) {
            if fetched.records_or_empty(INVOICE_LINES).is_empty() {
                return None;
            }
            return for_kept_invoices(
                FetchRequest::new(SALES_HISTORY, "p21_sales_history_view")
                    .select(SALES_HISTORY_COLUMNS)
                    .page_size(PAGE_SIZE),
                fetched,
            );
        }

        if !fetched.contains(SUPPLIERS) {
            return FetchRequest::new(SUPPLIERS, "p21_view_inventory_supplier")
                .select(SUPPLIER_COLUMNS)
                .page_size(PAGE_SIZE)
                .any_of(
                    "supplier_id",
                    field_values(fetched.records_or_empty(SALES_HISTORY), "supplier_id"),
                    false,
                );
        }

        None
    }

    fn transform(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        let invoices = Table::from_records(&kept_invoices(fetched.require(INVOICES)?), INVOICE_COLUMNS);
        let lines = Table::from_records(fetched.records_or_empty(INVOICE_LINES), INVOICE_LINE_COLUMNS);
        let history =
            Table::from_records(fetched.records_or_empty(SALES_HISTORY), SALES_HISTORY_COLUMNS);
        let suppliers = Table::from_records(fetched.records_or_empty(SUPPLIERS), SUPPLIER_COLUMNS);

        let sales_suppliers = inner_join(&history, &suppliers, SUPPLIER_COLUMNS)?;
        let invoice_sales = inner_join(&invoices, &sales_suppliers, &["invoice_no"])?;
        let detail = inner_join(&invoice_sales, &lines, &["invoice_no", "line_no"])?;

        detail.cut(OUTPUT_COLUMNS)?.sort_by(&["invoice_date"])
    }
}
