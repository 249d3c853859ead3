//! Grind shop open orders
//!
//! Open, undeleted CMS orders taken by `RC`, expanded to their open lines and
//! restricted to `KDB`/`PRE` items.

use super::{FetchedData, ReportUnit};
use crate::adapters::odata::FetchRequest;
use crate::core::transform::{field_values, inner_join, starts_with_any};
use crate::domain::{ReportDescriptor, Table, TransformError};

const ORDERS: &str = "orders";
const ORDER_LINES: &str = "order_lines";
const ITEMS: &str = "items";
const CUSTOMERS: &str = "customers";

const ITEM_PREFIXES: &[&str] = &["KDB", "PRE"];

const ORDER_COLUMNS: &[&str] = &[
    "customer_id",
    "order_no",
    "order_date",
    "requested_date",
    "promise_date",
    "taker",
    "delete_flag",
    "completed",
    "company_id",
];

const LINE_COLUMNS: &[&str] = &[
    "order_no",
    "inv_mast_uid",
    "qty_ordered",
    "qty_allocated",
    "qty_on_pick_tickets",
    "qty_invoiced",
    "qty_canceled",
    "disposition",
    "delete_flag",
    "complete",
];

const ITEM_COLUMNS: &[&str] = &["inv_mast_uid", "item_id", "item_desc"];
const CUSTOMER_COLUMNS: &[&str] = &["customer_id", "customer_name"];

const OUTPUT_COLUMNS: &[&str] = &[
    "customer_id",
    "customer_name",
    "order_no",
    "order_date",
    "requested_date",
    "promise_date",
    "item_id",
    "item_desc",
    "qty_ordered",
    "qty_allocated",
    "qty_on_pick_tickets",
    "qty_invoiced",
    "qty_canceled",
    "disposition",
];

/// Open grind shop order lines
#[derive(Debug, Clone, Copy, Default)]
pub struct GrindShopOpenOrders;

impl ReportUnit for GrindShopOpenOrders {
    fn name(&self) -> &'static str {
        "grind_shop_open_orders"
    }

    fn description(&self) -> &'static str {
        "Open grind shop order lines for KDB and PRE items"
    }

    fn build_request(&self, _descriptor: &ReportDescriptor) -> FetchRequest {
        FetchRequest::new(ORDERS, "p21_view_oe_hdr")
            .select(ORDER_COLUMNS)
            .filters([
                "company_id eq 'CMS'",
                "delete_flag eq 'N'",
                "completed ne 'Y'",
                "taker eq 'RC'",
            ])
            .order_by(&["customer_id asc", "order_no asc"])
    }

    fn next_request(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Option<FetchRequest> {
        let orders = fetched.get(ORDERS)?;

        if !fetched.contains(ORDER_LINES) {
            return Some(
                FetchRequest::new(ORDER_LINES, "p21_view_oe_line")
                    .select(LINE_COLUMNS)
                    .any_of("order_no", field_values(orders, "order_no"), true)?
                    .filter("delete_flag eq 'N'")
                    .filter("complete ne 'Y'"),
            );
        }

        if !fetched.contains(ITEMS) {
            let lines = fetched.records_or_empty(ORDER_LINES);
            return Some(
                FetchRequest::new(ITEMS, "p21_view_inv_mast")
                    .select(ITEM_COLUMNS)
                    .any_of("inv_mast_uid", field_values(lines, "inv_mast_uid"), false)?,
            );
        }

        if !fetched.contains(CUSTOMERS) {
            return Some(
                FetchRequest::new(CUSTOMERS, "p21_view_customer")
                    .select(CUSTOMER_COLUMNS)
                    .any_of("customer_id", field_values(orders, "customer_id"), false)?,
            );
        }

        None
    }

    fn transform(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        let orders = Table::from_records(fetched.require(ORDERS)?, ORDER_COLUMNS);
        let customers = Table::from_records(fetched.records_or_empty(CUSTOMERS), CUSTOMER_COLUMNS);
        let lines = Table::from_records(fetched.records_or_empty(ORDER_LINES), LINE_COLUMNS);
        let items = Table::from_records(fetched.records_or_empty(ITEMS), ITEM_COLUMNS);

        let with_customer = inner_join(&orders, &customers, &["customer_id"])?;
        let with_lines = inner_join(&with_customer, &lines, &["order_no"])?;
        let detail = inner_join(&with_lines, &items, &["inv_mast_uid"])?;

        Ok(detail
            .cut(OUTPUT_COLUMNS)?
            .sort_by(&["customer_id", "order_no", "item_id"])?
            .filter(|row| starts_with_any(row.get_str("item_id"), ITEM_PREFIXES)))
    }
}
