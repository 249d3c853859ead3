//! Single-view inventory reports for supplier 11777 at location 101

use super::{FetchedData, ReportUnit};
use crate::adapters::odata::FetchRequest;
use crate::domain::{ReportDescriptor, Table, TransformError};

const RECORDS: &str = "records";

/// A report that exports one filtered view as-is
#[derive(Debug, Clone, Copy)]
pub struct ViewReport {
    pub name: &'static str,
    pub description: &'static str,
    pub view: &'static str,
    pub columns: &'static [&'static str],
    pub filters: &'static [&'static str],
}

impl ReportUnit for ViewReport {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn build_request(&self, _descriptor: &ReportDescriptor) -> FetchRequest {
        FetchRequest::new(RECORDS, self.view)
            .select(self.columns)
            .filters(self.filters.iter().copied())
    }

    fn transform(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        Ok(Table::from_records(fetched.require(RECORDS)?, self.columns))
    }
}

pub const STOCK_STATUS: ViewReport = ViewReport {
    name: "inventory_stock_status",
    description: "Stock status of supplier 11777 items on hand at location 101",
    view: "p21_view_stockstatus_report",
    columns: &[
        "item_id",
        "delete_flag",
        "location_id",
        "qty_on_hand",
        "company_id",
        "product_group_id",
        "product_group_desc",
        "purchase_class",
        "order_quantity",
        "qty_allocated",
        "qty_backordered",
        "qty_in_transit",
        "qty_reserved_due_in",
        "requisition",
        "company_name",
        "location_name",
        "supplier_id",
        "supplier_name",
        "primary_supplier",
        "net_stock",
        "vendor_consigned",
        "item_desc",
        "location_delete_flag",
    ],
    filters: &["supplier_id eq 11777", "location_id eq 101", "qty_on_hand gt 0"],
};

pub const INVENTORY_VALUE: ViewReport = ViewReport {
    name: "inventory_value",
    description: "Inventory value layers of supplier 11777 items at location 101",
    view: "p21_view_inventory_value_report",
    columns: &[
        "item_id",
        "item_desc",
        "track_lots",
        "use_lot_cost",
        "vendor_consigned",
        "company_id",
        "company_name",
        "location_id",
        "location_name",
        "default_branch_id",
        "branch_description",
        "product_group_id",
        "product_group_desc",
        "primary_supplier_id",
        "supplier_name",
        "requisition",
        "purchase_class",
        "qty_on_hand",
        "special_layer_qty",
        "special_layer_value",
        "fifo_layer_qty",
        "fifo_layer_value",
        "lot_qty",
        "lot_value",
        "cost",
        "cost_basis",
        "inv_mast_uid",
        "revision_level",
        "current_revision_level",
        "rental_item_flag",
        "special_dts_layer_qty",
        "special_dts_layer_value",
    ],
    filters: &["primary_supplier_id eq 11777", "location_id eq 101"],
};

pub const INACTIVE_ITEMS: ViewReport = ViewReport {
    name: "inactive_items",
    description: "Inactive supplier 11777 items at location 101",
    view: "p21_view_inactive_items_report",
    columns: &[
        "item_id",
        "item_desc",
        "delete_flag",
        "track_lots",
        "location_id",
        "company_id",
        "company_name",
        "product_group_id",
        "product_group_desc",
        "purchase_discount_group",
        "sales_discount_group",
        "primary_supplier_id",
        "supplier_name",
        "qty_on_hand",
        "qty_allocated",
        "qty_available",
        "qty_backordered",
        "qty_on_PO",
        "qty_in_transit",
        "qty_in_process",
        "standard_cost",
        "moving_average_cost",
        "next_due_in_po_cost",
        "last_purchase_date",
        "last_order_date",
        "use_lot_cost",
        "inventory_cost",
        "stockable",
        "qty_reserved_due_in",
        "sales_pricing_unit_size",
        "period_usage",
        "StockTracker",
    ],
    filters: &["primary_supplier_id eq 11777", "location_id eq 101"],
};
