//! Invoice header reports
//!
//! `daily_sales`, `monthly_invoices` and `monthly_consolidation` all read
//! `p21_view_invoice_hdr` filtered on `date_created` and differ only in the
//! window, the selected columns and one extra filter.

use super::{FetchedData, ReportUnit};
use crate::adapters::odata::{date_range_filter, FetchRequest};
use crate::domain::{ReportDescriptor, Table, TransformError};
use chrono::Duration;

const INVOICE_VIEW: &str = "p21_view_invoice_hdr";
const INVOICES: &str = "invoices";
const ORDER: &[&str] = &["year_for_period asc", "invoice_no asc"];

const DAILY_SALES_COLUMNS: &[&str] = &[
    "bill2_name",
    "freight",
    "invoice_date",
    "invoice_no",
    "other_charge_amount",
    "period",
    "tax_amount",
    "total_amount",
    "year_for_period",
    "salesrep_id",
];

const INVOICE_COLUMNS: &[&str] = &[
    "bill2_name",
    "freight",
    "invoice_date",
    "invoice_no",
    "other_charge_amount",
    "period",
    "tax_amount",
    "total_amount",
    "year_for_period",
];

const CONSOLIDATION_COLUMNS: &[&str] = &[
    "bill2_name",
    "freight",
    "invoice_date",
    "invoice_no",
    "other_charge_amount",
    "period",
    "tax_amount",
    "total_amount",
    "year_for_period",
    "consolidated",
];

/// Days covered by `monthly_invoices` when no end date is given
pub const MONTHLY_INVOICE_WINDOW_DAYS: i64 = 90;

fn invoice_request(columns: &[&str]) -> FetchRequest {
    FetchRequest::new(INVOICES, INVOICE_VIEW)
        .select(columns)
        .order_by(ORDER)
}

fn created_within(request: FetchRequest, descriptor: &ReportDescriptor) -> FetchRequest {
    match descriptor.date_range() {
        Some((start, end)) => request.filters(date_range_filter("date_created", start, end)),
        None => request,
    }
}

fn invoice_table(fetched: &FetchedData, columns: &[&str]) -> Result<Table, TransformError> {
    Ok(Table::from_records(fetched.require(INVOICES)?, columns))
}

/// Invoice headers created in the reporting window
#[derive(Debug, Clone, Copy, Default)]
pub struct DailySales;

impl ReportUnit for DailySales {
    fn name(&self) -> &'static str {
        "daily_sales"
    }

    fn description(&self) -> &'static str {
        "Invoice headers with sales rep for the reporting window"
    }

    fn build_request(&self, descriptor: &ReportDescriptor) -> FetchRequest {
        created_within(invoice_request(DAILY_SALES_COLUMNS), descriptor)
    }

    fn transform(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        invoice_table(fetched, DAILY_SALES_COLUMNS)
    }
}

/// Invoice headers created from the start date through the following 90 days
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthlyInvoices;

impl ReportUnit for MonthlyInvoices {
    fn name(&self) -> &'static str {
        "monthly_invoices"
    }

    fn description(&self) -> &'static str {
        "Invoice headers created within 90 days of the start date"
    }

    fn build_request(&self, descriptor: &ReportDescriptor) -> FetchRequest {
        let request = invoice_request(INVOICE_COLUMNS);
        match (descriptor.start_date, descriptor.end_date) {
            (Some(start), None) => request.filters(date_range_filter(
                "date_created",
                start,
                start + Duration::days(MONTHLY_INVOICE_WINDOW_DAYS),
            )),
            _ => created_within(request, descriptor),
        }
    }

    fn transform(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        invoice_table(fetched, INVOICE_COLUMNS)
    }
}

/// Consolidated invoice headers in the reporting window
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthlyConsolidation;

impl ReportUnit for MonthlyConsolidation {
    fn name(&self) -> &'static str {
        "monthly_consolidation"
    }

    fn description(&self) -> &'static str {
        "Consolidated invoice headers for the reporting window"
    }

    fn build_request(&self, descriptor: &ReportDescriptor) -> FetchRequest {
        created_within(invoice_request(CONSOLIDATION_COLUMNS), descriptor)
            .filter("consolidated eq 'Y'")
    }

    fn transform(
        &self,
        _descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> Result<Table, TransformError> {
        invoice_table(fetched, CONSOLIDATION_COLUMNS)
    }
}
