//! Report units and the report registry
//!
//! A [`ReportUnit`] knows which views to query for a report and how to turn
//! the fetched records into an output [`Table`]. Units never touch the
//! network themselves; the scheduler drives [`ReportUnit::build_request`] and
//! [`ReportUnit::next_request`] through a fetcher and hands the collected
//! [`FetchedData`] to [`ReportUnit::transform`].
//!
//! Every concrete unit is registered in [`ReportRegistry::standard`], which
//! also defines the report groups selectable from the command line.

pub mod dead_inventory;
pub mod grind_shop;
pub mod inventory;
pub mod invoices;
pub mod jarp;
pub mod kennametal_pos;
pub mod open_po;

use crate::adapters::odata::FetchRequest;
use crate::domain::{
    ExportError, GroupName, Record, ReportDescriptor, ReportName, Result, Table, TransformError,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Query-shaping and transform logic of one report
pub trait ReportUnit: Send + Sync {
    /// Registered identifier, also used as the output file stem
    fn name(&self) -> &'static str;

    /// One-line description shown by `list-reports`
    fn description(&self) -> &'static str;

    /// Primary query of the report
    fn build_request(&self, descriptor: &ReportDescriptor) -> FetchRequest;

    /// Follow-up query depending on what has been fetched so far
    ///
    /// Called after every completed fetch until it returns `None`.
    fn next_request(
        &self,
        _descriptor: &ReportDescriptor,
        _fetched: &FetchedData,
    ) -> Option<FetchRequest> {
        None
    }

    /// Builds the output table from the fetched datasets
    ///
    /// Must not perform I/O; calling it twice on the same input yields the
    /// same table.
    fn transform(
        &self,
        descriptor: &ReportDescriptor,
        fetched: &FetchedData,
    ) -> std::result::Result<Table, TransformError>;
}

/// Primary query of `unit` with the descriptor's view override and extra
/// filters applied
pub fn primary_request(unit: &dyn ReportUnit, descriptor: &ReportDescriptor) -> FetchRequest {
    let request = unit
        .build_request(descriptor)
        .filters(descriptor.filters.iter().cloned());
    match &descriptor.view {
        Some(view) => request.with_entity(view.clone()),
        None => request,
    }
}

/// Record sets fetched for one report execution, keyed by request key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedData {
    datasets: BTreeMap<String, Vec<Record>>,
}

impl FetchedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the records of one request, replacing an earlier set under the same key
    pub fn insert(&mut self, key: impl Into<String>, records: Vec<Record>) {
        self.datasets.insert(key.into(), records);
    }

    /// Builder-style [`FetchedData::insert`]
    pub fn with(mut self, key: impl Into<String>, records: Vec<Record>) -> Self {
        self.insert(key, records);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.datasets.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&[Record]> {
        self.datasets.get(key).map(Vec::as_slice)
    }

    /// Records of a dataset that must have been fetched
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::MissingDataset`] if `key` was never fetched
    pub fn require(&self, key: &str) -> std::result::Result<&[Record], TransformError> {
        self.get(key)
            .ok_or_else(|| TransformError::MissingDataset(key.to_string()))
    }

    /// Records of an optional follow-up dataset; empty when it was skipped
    pub fn records_or_empty(&self, key: &str) -> &[Record] {
        self.get(key).unwrap_or(&[])
    }

    /// Keys fetched so far
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Total records across all datasets
    pub fn record_count(&self) -> usize {
        self.datasets.values().map(Vec::len).sum()
    }
}

/// Explicit mapping from report identifier to implementation
#[derive(Default, Clone)]
pub struct ReportRegistry {
    units: Vec<(ReportName, Arc<dyn ReportUnit>)>,
    groups: BTreeMap<GroupName, Vec<ReportName>>,
}

impl std::fmt::Debug for ReportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportRegistry")
            .field("units", &self.names().collect::<Vec<_>>())
            .field("groups", &self.groups)
            .finish()
    }
}

impl ReportRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in report and the standard groups
    pub fn standard() -> Self {
        let mut registry = Self::new();

        let monthly_units: Vec<Arc<dyn ReportUnit>> = vec![
            Arc::new(invoices::DailySales),
            Arc::new(invoices::MonthlyInvoices),
            Arc::new(invoices::MonthlyConsolidation),
            Arc::new(jarp::Jarp),
            Arc::new(kennametal_pos::KennametalPos),
        ];
        let inventory_units: Vec<Arc<dyn ReportUnit>> = vec![
            Arc::new(inventory::STOCK_STATUS),
            Arc::new(inventory::INVENTORY_VALUE),
            Arc::new(inventory::INACTIVE_ITEMS),
            Arc::new(dead_inventory::DeadInventory),
        ];
        let po_units: Vec<Arc<dyn ReportUnit>> = vec![
            Arc::new(open_po::OpenPurchaseOrders),
            Arc::new(grind_shop::GrindShopOpenOrders),
        ];

        for (group, units) in [
            ("monthly", monthly_units),
            ("inventory", inventory_units),
            ("po", po_units),
        ] {
            for unit in units {
                // Built-in names are static snake_case identifiers
                if let Err(e) = registry.register_in(group, unit) {
                    tracing::error!(error = %e, "Failed to register built-in report");
                }
            }
        }

        registry
    }

    /// Registers a unit without assigning it to a group
    ///
    /// # Errors
    ///
    /// Returns an error if the unit's name is invalid or already registered
    pub fn register(&mut self, unit: Arc<dyn ReportUnit>) -> std::result::Result<(), String> {
        let name = ReportName::new(unit.name())?;
        if self.units.iter().any(|(existing, _)| existing == &name) {
            return Err(format!("Report '{name}' is already registered"));
        }
        self.units.push((name, unit));
        Ok(())
    }

    /// Registers a unit and adds it to `group`
    ///
    /// # Errors
    ///
    /// Returns an error if the unit or group name is invalid, or the unit is
    /// already registered
    pub fn register_in(
        &mut self,
        group: &str,
        unit: Arc<dyn ReportUnit>,
    ) -> std::result::Result<(), String> {
        let group = GroupName::new(group)?;
        let name = ReportName::new(unit.name())?;
        self.register(unit)?;
        self.groups.entry(group).or_default().push(name);
        Ok(())
    }

    pub fn get(&self, name: &ReportName) -> Option<Arc<dyn ReportUnit>> {
        self.units
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, unit)| unit.clone())
    }

    /// Report names in registration order
    pub fn names(&self) -> impl Iterator<Item = &ReportName> {
        self.units.iter().map(|(name, _)| name)
    }

    /// Units in registration order
    pub fn units(&self) -> impl Iterator<Item = (&ReportName, &Arc<dyn ReportUnit>)> {
        self.units.iter().map(|(name, unit)| (name, unit))
    }

    /// Group names in alphabetical order
    pub fn groups(&self) -> impl Iterator<Item = (&GroupName, &[ReportName])> {
        self.groups
            .iter()
            .map(|(group, members)| (group, members.as_slice()))
    }

    pub fn group(&self, group: &str) -> Option<&[ReportName]> {
        self.groups
            .iter()
            .find(|(name, _)| name.as_str() == group)
            .map(|(_, members)| members.as_slice())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Expands groups and explicit names into an ordered, duplicate-free list
    ///
    /// Group members come first in group order, then explicit names.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Configuration`] for an unknown group or report
    pub fn resolve(&self, groups: &[String], names: &[String]) -> Result<Vec<ReportName>> {
        let mut resolved: Vec<ReportName> = Vec::new();

        for group in groups {
            let members = self.group(group.trim()).ok_or_else(|| {
                let known: Vec<&str> = self.groups.keys().map(GroupName::as_str).collect();
                ExportError::Configuration(format!(
                    "Unknown report group '{group}'. Known groups: {}",
                    known.join(", ")
                ))
            })?;
            for name in members {
                if !resolved.contains(name) {
                    resolved.push(name.clone());
                }
            }
        }

        for raw in names {
            let name = ReportName::new(raw.as_str()).map_err(ExportError::Configuration)?;
            if self.get(&name).is_none() {
                return Err(ExportError::Configuration(format!(
                    "Unknown report '{name}'"
                )));
            }
            if !resolved.contains(&name) {
                resolved.push(name);
            }
        }

        Ok(resolved)
    }
}
