//! Supplier routing engine.
//!
//! Partitions a flat list of order line items into per-supplier routes plus
//! an unroutable remainder. Stateless given its data-access dependency: it
//! reads the translation table and writes nothing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::sku_translation::{ActiveMapping, SkuMappingStore};

/// Supplier-agnostic input shape, flattened from the order's line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutableItem {
    pub internal_sku: String,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub product_name: String,
}

/// A line item resolved against one supplier's translation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedItem {
    pub internal_sku: String,
    pub supplier_sku: String,
    pub variant_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

/// All items routed to one supplier, with the accumulated estimated cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRoute {
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub adapter_kind: String,
    pub items: Vec<RoutedItem>,
    pub estimated_cost: Decimal,
}

/// Per-job routing result. Invariant: every input item appears in exactly
/// one of `routes[*].items` or `unroutable_items` — never both, never
/// dropped. Ephemeral; never persisted independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingPlan {
    pub routes: HashMap<Uuid, SupplierRoute>,
    pub unroutable_items: Vec<RoutableItem>,
}

impl RoutingPlan {
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.unroutable_items.is_empty()
    }

    pub fn routed_item_count(&self) -> usize {
        self.routes.values().map(|r| r.items.len()).sum()
    }
}

/// Tie-break policy applied when a SKU has more than one eligible supplier.
///
/// The upstream system resolved this by collection order, which is not a
/// business rule anyone chose. The policy here is explicit and total: the
/// supplier-id fallback makes the ranking deterministic for equal costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Cheapest unit cost wins; equal costs fall back to supplier id order.
    #[default]
    LowestCost,
}

/// Ranks eligible mappings under the given policy; the first entry wins.
pub fn rank_mappings(mut candidates: Vec<ActiveMapping>, tie_break: TieBreak) -> Vec<ActiveMapping> {
    match tie_break {
        TieBreak::LowestCost => {
            candidates.sort_by(|a, b| {
                a.cost
                    .cmp(&b.cost)
                    .then_with(|| a.supplier_id.cmp(&b.supplier_id))
            });
        }
    }
    candidates
}

pub struct RoutingEngine {
    store: Arc<dyn SkuMappingStore>,
    tie_break: TieBreak,
}

impl RoutingEngine {
    pub fn new(store: Arc<dyn SkuMappingStore>) -> Self {
        Self {
            store,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(store: Arc<dyn SkuMappingStore>, tie_break: TieBreak) -> Self {
        Self { store, tie_break }
    }

    /// Selects a supplier mapping for one item: routing-visible rows with
    /// sufficient stock, ranked by the tie-break policy.
    async fn select_mapping(
        &self,
        item: &RoutableItem,
    ) -> Result<Option<ActiveMapping>, ServiceError> {
        let candidates = self.store.find_active(&item.internal_sku).await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let eligible: Vec<ActiveMapping> = candidates
            .into_iter()
            .filter(|m| m.stock_quantity >= item.quantity)
            .collect();
        if eligible.is_empty() {
            warn!(
                internal_sku = %item.internal_sku,
                quantity = item.quantity,
                "No supplier has sufficient stock"
            );
            return Ok(None);
        }

        Ok(rank_mappings(eligible, self.tie_break).into_iter().next())
    }

    /// Produces the routing plan for an order's line items. Zero input items
    /// yield an empty plan; the caller treats that as a no-op success.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn route_order(&self, items: &[RoutableItem]) -> Result<RoutingPlan, ServiceError> {
        let mut plan = RoutingPlan::default();

        for item in items {
            let Some(mapping) = self.select_mapping(item).await? else {
                debug!(internal_sku = %item.internal_sku, "Item is unroutable");
                plan.unroutable_items.push(item.clone());
                continue;
            };

            let route = plan
                .routes
                .entry(mapping.supplier_id)
                .or_insert_with(|| SupplierRoute {
                    supplier_id: mapping.supplier_id,
                    supplier_name: mapping.supplier_name.clone(),
                    adapter_kind: mapping.adapter_kind.clone(),
                    items: Vec::new(),
                    estimated_cost: Decimal::ZERO,
                });

            route.estimated_cost += mapping.cost * Decimal::from(item.quantity);
            route.items.push(RoutedItem {
                internal_sku: item.internal_sku.clone(),
                supplier_sku: mapping.supplier_sku,
                variant_id: item.variant_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_cost: mapping.cost,
            });
        }

        info!(
            suppliers = plan.routes.len(),
            routed = plan.routed_item_count(),
            unroutable = plan.unroutable_items.len(),
            "Routing complete"
        );

        Ok(plan)
    }
}
