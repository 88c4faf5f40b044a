//! Shared in-memory fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use fulfillment_core::entities::order::{self, ProductionOrderRefs, ShippingAddressData};
use fulfillment_core::entities::order_item;
use fulfillment_core::entities::production_order::{
    self, ProductionItems, ProductionOrderStatus, QcChecks, StatusHistory, StatusHistoryEntry,
};
use fulfillment_core::errors::ServiceError;
use fulfillment_core::services::alerts::{Alert, AlertError, AlertService};
use fulfillment_core::services::orders::OrderStore;
use fulfillment_core::services::production_orders::{
    apply_transition, NewProductionOrder, ProductionOrderStore,
};
use fulfillment_core::services::sku_translation::{ActiveMapping, SkuMappingStore};
use fulfillment_core::suppliers::{
    AdapterError, InventoryStatus, LeadTime, NewSupplierOrder, RemoteOrderStatus, SupplierAdapter,
    SupplierOrder, SupplierOrderStatus, SupplierProduct,
};

pub fn shipping_address() -> ShippingAddressData {
    ShippingAddressData {
        name: "Jamie Doe".to_string(),
        address1: "1 Main St".to_string(),
        address2: None,
        city: "Portland".to_string(),
        state: Some("OR".to_string()),
        country: "US".to_string(),
        zip: "97201".to_string(),
        phone: None,
    }
}

pub fn make_order(order_id: Uuid) -> order::Model {
    let now = Utc::now();
    order::Model {
        id: order_id,
        order_number: format!("ORD-{}", &order_id.simple().to_string()[..8]),
        customer_id: Uuid::new_v4(),
        status: "pending_production".to_string(),
        production_status: None,
        production_started_at: None,
        production_order_refs: ProductionOrderRefs::default(),
        shipping_address: Some(shipping_address()),
        notes: None,
        created_at: now,
        updated_at: None,
        version: 1,
    }
}

pub fn make_item(order_id: Uuid, sku: &str, quantity: i32) -> order_item::Model {
    order_item::Model {
        id: Uuid::new_v4(),
        order_id,
        internal_sku: sku.to_string(),
        variant_id: Uuid::new_v4(),
        product_name: format!("Product {}", sku),
        quantity,
        unit_price: Decimal::new(1999, 2),
    }
}

/// SKU mapping store backed by a plain map: sku -> eligible mappings.
#[derive(Default)]
pub struct FakeSkuStore {
    pub mappings: HashMap<String, Vec<ActiveMapping>>,
}

impl FakeSkuStore {
    pub fn with_mapping(mut self, sku: &str, mapping: ActiveMapping) -> Self {
        self.mappings.entry(sku.to_string()).or_default().push(mapping);
        self
    }
}

#[async_trait]
impl SkuMappingStore for FakeSkuStore {
    async fn find_active(&self, internal_sku: &str) -> Result<Vec<ActiveMapping>, ServiceError> {
        Ok(self.mappings.get(internal_sku).cloned().unwrap_or_default())
    }

    async fn translate_to_supplier(
        &self,
        internal_sku: &str,
        supplier_id: Uuid,
    ) -> Result<Option<String>, ServiceError> {
        Ok(self
            .mappings
            .get(internal_sku)
            .and_then(|ms| ms.iter().find(|m| m.supplier_id == supplier_id))
            .map(|m| m.supplier_sku.clone()))
    }

    async fn translate_from_supplier(
        &self,
        supplier_sku: &str,
        supplier_id: Uuid,
    ) -> Result<Option<String>, ServiceError> {
        Ok(self.mappings.iter().find_map(|(sku, ms)| {
            ms.iter()
                .find(|m| m.supplier_id == supplier_id && m.supplier_sku == supplier_sku)
                .map(|_| sku.clone())
        }))
    }

    async fn bulk_translate(
        &self,
        internal_skus: &[String],
        supplier_id: Uuid,
    ) -> Result<HashMap<String, String>, ServiceError> {
        let mut out = HashMap::new();
        for sku in internal_skus {
            if let Some(supplier_sku) = self.translate_to_supplier(sku, supplier_id).await? {
                out.insert(sku.clone(), supplier_sku);
            }
        }
        Ok(out)
    }

    async fn upsert_availability(
        &self,
        _internal_sku: &str,
        _supplier_id: Uuid,
        _supplier_sku: &str,
        _is_available: bool,
        _stock_quantity: i32,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn upsert_cost(
        &self,
        _internal_sku: &str,
        _supplier_id: Uuid,
        _supplier_sku: &str,
        _cost: Decimal,
    ) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Order store holding a single order; records finalization calls.
#[derive(Default)]
pub struct FakeOrderStore {
    pub order: Mutex<Option<(order::Model, Vec<order_item::Model>)>>,
    pub finalized: Mutex<Vec<(Uuid, Vec<Uuid>, DateTime<Utc>)>>,
}

impl FakeOrderStore {
    pub fn with_order(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            order: Mutex::new(Some((order, items))),
            finalized: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OrderStore for FakeOrderStore {
    async fn load_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, ServiceError> {
        Ok(self
            .order
            .lock()
            .unwrap()
            .clone()
            .filter(|(order, _)| order.id == order_id))
    }

    async fn finalize_production(
        &self,
        order_id: Uuid,
        production_order_ids: Vec<Uuid>,
        started_at: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError> {
        let mut guard = self.order.lock().unwrap();
        let (order, _) = guard
            .as_mut()
            .filter(|(order, _)| order.id == order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        order.production_order_refs.0.extend(production_order_ids.clone());
        order.production_status = Some("in_production".to_string());
        order.production_started_at = Some(started_at);
        order.status = "awaiting_shipment".to_string();
        order.version += 1;
        let updated = order.clone();

        self.finalized
            .lock()
            .unwrap()
            .push((order_id, production_order_ids, started_at));
        Ok(updated)
    }
}

/// Production order ledger kept in a vec, using the real transition rules.
#[derive(Default)]
pub struct InMemoryLedger {
    pub rows: Mutex<Vec<production_order::Model>>,
}

impl InMemoryLedger {
    pub fn seed(&self, model: production_order::Model) {
        self.rows.lock().unwrap().push(model);
    }

    pub fn snapshot(&self) -> Vec<production_order::Model> {
        self.rows.lock().unwrap().clone()
    }
}

pub fn seeded_production_order(
    order: &order::Model,
    supplier_id: Uuid,
    status: ProductionOrderStatus,
    supplier_order_id: Option<&str>,
) -> production_order::Model {
    let now = Utc::now();
    production_order::Model {
        id: Uuid::new_v4(),
        order_id: order.id,
        order_number: order.order_number.clone(),
        supplier_id,
        supplier_name: format!("Supplier {}", supplier_id),
        items: ProductionItems::default(),
        estimated_cost: Decimal::ZERO,
        actual_cost: None,
        cost_variance: None,
        status,
        status_history: StatusHistory(vec![StatusHistoryEntry {
            status,
            actor: "system".to_string(),
            note: None,
            timestamp: now,
        }]),
        qc_checks: QcChecks::default(),
        supplier_order_id: supplier_order_id.map(str::to_string),
        ordered_at: now,
        expected_completion_date: None,
        actual_completion_date: None,
        created_at: now,
        updated_at: None,
    }
}

#[async_trait]
impl ProductionOrderStore for InMemoryLedger {
    async fn create(
        &self,
        new: NewProductionOrder,
    ) -> Result<production_order::Model, ServiceError> {
        let now = Utc::now();
        let model = production_order::Model {
            id: Uuid::new_v4(),
            order_id: new.order_id,
            order_number: new.order_number,
            supplier_id: new.supplier_id,
            supplier_name: new.supplier_name,
            items: ProductionItems(new.items),
            estimated_cost: new.estimated_cost,
            actual_cost: None,
            cost_variance: None,
            status: ProductionOrderStatus::Pending,
            status_history: StatusHistory(vec![StatusHistoryEntry {
                status: ProductionOrderStatus::Pending,
                actor: "system".to_string(),
                note: Some("Production order created".to_string()),
                timestamp: now,
            }]),
            qc_checks: QcChecks::default(),
            supplier_order_id: None,
            ordered_at: now,
            expected_completion_date: new.expected_completion_date,
            actual_completion_date: None,
            created_at: now,
            updated_at: None,
        };
        self.rows.lock().unwrap().push(model.clone());
        Ok(model)
    }

    async fn find_active_for(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<production_order::Model>, ServiceError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|po| {
                po.order_id == order_id
                    && po.supplier_id == supplier_id
                    && !matches!(
                        po.status,
                        ProductionOrderStatus::Failed | ProductionOrderStatus::Cancelled
                    )
            })
            .cloned())
    }

    async fn record_confirmation(
        &self,
        id: Uuid,
        supplier_order_id: &str,
        actor: &str,
    ) -> Result<production_order::Model, ServiceError> {
        let mut rows = self.rows.lock().unwrap();
        let po = rows
            .iter_mut()
            .find(|po| po.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Production order {} not found", id)))?;
        po.supplier_order_id = Some(supplier_order_id.to_string());
        apply_transition(
            po,
            ProductionOrderStatus::Confirmed,
            actor,
            Some(format!("Partner accepted order {}", supplier_order_id)),
            Utc::now(),
        )?;
        Ok(po.clone())
    }

    async fn record_dispatch_failure(
        &self,
        id: Uuid,
        note: &str,
    ) -> Result<production_order::Model, ServiceError> {
        let mut rows = self.rows.lock().unwrap();
        let po = rows
            .iter_mut()
            .find(|po| po.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Production order {} not found", id)))?;
        apply_transition(
            po,
            ProductionOrderStatus::Failed,
            "system",
            Some(note.to_string()),
            Utc::now(),
        )?;
        Ok(po.clone())
    }
}

/// Adapter that records every order-creation call and fails when the payload
/// contains a designated supplier SKU.
pub struct ScriptedAdapter {
    pub fail_on_sku: Option<String>,
    pub calls: Mutex<Vec<NewSupplierOrder>>,
}

impl ScriptedAdapter {
    pub fn succeeding() -> Self {
        Self {
            fail_on_sku: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(sku: &str) -> Self {
        Self {
            fail_on_sku: Some(sku.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SupplierAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "printful"
    }

    async fn get_product_catalog(&self) -> Result<Vec<SupplierProduct>, AdapterError> {
        Ok(Vec::new())
    }

    async fn check_inventory(&self, supplier_sku: &str) -> Result<InventoryStatus, AdapterError> {
        Ok(InventoryStatus {
            supplier_sku: supplier_sku.to_string(),
            available: true,
            quantity: 999,
            lead_time: LeadTime {
                min_days: 2,
                max_days: 7,
            },
            checked_at: Utc::now(),
        })
    }

    async fn create_order(&self, order: &NewSupplierOrder) -> Result<SupplierOrder, AdapterError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(order.clone());
        let call_number = calls.len();
        drop(calls);

        if let Some(fail_on) = &self.fail_on_sku {
            if order.items.iter().any(|i| &i.supplier_sku == fail_on) {
                return Err(AdapterError::Server {
                    status: 500,
                    message: "partner exploded".to_string(),
                });
            }
        }

        Ok(SupplierOrder {
            id: format!("REMOTE-{}", call_number),
            status: RemoteOrderStatus::Confirmed,
            items: Vec::new(),
            tracking_number: None,
            estimated_delivery: None,
        })
    }

    async fn get_order_status(&self, order_id: &str) -> Result<SupplierOrderStatus, AdapterError> {
        Ok(SupplierOrderStatus {
            id: order_id.to_string(),
            status: RemoteOrderStatus::Confirmed,
            tracking_number: None,
            tracking_url: None,
            estimated_delivery: None,
            actual_delivery: None,
        })
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Alert sink that records everything; optionally fails every delivery.
#[derive(Default)]
pub struct RecordingAlertService {
    pub alerts: Mutex<Vec<Alert>>,
    pub fail_delivery: bool,
}

impl RecordingAlertService {
    pub fn failing() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            fail_delivery: true,
        }
    }

    pub fn recorded(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertService for RecordingAlertService {
    async fn send_alert(&self, alert: Alert) -> Result<(), AlertError> {
        self.alerts.lock().unwrap().push(alert);
        if self.fail_delivery {
            return Err(AlertError::NotConfigured);
        }
        Ok(())
    }
}
