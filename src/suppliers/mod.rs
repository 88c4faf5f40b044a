/*!
 * Supplier adapter layer.
 *
 * One adapter per external fulfillment partner, all implementing the same
 * capability contract (catalog, inventory, order create/status/cancel) over a
 * shared resilient HTTP client. Adapters are selected at runtime through a
 * registry keyed on the supplier's adapter kind.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::ServiceError;

pub mod client;
pub mod printful;

/// Errors produced by supplier adapters.
///
/// The client/server split drives the retry policy: client-class rejections
/// are never retried, server-class and network failures are retried within
/// the wrapper's attempt budget.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Partner rejected request (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("Partner server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid outbound payload: {0}")]
    Validation(String),

    #[error("Failed to decode partner response: {0}")]
    Decode(String),
}

impl AdapterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Server { .. } | AdapterError::Network(_))
    }
}

/// Remote order status normalized across partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOrderStatus {
    Pending,
    Confirmed,
    InProduction,
    Shipped,
    Delivered,
    Cancelled,
}

/// Catalog entry as reported by a partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierProduct {
    pub supplier_sku: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub images: Vec<String>,
}

/// Lead time window in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTime {
    pub min_days: i32,
    pub max_days: i32,
}

/// Inventory snapshot for one supplier SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryStatus {
    pub supplier_sku: String,
    pub available: bool,
    pub quantity: i32,
    pub lead_time: LeadTime,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub zip: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplierOrderItem {
    pub supplier_sku: String,
    pub quantity: i32,
    pub artwork_urls: Vec<String>,
}

/// Outbound order payload in the partner-agnostic shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplierOrder {
    /// Idempotent order creation key passed through to the partner
    pub external_ref: String,
    pub items: Vec<NewSupplierOrderItem>,
    pub shipping_address: ShippingAddress,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrderItem {
    pub supplier_sku: String,
    pub quantity: i32,
}

/// Remote order as accepted by the partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrder {
    pub id: String,
    pub status: RemoteOrderStatus,
    pub items: Vec<SupplierOrderItem>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrderStatus {
    pub id: String,
    pub status: RemoteOrderStatus,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
}

/// Capability contract every partner adapter implements.
#[async_trait]
pub trait SupplierAdapter: Send + Sync {
    /// Adapter kind, matching `supplier.adapter_kind` and the config key.
    fn name(&self) -> &str;

    async fn get_product_catalog(&self) -> Result<Vec<SupplierProduct>, AdapterError>;

    async fn check_inventory(&self, supplier_sku: &str) -> Result<InventoryStatus, AdapterError>;

    async fn create_order(&self, order: &NewSupplierOrder) -> Result<SupplierOrder, AdapterError>;

    async fn get_order_status(&self, order_id: &str) -> Result<SupplierOrderStatus, AdapterError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), AdapterError>;
}

/// Registry of configured adapters, keyed by adapter kind.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SupplierAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from configuration; unknown adapter kinds are a
    /// configuration error rather than a silent skip.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let mut registry = Self::new();
        for (kind, supplier_config) in &config.suppliers {
            match kind.as_str() {
                printful::ADAPTER_KIND => {
                    let adapter = printful::PrintfulAdapter::from_config(supplier_config)?;
                    registry.register(Arc::new(adapter));
                }
                other => {
                    return Err(ServiceError::Config(format!(
                        "Unknown supplier adapter kind: {}",
                        other
                    )));
                }
            }
        }
        info!(adapters = registry.adapters.len(), "Supplier adapter registry built");
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn SupplierAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn SupplierAdapter>, ServiceError> {
        self.adapters
            .get(kind)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("No adapter registered for kind '{}'", kind)))
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

/// Fails fast when a required outbound field is missing, before any network
/// call is made (and therefore before any retry budget is consumed).
pub fn validate_new_order(order: &NewSupplierOrder) -> Result<(), AdapterError> {
    if order.items.is_empty() {
        return Err(AdapterError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    for item in &order.items {
        if item.supplier_sku.is_empty() {
            return Err(AdapterError::Validation(
                "item is missing a supplier SKU".to_string(),
            ));
        }
        if item.quantity <= 0 {
            return Err(AdapterError::Validation(format!(
                "item {} has non-positive quantity",
                item.supplier_sku
            )));
        }
    }
    let addr = &order.shipping_address;
    for (field, value) in [
        ("name", &addr.name),
        ("address1", &addr.address1),
        ("city", &addr.city),
        ("country", &addr.country),
        ("zip", &addr.zip),
    ] {
        if value.is_empty() {
            return Err(AdapterError::Validation(format!(
                "shipping address is missing required field '{}'",
                field
            )));
        }
    }
    Ok(())
}
