//! Printful adapter.
//!
//! Maps the partner-agnostic adapter contract onto the Printful API
//! (<https://developers.printful.com/docs/>). Supplier SKUs use the
//! `PRINTFUL-{variant_id}` scheme. Printful is print-on-demand, so inventory
//! is reported as effectively unlimited with a fixed lead-time window.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::client::ResilientClient;
use super::{
    validate_new_order, AdapterError, InventoryStatus, LeadTime, NewSupplierOrder,
    RemoteOrderStatus, SupplierAdapter, SupplierOrder, SupplierOrderItem, SupplierOrderStatus,
    SupplierProduct,
};
use crate::config::SupplierConfig;
use crate::errors::ServiceError;

pub const ADAPTER_KIND: &str = "printful";
const SKU_PREFIX: &str = "PRINTFUL-";

pub struct PrintfulAdapter {
    client: ResilientClient,
}

impl PrintfulAdapter {
    pub fn new(client: ResilientClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &SupplierConfig) -> Result<Self, ServiceError> {
        let client = ResilientClient::new(
            &config.base_url,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
            config.max_attempts,
        )
        .map_err(|e| ServiceError::Config(e.to_string()))?;
        Ok(Self::new(client))
    }

    fn variant_id(supplier_sku: &str) -> &str {
        supplier_sku.strip_prefix(SKU_PREFIX).unwrap_or(supplier_sku)
    }
}

/// Printful order statuses normalized into the standard shape. Unknown
/// statuses map to `pending` rather than failing the poll.
fn map_printful_status(status: &str) -> RemoteOrderStatus {
    match status {
        "draft" | "onhold" => RemoteOrderStatus::Pending,
        "pending" => RemoteOrderStatus::Confirmed,
        "inprocess" => RemoteOrderStatus::InProduction,
        "partial" => RemoteOrderStatus::Shipped,
        "fulfilled" => RemoteOrderStatus::Delivered,
        "failed" | "canceled" => RemoteOrderStatus::Cancelled,
        other => {
            warn!(status = other, "Unknown Printful order status, treating as pending");
            RemoteOrderStatus::Pending
        }
    }
}

#[derive(Debug, Deserialize)]
struct PrintfulEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct PrintfulProduct {
    id: i64,
    type_name: String,
    title: String,
    brand: Option<String>,
    model: Option<String>,
    image: String,
}

#[derive(Debug, Deserialize)]
struct PrintfulOrderItem {
    variant_id: i64,
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct PrintfulOrder {
    id: i64,
    status: String,
    created: i64,
    items: Vec<PrintfulOrderItem>,
}

#[derive(Debug, Deserialize)]
struct PrintfulShipment {
    tracking_number: Option<String>,
    tracking_url: Option<String>,
    ship_date: Option<String>,
    shipped_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PrintfulOrderDetail {
    id: i64,
    status: String,
    #[serde(default)]
    shipments: Vec<PrintfulShipment>,
}

#[async_trait]
impl SupplierAdapter for PrintfulAdapter {
    fn name(&self) -> &str {
        ADAPTER_KIND
    }

    #[instrument(skip(self))]
    async fn get_product_catalog(&self) -> Result<Vec<SupplierProduct>, AdapterError> {
        let envelope: PrintfulEnvelope<Vec<PrintfulProduct>> =
            self.client.get_json("/products").await?;

        let products = envelope
            .result
            .into_iter()
            .map(|p| SupplierProduct {
                supplier_sku: format!("{}{}", SKU_PREFIX, p.id),
                name: p.title,
                description: format!(
                    "{} {}",
                    p.brand.unwrap_or_default(),
                    p.model.unwrap_or_default()
                )
                .trim()
                .to_string(),
                category: p.type_name,
                images: vec![p.image],
            })
            .collect::<Vec<_>>();

        info!(count = products.len(), "Fetched Printful product catalog");
        Ok(products)
    }

    #[instrument(skip(self))]
    async fn check_inventory(&self, supplier_sku: &str) -> Result<InventoryStatus, AdapterError> {
        let product_id = Self::variant_id(supplier_sku);
        let path = format!("/store/products/{}", product_id);

        match self.client.get_json::<serde_json::Value>(&path).await {
            // Printful does not expose real-time stock; print-on-demand is
            // treated as available with the catalog lead-time window.
            Ok(_) => Ok(InventoryStatus {
                supplier_sku: supplier_sku.to_string(),
                available: true,
                quantity: 999,
                lead_time: LeadTime {
                    min_days: 2,
                    max_days: 7,
                },
                checked_at: Utc::now(),
            }),
            Err(AdapterError::Client { status: 404, .. }) => {
                warn!(supplier_sku, "Printful product not found, marking unavailable");
                Ok(InventoryStatus {
                    supplier_sku: supplier_sku.to_string(),
                    available: false,
                    quantity: 0,
                    lead_time: LeadTime {
                        min_days: 0,
                        max_days: 0,
                    },
                    checked_at: Utc::now(),
                })
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, order), fields(external_ref = %order.external_ref))]
    async fn create_order(&self, order: &NewSupplierOrder) -> Result<SupplierOrder, AdapterError> {
        validate_new_order(order)?;

        let addr = &order.shipping_address;
        let payload = json!({
            "external_id": order.external_ref,
            "recipient": {
                "name": addr.name,
                "address1": addr.address1,
                "address2": addr.address2.clone().unwrap_or_default(),
                "city": addr.city,
                "state_code": addr.state.clone().unwrap_or_default(),
                "country_code": addr.country,
                "zip": addr.zip,
                "phone": addr.phone.clone().unwrap_or_default(),
            },
            "items": order.items.iter().map(|item| {
                json!({
                    "variant_id": Self::variant_id(&item.supplier_sku),
                    "quantity": item.quantity,
                    "files": item.artwork_urls.iter().map(|u| json!({"url": u})).collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
        });

        let envelope: PrintfulEnvelope<PrintfulOrder> =
            self.client.post_json("/orders", payload).await?;
        let remote = envelope.result;

        info!(printful_order_id = remote.id, "Created Printful order");

        Ok(SupplierOrder {
            id: remote.id.to_string(),
            status: map_printful_status(&remote.status),
            items: remote
                .items
                .into_iter()
                .map(|item| SupplierOrderItem {
                    supplier_sku: format!("{}{}", SKU_PREFIX, item.variant_id),
                    quantity: item.quantity,
                })
                .collect(),
            tracking_number: None,
            estimated_delivery: epoch_to_datetime(Some(remote.created))
                .map(|created| created + chrono::Duration::days(7)),
        })
    }

    #[instrument(skip(self))]
    async fn get_order_status(&self, order_id: &str) -> Result<SupplierOrderStatus, AdapterError> {
        let path = format!("/orders/{}", order_id);
        let envelope: PrintfulEnvelope<PrintfulOrderDetail> = self.client.get_json(&path).await?;
        let detail = envelope.result;
        let shipment = detail.shipments.into_iter().next();

        Ok(SupplierOrderStatus {
            id: detail.id.to_string(),
            status: map_printful_status(&detail.status),
            tracking_number: shipment.as_ref().and_then(|s| s.tracking_number.clone()),
            tracking_url: shipment.as_ref().and_then(|s| s.tracking_url.clone()),
            estimated_delivery: shipment
                .as_ref()
                .and_then(|s| s.ship_date.as_deref())
                .and_then(parse_ship_date),
            actual_delivery: shipment.and_then(|s| epoch_to_datetime(s.shipped_at)),
        })
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: &str) -> Result<(), AdapterError> {
        let path = format!("/orders/{}", order_id);
        self.client.delete(&path).await?;
        info!(order_id, "Cancelled Printful order");
        Ok(())
    }
}

fn epoch_to_datetime(epoch: Option<i64>) -> Option<DateTime<Utc>> {
    epoch.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

fn parse_ship_date(date: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}
