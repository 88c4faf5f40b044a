/*!
 * Order processor job.
 *
 * Top-level unit of work for a single paid order: load, extract, route,
 * guard, per-supplier dispatch, finalize. Per-supplier dispatch is
 * sequential on purpose — a failure at supplier N prevents production
 * orders for suppliers N+1..k from being created, so the dispatched set is
 * always a deterministic prefix of the routing plan.
 */

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::OrderJob;
use crate::entities::order::{self, ShippingAddressData};
use crate::entities::order_item;
use crate::entities::production_order::ProductionItem;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::alerts::{send_best_effort, Alert, AlertService};
use crate::services::orders::{OrderStore, ORDER_STATUS_AWAITING_SHIPMENT};
use crate::services::production_orders::{NewProductionOrder, ProductionOrderStore};
use crate::services::supplier_routing::{RoutableItem, RoutingEngine, SupplierRoute};
use crate::services::SYSTEM_ACTOR;
use crate::suppliers::{
    AdapterRegistry, NewSupplierOrder, NewSupplierOrderItem, ShippingAddress,
};

pub struct OrderProcessor {
    orders: Arc<dyn OrderStore>,
    routing: RoutingEngine,
    ledger: Arc<dyn ProductionOrderStore>,
    adapters: AdapterRegistry,
    alerts: Arc<dyn AlertService>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderProcessor {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        routing: RoutingEngine,
        ledger: Arc<dyn ProductionOrderStore>,
        adapters: AdapterRegistry,
        alerts: Arc<dyn AlertService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            orders,
            routing,
            ledger,
            adapters,
            alerts,
            event_sender,
        }
    }

    /// Processes one job, escalating a failure to the alerting collaborator
    /// before handing the error back to the queue.
    #[instrument(skip(self), fields(order_id = %job.order_id, order_number = %job.order_number))]
    pub async fn run(&self, job: &OrderJob) -> Result<(), ServiceError> {
        match self.process(job).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // the unroutable guard already raised its own alert
                if !matches!(e, ServiceError::UnroutableItems { .. }) {
                    send_best_effort(
                        self.alerts.as_ref(),
                        Alert::ProcessingFailed {
                            order_id: job.order_id,
                            error: e.to_string(),
                        },
                    )
                    .await;
                }
                Err(e)
            }
        }
    }

    async fn process(&self, job: &OrderJob) -> Result<(), ServiceError> {
        // Load
        let (order, items) = self
            .orders
            .load_with_items(job.order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", job.order_id)))?;

        self.emit(Event::OrderProcessingStarted(order.id)).await;

        // Extract
        let routable = extract_routable_items(&items);

        // Route
        let plan = self.routing.route_order(&routable).await?;

        // Guard: never proceed with a partial order
        if !plan.unroutable_items.is_empty() {
            warn!(
                order_id = %order.id,
                unroutable = plan.unroutable_items.len(),
                "Order has unroutable items, escalating"
            );
            send_best_effort(
                self.alerts.as_ref(),
                Alert::UnroutableItems {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    items: plan.unroutable_items.clone(),
                },
            )
            .await;
            return Err(ServiceError::UnroutableItems {
                order_id: order.id,
                count: plan.unroutable_items.len(),
            });
        }

        // Nothing to produce: a no-op success, not an error
        if plan.routes.is_empty() {
            info!(order_id = %order.id, "Order has no line items to route, nothing to do");
            return Ok(());
        }

        let shipping = shipping_address(&order)?;

        // Per-supplier dispatch, sequential by design: an error aborts the
        // remaining routes. Routes are ordered by supplier id so the
        // dispatched prefix is the same on every attempt.
        let mut routes: Vec<&SupplierRoute> = plan.routes.values().collect();
        routes.sort_by_key(|r| r.supplier_id);

        let mut created: Vec<Uuid> = Vec::with_capacity(routes.len());
        for route in routes {
            let production_order_id = self.dispatch_route(&order, route, &shipping).await?;
            created.push(production_order_id);
        }

        // Finalize: only reached when every route dispatched successfully
        let old_status = order.status.clone();
        self.orders
            .finalize_production(order.id, created.clone(), Utc::now())
            .await?;

        info!(
            order_id = %order.id,
            production_orders = created.len(),
            "Order dispatched to all suppliers"
        );
        self.emit(Event::OrderStatusChanged {
            order_id: order.id,
            old_status,
            new_status: ORDER_STATUS_AWAITING_SHIPMENT.to_string(),
        })
        .await;

        Ok(())
    }

    /// Dispatches one supplier route: upsert-by-natural-key on the ledger,
    /// then remote order creation through the supplier's adapter.
    async fn dispatch_route(
        &self,
        order: &order::Model,
        route: &SupplierRoute,
        shipping: &ShippingAddress,
    ) -> Result<Uuid, ServiceError> {
        // Resume check: a prior attempt may have already dispatched this
        // supplier; recreating the row would duplicate the partner order.
        let production_order = match self
            .ledger
            .find_active_for(order.id, route.supplier_id)
            .await?
        {
            Some(existing) => {
                if existing.supplier_order_id.is_some() {
                    info!(
                        order_id = %order.id,
                        supplier_id = %route.supplier_id,
                        production_order_id = %existing.id,
                        "Supplier already dispatched in a prior attempt, resuming"
                    );
                    return Ok(existing.id);
                }
                existing
            }
            None => {
                self.ledger
                    .create(NewProductionOrder {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                        supplier_id: route.supplier_id,
                        supplier_name: route.supplier_name.clone(),
                        items: production_items(route),
                        estimated_cost: route.estimated_cost,
                        expected_completion_date: None,
                    })
                    .await?
            }
        };

        let adapter = self.adapters.get(&route.adapter_kind)?;

        let new_order = NewSupplierOrder {
            // idempotent creation key, stable per (order, supplier)
            external_ref: format!("{}-{}", order.order_number, route.supplier_id),
            items: route
                .items
                .iter()
                .map(|item| NewSupplierOrderItem {
                    supplier_sku: item.supplier_sku.clone(),
                    quantity: item.quantity,
                    artwork_urls: Vec::new(),
                })
                .collect(),
            shipping_address: shipping.clone(),
            deadline: None,
        };

        match adapter.create_order(&new_order).await {
            Ok(remote) => {
                self.ledger
                    .record_confirmation(production_order.id, &remote.id, SYSTEM_ACTOR)
                    .await?;
                info!(
                    production_order_id = %production_order.id,
                    supplier_order_id = %remote.id,
                    supplier = %route.supplier_name,
                    "Supplier accepted production order"
                );
                Ok(production_order.id)
            }
            Err(e) => {
                warn!(
                    production_order_id = %production_order.id,
                    supplier = %route.supplier_name,
                    error = %e,
                    "Supplier order creation failed"
                );
                self.ledger
                    .record_dispatch_failure(production_order.id, &e.to_string())
                    .await?;
                Err(e.into())
            }
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send order processing event");
            }
        }
    }
}

/// Flattens the order's line items into the routing engine's input shape.
pub fn extract_routable_items(items: &[order_item::Model]) -> Vec<RoutableItem> {
    items
        .iter()
        .map(|item| RoutableItem {
            internal_sku: item.internal_sku.clone(),
            variant_id: item.variant_id,
            quantity: item.quantity,
            product_name: item.product_name.clone(),
        })
        .collect()
}

fn production_items(route: &SupplierRoute) -> Vec<ProductionItem> {
    route
        .items
        .iter()
        .map(|item| ProductionItem {
            internal_sku: item.internal_sku.clone(),
            supplier_sku: item.supplier_sku.clone(),
            variant_id: item.variant_id,
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_cost: item.unit_cost,
            total_cost: item.unit_cost * Decimal::from(item.quantity),
        })
        .collect()
}

fn shipping_address(order: &order::Model) -> Result<ShippingAddress, ServiceError> {
    let data: &ShippingAddressData = order.shipping_address.as_ref().ok_or_else(|| {
        ServiceError::ValidationError(format!("Order {} has no shipping address", order.id))
    })?;
    Ok(ShippingAddress {
        name: data.name.clone(),
        address1: data.address1.clone(),
        address2: data.address2.clone(),
        city: data.city.clone(),
        state: data.state.clone(),
        country: data.country.clone(),
        zip: data.zip.clone(),
        phone: data.phone.clone(),
    })
}
