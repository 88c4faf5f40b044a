//! Order access for the orchestrator.
//!
//! The order record is owned elsewhere; this subsystem reads it and performs
//! exactly two writes: appending production order references and advancing
//! the production/top-level status after a fully successful dispatch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::order::{self, Entity as OrderEntity, ProductionOrderRefs};
use crate::entities::order_item::{self, Entity as OrderItemEntity};
use crate::errors::ServiceError;

/// Top-level order status once every supplier dispatch has succeeded.
pub const ORDER_STATUS_AWAITING_SHIPMENT: &str = "awaiting_shipment";
/// Aggregate production status stamped at finalization.
pub const PRODUCTION_STATUS_IN_PRODUCTION: &str = "in_production";

/// The two order touch-points the processor needs.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads the order and its line items; `None` when the order is missing.
    async fn load_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, ServiceError>;

    /// Attaches production order references and advances the order to
    /// in-production / awaiting-shipment. Only reached when every route
    /// dispatched successfully.
    async fn finalize_production(
        &self,
        order_id: Uuid,
        production_order_ids: Vec<Uuid>,
        started_at: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError>;
}

#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderStore for OrderService {
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn load_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, ServiceError> {
        let db = &*self.db_pool;

        let Some(order) = OrderEntity::find_by_id(order_id).one(db).await? else {
            return Ok(None);
        };

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        Ok(Some((order, items)))
    }

    #[instrument(skip(self, production_order_ids), fields(order_id = %order_id, refs = production_order_ids.len()))]
    async fn finalize_production(
        &self,
        order_id: Uuid,
        production_order_ids: Vec<Uuid>,
        started_at: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start finalization transaction");
            ServiceError::Database(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order disappeared before finalization");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        let mut refs = order.production_order_refs.0.clone();
        for id in production_order_ids {
            if !refs.contains(&id) {
                refs.push(id);
            }
        }

        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.production_order_refs = Set(ProductionOrderRefs(refs));
        active.production_status = Set(Some(PRODUCTION_STATUS_IN_PRODUCTION.to_string()));
        active.production_started_at = Set(Some(started_at));
        active.status = Set(ORDER_STATUS_AWAITING_SHIPMENT.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit finalization transaction");
            ServiceError::Database(e)
        })?;

        info!(order_id = %order_id, "Order finalized into production");
        Ok(updated)
    }
}
