use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, EntityTrait, QueryFilter, Set,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::sku_mapping::{self, Entity as SkuMappingEntity, SYNC_STATUS_ACTIVE};
use crate::entities::supplier::Entity as SupplierEntity;
use crate::errors::ServiceError;

/// A routing-visible mapping joined with its supplier, the unit the routing
/// engine ranks and selects from.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveMapping {
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub adapter_kind: String,
    pub supplier_sku: String,
    pub cost: Decimal,
    pub stock_quantity: i32,
}

/// Read/write access to the SKU translation table.
///
/// Pure lookup layer: no retry semantics, data-access failures propagate
/// unchanged and are fatal to the calling step. Note the contract split:
/// `find_active` applies the routing visibility rule, while the raw
/// `translate_*` lookups ignore availability entirely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SkuMappingStore: Send + Sync {
    /// All routing-visible mappings for an internal SKU
    /// (`is_available = true`, `sync_status = "active"`).
    async fn find_active(&self, internal_sku: &str) -> Result<Vec<ActiveMapping>, ServiceError>;

    /// Raw lookup, availability ignored.
    async fn translate_to_supplier(
        &self,
        internal_sku: &str,
        supplier_id: Uuid,
    ) -> Result<Option<String>, ServiceError>;

    /// Raw reverse lookup, availability ignored.
    async fn translate_from_supplier(
        &self,
        supplier_sku: &str,
        supplier_id: Uuid,
    ) -> Result<Option<String>, ServiceError>;

    /// Bulk forward translation; the result is partial and missing keys mean
    /// no mapping exists for that SKU at this supplier.
    async fn bulk_translate(
        &self,
        internal_skus: &[String],
        supplier_id: Uuid,
    ) -> Result<HashMap<String, String>, ServiceError>;

    /// Idempotent upsert keyed on `(internal_sku, supplier_id)`.
    async fn upsert_availability(
        &self,
        internal_sku: &str,
        supplier_id: Uuid,
        supplier_sku: &str,
        is_available: bool,
        stock_quantity: i32,
    ) -> Result<(), ServiceError>;

    /// Idempotent upsert keyed on `(internal_sku, supplier_id)`.
    async fn upsert_cost(
        &self,
        internal_sku: &str,
        supplier_id: Uuid,
        supplier_sku: &str,
        cost: Decimal,
    ) -> Result<(), ServiceError>;
}

/// sea-orm backed implementation over the `sku_mappings` table.
#[derive(Clone)]
pub struct SkuTranslationService {
    db_pool: Arc<DbPool>,
}

impl SkuTranslationService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SkuMappingStore for SkuTranslationService {
    #[instrument(skip(self))]
    async fn find_active(&self, internal_sku: &str) -> Result<Vec<ActiveMapping>, ServiceError> {
        let db = &*self.db_pool;

        let rows = SkuMappingEntity::find()
            .filter(sku_mapping::Column::InternalSku.eq(internal_sku))
            .filter(sku_mapping::Column::IsAvailable.eq(true))
            .filter(sku_mapping::Column::SyncStatus.eq(SYNC_STATUS_ACTIVE))
            .find_also_related(SupplierEntity)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, internal_sku, "Failed to load active SKU mappings");
                ServiceError::Database(e)
            })?;

        let mappings = rows
            .into_iter()
            .filter_map(|(mapping, supplier)| {
                supplier.map(|s| ActiveMapping {
                    supplier_id: mapping.supplier_id,
                    supplier_name: s.name,
                    adapter_kind: s.adapter_kind,
                    supplier_sku: mapping.supplier_sku,
                    cost: mapping.cost,
                    stock_quantity: mapping.stock_quantity,
                })
            })
            .collect();

        Ok(mappings)
    }

    #[instrument(skip(self))]
    async fn translate_to_supplier(
        &self,
        internal_sku: &str,
        supplier_id: Uuid,
    ) -> Result<Option<String>, ServiceError> {
        let db = &*self.db_pool;

        let mapping = SkuMappingEntity::find()
            .filter(sku_mapping::Column::InternalSku.eq(internal_sku))
            .filter(sku_mapping::Column::SupplierId.eq(supplier_id))
            .one(db)
            .await?;

        Ok(mapping.map(|m| m.supplier_sku))
    }

    #[instrument(skip(self))]
    async fn translate_from_supplier(
        &self,
        supplier_sku: &str,
        supplier_id: Uuid,
    ) -> Result<Option<String>, ServiceError> {
        let db = &*self.db_pool;

        let mapping = SkuMappingEntity::find()
            .filter(sku_mapping::Column::SupplierSku.eq(supplier_sku))
            .filter(sku_mapping::Column::SupplierId.eq(supplier_id))
            .one(db)
            .await?;

        Ok(mapping.map(|m| m.internal_sku))
    }

    #[instrument(skip(self, internal_skus), fields(count = internal_skus.len()))]
    async fn bulk_translate(
        &self,
        internal_skus: &[String],
        supplier_id: Uuid,
    ) -> Result<HashMap<String, String>, ServiceError> {
        if internal_skus.is_empty() {
            return Ok(HashMap::new());
        }

        let db = &*self.db_pool;

        let rows = SkuMappingEntity::find()
            .filter(sku_mapping::Column::InternalSku.is_in(internal_skus.to_vec()))
            .filter(sku_mapping::Column::SupplierId.eq(supplier_id))
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|m| (m.internal_sku, m.supplier_sku))
            .collect())
    }

    #[instrument(skip(self))]
    async fn upsert_availability(
        &self,
        internal_sku: &str,
        supplier_id: Uuid,
        supplier_sku: &str,
        is_available: bool,
        stock_quantity: i32,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let model = sku_mapping::ActiveModel {
            id: Set(Uuid::new_v4()),
            internal_sku: Set(internal_sku.to_string()),
            supplier_id: Set(supplier_id),
            supplier_sku: Set(supplier_sku.to_string()),
            cost: Set(Decimal::ZERO),
            is_available: Set(is_available),
            stock_quantity: Set(stock_quantity),
            sync_status: Set(SYNC_STATUS_ACTIVE.to_string()),
            last_synced_at: Set(Some(Utc::now())),
        };

        SkuMappingEntity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    sku_mapping::Column::InternalSku,
                    sku_mapping::Column::SupplierId,
                ])
                .update_columns([
                    sku_mapping::Column::IsAvailable,
                    sku_mapping::Column::StockQuantity,
                    sku_mapping::Column::LastSyncedAt,
                ])
                .to_owned(),
            )
            .exec(db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn upsert_cost(
        &self,
        internal_sku: &str,
        supplier_id: Uuid,
        supplier_sku: &str,
        cost: Decimal,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let model = sku_mapping::ActiveModel {
            id: Set(Uuid::new_v4()),
            internal_sku: Set(internal_sku.to_string()),
            supplier_id: Set(supplier_id),
            supplier_sku: Set(supplier_sku.to_string()),
            cost: Set(cost),
            is_available: Set(true),
            stock_quantity: Set(0),
            sync_status: Set(SYNC_STATUS_ACTIVE.to_string()),
            last_synced_at: Set(Some(Utc::now())),
        };

        SkuMappingEntity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    sku_mapping::Column::InternalSku,
                    sku_mapping::Column::SupplierId,
                ])
                .update_columns([
                    sku_mapping::Column::Cost,
                    sku_mapping::Column::LastSyncedAt,
                ])
                .to_owned(),
            )
            .exec(db)
            .await?;

        Ok(())
    }
}
