use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-supplier SKU translation row, unique on `(internal_sku, supplier_id)`.
///
/// A row is visible to routing only when `is_available` is true and
/// `sync_status` is "active"; any other combination is treated as "no route"
/// even though the raw translation still resolves.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sku_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub internal_sku: String,
    pub supplier_id: Uuid,
    pub supplier_sku: String,
    pub cost: Decimal,
    pub is_available: bool,
    pub stock_quantity: i32,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

pub const SYNC_STATUS_ACTIVE: &str = "active";

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
