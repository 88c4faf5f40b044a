use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "suppliers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// Registry key selecting the adapter implementation (e.g. "printful")
    pub adapter_kind: String,
    pub contact_email: Option<String>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sku_mapping::Entity")]
    SkuMapping,
    #[sea_orm(has_many = "super::production_order::Entity")]
    ProductionOrder,
}

impl Related<super::sku_mapping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SkuMapping.def()
    }
}

impl Related<super::production_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
