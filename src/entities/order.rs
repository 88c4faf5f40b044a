use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Uuid list stored as a JSON column; holds the production order references
/// the orchestrator appends after a successful dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ProductionOrderRefs(pub Vec<Uuid>);

/// Structured shipping address stored as a JSON column; forwarded to the
/// supplier adapter on dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ShippingAddressData {
    pub name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub zip: String,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    pub customer_id: Uuid,
    pub status: String,
    pub production_status: Option<String>,
    pub production_started_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "JsonBinary")]
    pub production_order_refs: ProductionOrderRefs,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub shipping_address: Option<ShippingAddressData>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::production_order::Entity")]
    ProductionOrder,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::production_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipping_address_round_trips_through_json() {
        let address = ShippingAddressData {
            name: "Jamie Doe".to_string(),
            address1: "1 Main St".to_string(),
            address2: None,
            city: "Portland".to_string(),
            state: Some("OR".to_string()),
            country: "US".to_string(),
            zip: "97201".to_string(),
            phone: None,
        };

        let value = serde_json::to_value(&address).unwrap();
        let back: ShippingAddressData = serde_json::from_value(value).unwrap();
        assert_eq!(back, address);
    }

    #[test]
    fn production_order_refs_serialize_as_a_json_array() {
        let refs = ProductionOrderRefs(vec![Uuid::new_v4(), Uuid::new_v4()]);
        let value = serde_json::to_value(&refs).unwrap();
        assert!(value.is_array());
        let back: ProductionOrderRefs = serde_json::from_value(value).unwrap();
        assert_eq!(back, refs);
    }
}
