use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Production order lifecycle.
///
/// ```text
/// pending -> confirmed -> in_production -> qc_check -> completed
///                                 ^            |
///                                 +------------+   (re-production)
/// ```
/// `failed` is reachable from every non-terminal state, `cancelled` from any
/// non-terminal state. Terminal states: completed, failed, cancelled.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductionOrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "in_production")]
    InProduction,
    #[sea_orm(string_value = "qc_check")]
    QcCheck,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl ProductionOrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProductionOrderStatus::Completed
                | ProductionOrderStatus::Failed
                | ProductionOrderStatus::Cancelled
        )
    }

    /// Forward transitions allowed from this status, excluding `cancelled`
    /// which is reachable from any non-terminal state.
    pub fn allowed_transitions(&self) -> &'static [ProductionOrderStatus] {
        use ProductionOrderStatus::*;
        match self {
            Pending => &[Confirmed, Failed],
            Confirmed => &[InProduction, Failed],
            InProduction => &[QcCheck, Failed],
            QcCheck => &[Completed, InProduction, Failed],
            Completed | Failed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: ProductionOrderStatus) -> bool {
        if next == ProductionOrderStatus::Cancelled {
            return !self.is_terminal();
        }
        self.allowed_transitions().contains(&next)
    }
}

/// Status deterministically produced by a QC outcome.
pub fn qc_outcome_status(passed: bool) -> ProductionOrderStatus {
    if passed {
        ProductionOrderStatus::QcCheck
    } else {
        ProductionOrderStatus::Failed
    }
}

/// One supplier-resolved line item of a production order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionItem {
    pub internal_sku: String,
    pub supplier_sku: String,
    pub variant_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ProductionItems(pub Vec<ProductionItem>);

/// Append-only status history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: ProductionOrderStatus,
    pub actor: String,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StatusHistory(pub Vec<StatusHistoryEntry>);

/// Quality-control inspection record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QcCheck {
    pub checked_by: String,
    pub passed: bool,
    pub photos: Vec<String>,
    pub notes: Option<String>,
    pub issues: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct QcChecks(pub Vec<QcCheck>);

/// One production order per `(order, supplier)` pair. Never deleted; only
/// status-terminated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub items: ProductionItems,
    pub estimated_cost: Decimal,
    pub actual_cost: Option<Decimal>,
    pub cost_variance: Option<Decimal>,
    pub status: ProductionOrderStatus,
    #[sea_orm(column_type = "JsonBinary")]
    pub status_history: StatusHistory,
    #[sea_orm(column_type = "JsonBinary")]
    pub qc_checks: QcChecks,
    /// Remote partner order id, set once the partner accepts the order
    pub supplier_order_id: Option<String>,
    pub ordered_at: DateTime<Utc>,
    pub expected_completion_date: Option<DateTime<Utc>>,
    pub actual_completion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Derived predicate, never stored: pending or in-production past its
    /// expected completion date.
    pub fn is_delayed(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            ProductionOrderStatus::Pending | ProductionOrderStatus::InProduction
        ) && self
            .expected_completion_date
            .map(|expected| expected < now)
            .unwrap_or(false)
    }

    /// Most recent QC record, if any.
    pub fn last_qc_check(&self) -> Option<&QcCheck> {
        self.qc_checks.0.last()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
