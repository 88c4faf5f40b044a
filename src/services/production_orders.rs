//! Production order ledger.
//!
//! One record per `(order, supplier)` pair. Records are never deleted, only
//! status-terminated; status history is append-only. The transition rules
//! live in pure functions on the model so the dispatch path, the
//! production-floor operations, and the tests all share one state machine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::production_order::{
    self, qc_outcome_status, Entity as ProductionOrderEntity, ProductionItem, ProductionItems,
    ProductionOrderStatus, QcCheck, StatusHistoryEntry,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Input for creating a ledger row at routing time.
#[derive(Debug, Clone)]
pub struct NewProductionOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub items: Vec<ProductionItem>,
    pub estimated_cost: Decimal,
    pub expected_completion_date: Option<DateTime<Utc>>,
}

/// Input for a QC inspection.
#[derive(Debug, Clone)]
pub struct QcCheckInput {
    pub checked_by: String,
    pub passed: bool,
    pub photos: Vec<String>,
    pub notes: Option<String>,
    pub issues: Vec<String>,
}

/// Aggregate counts for a supplier's (or the whole system's) ledger.
#[derive(Debug, Clone, Default)]
pub struct ProductionStatistics {
    pub total: u64,
    pub by_status: HashMap<String, u64>,
    /// Completed orders finished on or before their expected date, over all
    /// completed orders with an expected date.
    pub on_time_rate: f64,
}

/// Applies a validated status transition to a model in memory, appending to
/// the status history.
pub fn apply_transition(
    model: &mut production_order::Model,
    new_status: ProductionOrderStatus,
    actor: &str,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if !model.status.can_transition_to(new_status) {
        return Err(ServiceError::InvalidTransition {
            from: model.status.to_string(),
            to: new_status.to_string(),
        });
    }
    model.status_history.0.push(StatusHistoryEntry {
        status: new_status,
        actor: actor.to_string(),
        note,
        timestamp: now,
    });
    model.status = new_status;
    model.updated_at = Some(now);
    Ok(())
}

/// Appends a QC record and applies the status its outcome dictates:
/// `passed = true` moves to `qc_check`, `passed = false` to `failed`.
pub fn apply_qc_check(
    model: &mut production_order::Model,
    input: QcCheckInput,
    now: DateTime<Utc>,
) -> Result<ProductionOrderStatus, ServiceError> {
    if model.status.is_terminal() {
        return Err(ServiceError::InvalidTransition {
            from: model.status.to_string(),
            to: qc_outcome_status(input.passed).to_string(),
        });
    }

    model.qc_checks.0.push(QcCheck {
        checked_by: input.checked_by.clone(),
        passed: input.passed,
        photos: input.photos,
        notes: input.notes.clone(),
        issues: input.issues,
        checked_at: now,
    });

    let outcome = qc_outcome_status(input.passed);
    let note = Some(format!(
        "QC {} by {}",
        if input.passed { "passed" } else { "failed" },
        input.checked_by
    ));
    // QC outcome drives the status directly; allow it from any non-terminal
    // state rather than funnelling through the forward graph.
    model.status_history.0.push(StatusHistoryEntry {
        status: outcome,
        actor: input.checked_by,
        note,
        timestamp: now,
    });
    model.status = outcome;
    model.updated_at = Some(now);
    Ok(outcome)
}

/// Sets the actual cost and recomputes the informational cost variance.
pub fn apply_actual_cost(model: &mut production_order::Model, actual_cost: Decimal) {
    model.actual_cost = Some(actual_cost);
    model.cost_variance = Some(actual_cost - model.estimated_cost);
}

/// Ledger operations the order processor depends on; kept narrow so job
/// tests can run against an in-memory implementation.
#[async_trait]
pub trait ProductionOrderStore: Send + Sync {
    /// Creates a row in `pending` with an initial history entry.
    async fn create(
        &self,
        new: NewProductionOrder,
    ) -> Result<production_order::Model, ServiceError>;

    /// The non-terminated row for `(order, supplier)` if one exists;
    /// the resume check a queue-level re-attempt relies on.
    async fn find_active_for(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<production_order::Model>, ServiceError>;

    /// Records partner acceptance: stores the remote order id and advances
    /// `pending -> confirmed`.
    async fn record_confirmation(
        &self,
        id: Uuid,
        supplier_order_id: &str,
        actor: &str,
    ) -> Result<production_order::Model, ServiceError>;

    /// Records a dispatch failure: advances to `failed` with the error note.
    async fn record_dispatch_failure(
        &self,
        id: Uuid,
        note: &str,
    ) -> Result<production_order::Model, ServiceError>;
}

/// sea-orm backed ledger service; also carries the production-floor
/// operations (status updates, QC, completion) beyond the store contract.
#[derive(Clone)]
pub struct ProductionOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ProductionOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn load(&self, id: Uuid) -> Result<production_order::Model, ServiceError> {
        ProductionOrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Production order {} not found", id)))
    }

    async fn persist(
        &self,
        model: production_order::Model,
    ) -> Result<production_order::Model, ServiceError> {
        let mut active: production_order::ActiveModel = model.clone().into();
        active.status = Set(model.status);
        active.status_history = Set(model.status_history.clone());
        active.qc_checks = Set(model.qc_checks.clone());
        active.supplier_order_id = Set(model.supplier_order_id.clone());
        active.actual_cost = Set(model.actual_cost);
        active.cost_variance = Set(model.cost_variance);
        active.actual_completion_date = Set(model.actual_completion_date);
        active.updated_at = Set(model.updated_at);
        Ok(active.update(&*self.db_pool).await?)
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send production order event");
            }
        }
    }

    /// Validated status transition with history append.
    #[instrument(skip(self), fields(production_order_id = %id))]
    pub async fn transition(
        &self,
        id: Uuid,
        new_status: ProductionOrderStatus,
        actor: &str,
        note: Option<String>,
    ) -> Result<production_order::Model, ServiceError> {
        let mut model = self.load(id).await?;
        let old_status = model.status;
        apply_transition(&mut model, new_status, actor, note, Utc::now())?;
        let updated = self.persist(model).await?;

        info!(
            production_order_id = %id,
            old_status = %old_status,
            new_status = %new_status,
            "Production order status updated"
        );
        self.emit(Event::ProductionOrderStatusChanged {
            production_order_id: id,
            old_status,
            new_status,
        })
        .await;

        Ok(updated)
    }

    /// Appends a QC record; the outcome deterministically drives the status.
    #[instrument(skip(self, input), fields(production_order_id = %id, passed = input.passed))]
    pub async fn add_qc_check(
        &self,
        id: Uuid,
        input: QcCheckInput,
    ) -> Result<production_order::Model, ServiceError> {
        let mut model = self.load(id).await?;
        let old_status = model.status;
        let passed = input.passed;
        let outcome = apply_qc_check(&mut model, input, Utc::now())?;
        let updated = self.persist(model).await?;

        info!(
            production_order_id = %id,
            passed,
            outcome = %outcome,
            "QC check recorded"
        );
        self.emit(Event::QcCheckRecorded {
            production_order_id: id,
            passed,
        })
        .await;
        self.emit(Event::ProductionOrderStatusChanged {
            production_order_id: id,
            old_status,
            new_status: outcome,
        })
        .await;

        Ok(updated)
    }

    /// Completes a production order that has passed QC, optionally recording
    /// the actual cost (variance is informational and gates nothing).
    #[instrument(skip(self), fields(production_order_id = %id))]
    pub async fn complete(
        &self,
        id: Uuid,
        actual_cost: Option<Decimal>,
        actor: &str,
    ) -> Result<production_order::Model, ServiceError> {
        let mut model = self.load(id).await?;

        if model.status != ProductionOrderStatus::QcCheck {
            return Err(ServiceError::InvalidTransition {
                from: model.status.to_string(),
                to: ProductionOrderStatus::Completed.to_string(),
            });
        }
        if !model.last_qc_check().map(|qc| qc.passed).unwrap_or(false) {
            return Err(ServiceError::ValidationError(
                "Production order must have a passing QC check before completion".to_string(),
            ));
        }

        if let Some(actual) = actual_cost {
            apply_actual_cost(&mut model, actual);
        }
        let now = Utc::now();
        apply_transition(
            &mut model,
            ProductionOrderStatus::Completed,
            actor,
            None,
            now,
        )?;
        model.actual_completion_date = Some(now);

        self.persist(model).await
    }

    /// Terminates a non-terminal production order.
    #[instrument(skip(self), fields(production_order_id = %id))]
    pub async fn cancel(
        &self,
        id: Uuid,
        actor: &str,
        note: Option<String>,
    ) -> Result<production_order::Model, ServiceError> {
        self.transition(id, ProductionOrderStatus::Cancelled, actor, note)
            .await
    }

    pub async fn find_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<production_order::Model>, ServiceError> {
        Ok(ProductionOrderEntity::find()
            .filter(production_order::Column::OrderId.eq(order_id))
            .order_by_asc(production_order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    pub async fn find_by_supplier(
        &self,
        supplier_id: Uuid,
        status: Option<ProductionOrderStatus>,
    ) -> Result<Vec<production_order::Model>, ServiceError> {
        let mut query = ProductionOrderEntity::find()
            .filter(production_order::Column::SupplierId.eq(supplier_id));
        if let Some(status) = status {
            query = query.filter(production_order::Column::Status.eq(status));
        }
        Ok(query
            .order_by_desc(production_order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    pub async fn find_by_status(
        &self,
        status: ProductionOrderStatus,
    ) -> Result<Vec<production_order::Model>, ServiceError> {
        Ok(ProductionOrderEntity::find()
            .filter(production_order::Column::Status.eq(status))
            .order_by_desc(production_order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    /// Pending or in-production orders past their expected completion date.
    pub async fn find_delayed(&self) -> Result<Vec<production_order::Model>, ServiceError> {
        Ok(ProductionOrderEntity::find()
            .filter(
                production_order::Column::Status.is_in([
                    ProductionOrderStatus::Pending,
                    ProductionOrderStatus::InProduction,
                ]),
            )
            .filter(production_order::Column::ExpectedCompletionDate.lt(Utc::now()))
            .order_by_asc(production_order::Column::ExpectedCompletionDate)
            .all(&*self.db_pool)
            .await?)
    }

    /// Count-by-status and on-time completion rate, optionally scoped to one
    /// supplier.
    pub async fn statistics(
        &self,
        supplier_id: Option<Uuid>,
    ) -> Result<ProductionStatistics, ServiceError> {
        let mut query = ProductionOrderEntity::find();
        if let Some(supplier_id) = supplier_id {
            query = query.filter(production_order::Column::SupplierId.eq(supplier_id));
        }
        let rows = query.all(&*self.db_pool).await?;

        let mut stats = ProductionStatistics {
            total: rows.len() as u64,
            ..Default::default()
        };
        let mut completed_with_expectation = 0u64;
        let mut on_time = 0u64;
        for row in &rows {
            *stats.by_status.entry(row.status.to_string()).or_insert(0) += 1;
            if row.status == ProductionOrderStatus::Completed {
                if let (Some(expected), Some(actual)) =
                    (row.expected_completion_date, row.actual_completion_date)
                {
                    completed_with_expectation += 1;
                    if actual <= expected {
                        on_time += 1;
                    }
                }
            }
        }
        stats.on_time_rate = if completed_with_expectation == 0 {
            0.0
        } else {
            on_time as f64 / completed_with_expectation as f64
        };
        Ok(stats)
    }
}

#[async_trait]
impl ProductionOrderStore for ProductionOrderService {
    #[instrument(skip(self, new), fields(order_id = %new.order_id, supplier_id = %new.supplier_id))]
    async fn create(
        &self,
        new: NewProductionOrder,
    ) -> Result<production_order::Model, ServiceError> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let model = production_order::ActiveModel {
            id: Set(id),
            order_id: Set(new.order_id),
            order_number: Set(new.order_number),
            supplier_id: Set(new.supplier_id),
            supplier_name: Set(new.supplier_name.clone()),
            items: Set(ProductionItems(new.items)),
            estimated_cost: Set(new.estimated_cost),
            actual_cost: Set(None),
            cost_variance: Set(None),
            status: Set(ProductionOrderStatus::Pending),
            status_history: Set(production_order::StatusHistory(vec![StatusHistoryEntry {
                status: ProductionOrderStatus::Pending,
                actor: super::SYSTEM_ACTOR.to_string(),
                note: Some("Production order created".to_string()),
                timestamp: now,
            }])),
            qc_checks: Set(production_order::QcChecks::default()),
            supplier_order_id: Set(None),
            ordered_at: Set(now),
            expected_completion_date: Set(new.expected_completion_date),
            actual_completion_date: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let inserted = model.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to create production order");
            ServiceError::Database(e)
        })?;

        info!(
            production_order_id = %id,
            supplier = %new.supplier_name,
            "Production order created"
        );
        self.emit(Event::ProductionOrderCreated {
            production_order_id: id,
            order_id: inserted.order_id,
            supplier_id: inserted.supplier_id,
        })
        .await;

        Ok(inserted)
    }

    async fn find_active_for(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<production_order::Model>, ServiceError> {
        Ok(ProductionOrderEntity::find()
            .filter(production_order::Column::OrderId.eq(order_id))
            .filter(production_order::Column::SupplierId.eq(supplier_id))
            .filter(
                production_order::Column::Status.is_not_in([
                    ProductionOrderStatus::Failed,
                    ProductionOrderStatus::Cancelled,
                ]),
            )
            .one(&*self.db_pool)
            .await?)
    }

    async fn record_confirmation(
        &self,
        id: Uuid,
        supplier_order_id: &str,
        actor: &str,
    ) -> Result<production_order::Model, ServiceError> {
        let mut model = self.load(id).await?;
        let old_status = model.status;
        model.supplier_order_id = Some(supplier_order_id.to_string());
        apply_transition(
            &mut model,
            ProductionOrderStatus::Confirmed,
            actor,
            Some(format!("Partner accepted order {}", supplier_order_id)),
            Utc::now(),
        )?;
        let updated = self.persist(model).await?;

        self.emit(Event::ProductionOrderStatusChanged {
            production_order_id: id,
            old_status,
            new_status: ProductionOrderStatus::Confirmed,
        })
        .await;
        Ok(updated)
    }

    async fn record_dispatch_failure(
        &self,
        id: Uuid,
        note: &str,
    ) -> Result<production_order::Model, ServiceError> {
        let mut model = self.load(id).await?;
        let old_status = model.status;
        apply_transition(
            &mut model,
            ProductionOrderStatus::Failed,
            super::SYSTEM_ACTOR,
            Some(note.to_string()),
            Utc::now(),
        )?;
        let updated = self.persist(model).await?;

        self.emit(Event::ProductionOrderStatusChanged {
            production_order_id: id,
            old_status,
            new_status: ProductionOrderStatus::Failed,
        })
        .await;
        Ok(updated)
    }
}
