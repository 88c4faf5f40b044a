//! End-to-end order processing against in-memory collaborators.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;
use uuid::Uuid;

use fulfillment_core::entities::production_order::ProductionOrderStatus;
use fulfillment_core::errors::ServiceError;
use fulfillment_core::jobs::order_processor::OrderProcessor;
use fulfillment_core::jobs::queue::{InMemoryJobQueue, JobQueue, QueuedJob, WorkerPool};
use fulfillment_core::jobs::OrderJob;
use fulfillment_core::services::alerts::Alert;
use fulfillment_core::services::sku_translation::ActiveMapping;
use fulfillment_core::services::supplier_routing::RoutingEngine;
use fulfillment_core::suppliers::AdapterRegistry;

use common::{
    make_item, make_order, seeded_production_order, FakeOrderStore, FakeSkuStore, InMemoryLedger,
    RecordingAlertService, ScriptedAdapter,
};

struct Harness {
    processor: OrderProcessor,
    orders: Arc<FakeOrderStore>,
    ledger: Arc<InMemoryLedger>,
    alerts: Arc<RecordingAlertService>,
    adapter: Arc<ScriptedAdapter>,
}

fn harness(
    orders: FakeOrderStore,
    sku_store: FakeSkuStore,
    adapter: ScriptedAdapter,
    alerts: RecordingAlertService,
) -> Harness {
    let orders = Arc::new(orders);
    let ledger = Arc::new(InMemoryLedger::default());
    let alerts = Arc::new(alerts);
    let adapter = Arc::new(adapter);

    let mut registry = AdapterRegistry::new();
    registry.register(adapter.clone());

    let processor = OrderProcessor::new(
        orders.clone(),
        RoutingEngine::new(Arc::new(sku_store)),
        ledger.clone(),
        registry,
        alerts.clone(),
        None,
    );

    Harness {
        processor,
        orders,
        ledger,
        alerts,
        adapter,
    }
}

fn mapping(supplier_id: Uuid, supplier_sku: &str, cost: Decimal) -> ActiveMapping {
    ActiveMapping {
        supplier_id,
        supplier_name: format!("Supplier {}", supplier_id),
        adapter_kind: "printful".to_string(),
        supplier_sku: supplier_sku.to_string(),
        cost,
        stock_quantity: 1000,
    }
}

fn job_for(order: &fulfillment_core::entities::order::Model) -> OrderJob {
    OrderJob {
        order_id: order.id,
        order_number: order.order_number.clone(),
    }
}

#[tokio::test]
async fn successful_run_dispatches_every_supplier_and_finalizes() {
    let order_id = Uuid::new_v4();
    let order = make_order(order_id);
    let s1 = Uuid::from_u128(1);
    let s2 = Uuid::from_u128(2);

    let items = vec![
        make_item(order_id, "TEE-RED-M", 2),
        make_item(order_id, "MUG-WHITE", 1),
    ];
    let sku_store = FakeSkuStore::default()
        .with_mapping("TEE-RED-M", mapping(s1, "SUP-TEE", dec!(5.00)))
        .with_mapping("MUG-WHITE", mapping(s2, "SUP-MUG", dec!(3.00)));

    let h = harness(
        FakeOrderStore::with_order(order.clone(), items),
        sku_store,
        ScriptedAdapter::succeeding(),
        RecordingAlertService::default(),
    );

    h.processor.run(&job_for(&order)).await.unwrap();

    let rows = h.ledger.snapshot();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.status, ProductionOrderStatus::Confirmed);
        assert!(row.supplier_order_id.is_some());
    }

    // partner calls carry the stable per-supplier creation key
    let calls = h.adapter.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].external_ref, format!("{}-{}", order.order_number, s1));
    assert_eq!(calls[1].external_ref, format!("{}-{}", order.order_number, s2));
    drop(calls);

    let finalized = h.orders.finalized.lock().unwrap();
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0].1.len(), 2);
    drop(finalized);

    assert!(h.alerts.recorded().is_empty());
}

#[tokio::test]
async fn dispatch_aborts_at_first_failing_supplier() {
    let order_id = Uuid::new_v4();
    let order = make_order(order_id);
    let s1 = Uuid::from_u128(1);
    let s2 = Uuid::from_u128(2);
    let s3 = Uuid::from_u128(3);

    let items = vec![
        make_item(order_id, "TEE-RED-M", 1),
        make_item(order_id, "MUG-WHITE", 1),
        make_item(order_id, "CAP-BLACK", 1),
    ];
    let sku_store = FakeSkuStore::default()
        .with_mapping("TEE-RED-M", mapping(s1, "SUP-TEE", dec!(5.00)))
        .with_mapping("MUG-WHITE", mapping(s2, "SUP-MUG", dec!(3.00)))
        .with_mapping("CAP-BLACK", mapping(s3, "SUP-CAP", dec!(4.00)));

    let h = harness(
        FakeOrderStore::with_order(order.clone(), items),
        sku_store,
        ScriptedAdapter::failing_on("SUP-MUG"),
        RecordingAlertService::default(),
    );

    let err = h.processor.run(&job_for(&order)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Adapter(_)));
    assert!(err.is_retryable());

    // the dispatched set is a prefix: supplier 3 never gets a ledger row
    let rows = h.ledger.snapshot();
    assert_eq!(rows.len(), 2);
    let first = rows.iter().find(|r| r.supplier_id == s1).unwrap();
    assert_eq!(first.status, ProductionOrderStatus::Confirmed);
    assert!(first.supplier_order_id.is_some());
    let second = rows.iter().find(|r| r.supplier_id == s2).unwrap();
    assert_eq!(second.status, ProductionOrderStatus::Failed);
    assert!(second.supplier_order_id.is_none());
    assert!(rows.iter().all(|r| r.supplier_id != s3));

    assert_eq!(h.adapter.call_count(), 2);
    assert!(h.orders.finalized.lock().unwrap().is_empty());

    let alerts = h.alerts.recorded();
    assert_eq!(alerts.len(), 1);
    assert!(matches!(alerts[0], Alert::ProcessingFailed { .. }));
}

#[tokio::test]
async fn second_attempt_resumes_instead_of_redispatching() {
    let order_id = Uuid::new_v4();
    let order = make_order(order_id);
    let s1 = Uuid::from_u128(1);
    let s2 = Uuid::from_u128(2);

    let items = vec![
        make_item(order_id, "TEE-RED-M", 1),
        make_item(order_id, "MUG-WHITE", 1),
    ];
    let sku_store = FakeSkuStore::default()
        .with_mapping("TEE-RED-M", mapping(s1, "SUP-TEE", dec!(5.00)))
        .with_mapping("MUG-WHITE", mapping(s2, "SUP-MUG", dec!(3.00)));

    let h = harness(
        FakeOrderStore::with_order(order.clone(), items),
        sku_store,
        ScriptedAdapter::succeeding(),
        RecordingAlertService::default(),
    );

    // a prior attempt confirmed supplier 1 and failed at supplier 2
    let dispatched = seeded_production_order(
        &order,
        s1,
        ProductionOrderStatus::Confirmed,
        Some("REMOTE-OLD"),
    );
    let dispatched_id = dispatched.id;
    h.ledger.seed(dispatched);
    h.ledger.seed(seeded_production_order(
        &order,
        s2,
        ProductionOrderStatus::Failed,
        None,
    ));

    h.processor.run(&job_for(&order)).await.unwrap();

    // supplier 1 is untouched; only supplier 2 hits the partner again
    assert_eq!(h.adapter.call_count(), 1);
    let calls = h.adapter.calls.lock().unwrap();
    assert_eq!(calls[0].items[0].supplier_sku, "SUP-MUG");
    drop(calls);

    // failed row is left behind; the retry creates a fresh one for supplier 2
    let rows = h.ledger.snapshot();
    assert_eq!(rows.len(), 3);
    let fresh = rows
        .iter()
        .find(|r| r.supplier_id == s2 && r.status == ProductionOrderStatus::Confirmed)
        .unwrap();

    let finalized = h.orders.finalized.lock().unwrap();
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0].1, vec![dispatched_id, fresh.id]);
}

#[tokio::test]
async fn unroutable_item_alerts_and_fails_the_whole_order() {
    let order_id = Uuid::new_v4();
    let order = make_order(order_id);
    let s1 = Uuid::from_u128(1);

    let items = vec![
        make_item(order_id, "TEE-RED-M", 1),
        make_item(order_id, "UNKNOWN-SKU", 1),
    ];
    let sku_store =
        FakeSkuStore::default().with_mapping("TEE-RED-M", mapping(s1, "SUP-TEE", dec!(5.00)));

    let h = harness(
        FakeOrderStore::with_order(order.clone(), items),
        sku_store,
        ScriptedAdapter::succeeding(),
        RecordingAlertService::default(),
    );

    let err = h.processor.run(&job_for(&order)).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::UnroutableItems { count: 1, .. }
    ));
    assert!(!err.is_retryable());

    // no partial dispatch and exactly one escalation
    assert_eq!(h.adapter.call_count(), 0);
    assert!(h.ledger.snapshot().is_empty());
    let alerts = h.alerts.recorded();
    assert_eq!(alerts.len(), 1);
    match &alerts[0] {
        Alert::UnroutableItems {
            order_number,
            items,
            ..
        } => {
            assert_eq!(order_number, &order.order_number);
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].internal_sku, "UNKNOWN-SKU");
        }
        other => panic!("unexpected alert: {:?}", other),
    }
}

#[tokio::test]
async fn order_with_no_items_is_a_noop_success() {
    let order_id = Uuid::new_v4();
    let order = make_order(order_id);

    let h = harness(
        FakeOrderStore::with_order(order.clone(), Vec::new()),
        FakeSkuStore::default(),
        ScriptedAdapter::succeeding(),
        RecordingAlertService::default(),
    );

    h.processor.run(&job_for(&order)).await.unwrap();

    assert_eq!(h.adapter.call_count(), 0);
    assert!(h.ledger.snapshot().is_empty());
    assert!(h.orders.finalized.lock().unwrap().is_empty());
    assert!(h.alerts.recorded().is_empty());
}

#[tokio::test]
async fn missing_order_is_not_found_and_alerts() {
    let order_id = Uuid::new_v4();
    let h = harness(
        FakeOrderStore::default(),
        FakeSkuStore::default(),
        ScriptedAdapter::succeeding(),
        RecordingAlertService::default(),
    );

    let job = OrderJob {
        order_id,
        order_number: "ORD-MISSING".to_string(),
    };
    let err = h.processor.run(&job).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let alerts = h.alerts.recorded();
    assert_eq!(alerts.len(), 1);
    assert!(matches!(alerts[0], Alert::ProcessingFailed { .. }));
}

#[tokio::test]
async fn missing_shipping_address_fails_before_any_dispatch() {
    let order_id = Uuid::new_v4();
    let mut order = make_order(order_id);
    order.shipping_address = None;
    let s1 = Uuid::from_u128(1);

    let items = vec![make_item(order_id, "TEE-RED-M", 1)];
    let sku_store =
        FakeSkuStore::default().with_mapping("TEE-RED-M", mapping(s1, "SUP-TEE", dec!(5.00)));

    let h = harness(
        FakeOrderStore::with_order(order.clone(), items),
        sku_store,
        ScriptedAdapter::succeeding(),
        RecordingAlertService::default(),
    );

    let err = h.processor.run(&job_for(&order)).await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert!(!err.is_retryable());

    assert_eq!(h.adapter.call_count(), 0);
    assert!(h.ledger.snapshot().is_empty());
}

#[tokio::test]
async fn failed_alert_delivery_does_not_change_the_outcome() {
    let order_id = Uuid::new_v4();
    let order = make_order(order_id);

    let items = vec![make_item(order_id, "UNKNOWN-SKU", 1)];
    let h = harness(
        FakeOrderStore::with_order(order.clone(), items),
        FakeSkuStore::default(),
        ScriptedAdapter::succeeding(),
        RecordingAlertService::failing(),
    );

    let err = h.processor.run(&job_for(&order)).await.unwrap_err();
    assert!(matches!(err, ServiceError::UnroutableItems { .. }));
}

struct CountingQueue {
    inner: InMemoryJobQueue,
    dequeues: AtomicUsize,
}

#[async_trait]
impl JobQueue for CountingQueue {
    async fn enqueue(&self, job: OrderJob) -> Result<bool, ServiceError> {
        self.inner.enqueue(job).await
    }

    async fn dequeue(&self) -> Option<QueuedJob> {
        self.dequeues.fetch_add(1, Ordering::SeqCst);
        self.inner.dequeue().await
    }

    async fn ack(&self, job: &QueuedJob) {
        self.inner.ack(job).await
    }

    async fn nack(&self, job: &QueuedJob) -> bool {
        self.inner.nack(job).await
    }

    async fn park(&self, job: &QueuedJob) {
        self.inner.park(job).await
    }
}

#[tokio::test]
async fn worker_pool_stops_when_shutdown_sender_is_dropped() {
    let Harness { processor, .. } = harness(
        FakeOrderStore::default(),
        FakeSkuStore::default(),
        ScriptedAdapter::succeeding(),
        RecordingAlertService::default(),
    );
    let queue = Arc::new(CountingQueue {
        inner: InMemoryJobQueue::new(3),
        dequeues: AtomicUsize::new(0),
    });
    let pool = WorkerPool::new(queue.clone(), Arc::new(processor), 2);

    let (tx, rx) = watch::channel(false);
    drop(tx);

    tokio::time::timeout(Duration::from_secs(1), pool.run(rx))
        .await
        .expect("worker pool must stop once the shutdown channel is gone");

    // an idle pool with a closed channel must not spin on the queue
    assert!(queue.dequeues.load(Ordering::SeqCst) <= 2);
}
