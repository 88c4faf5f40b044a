/*!
 * # Fulfillment Core
 *
 * Order-fulfillment orchestration: once a multi-item order is paid, this
 * crate decomposes it into per-supplier production orders, dispatches each
 * to an external fulfillment partner, and tracks the production lifecycle.
 *
 * The moving parts, leaf first:
 *
 * - [`services::sku_translation`] — internal-SKU ⇄ supplier-SKU mapping
 * - [`suppliers`] — one adapter per partner over a resilient HTTP client
 * - [`services::supplier_routing`] — line items → per-supplier routing plan
 * - [`services::production_orders`] — the production order ledger
 * - [`jobs`] — the order processor job and the dedup queue that drives it
 */

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod jobs;
pub mod services;
pub mod suppliers;

pub use config::{load_config, AppConfig};
pub use errors::ServiceError;

/// Initializes the tracing subscriber from `RUST_LOG`, falling back to the
/// given default filter. Safe to call once per process.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt().with_env_filter(filter).try_init();
}
