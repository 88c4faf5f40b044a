pub mod alerts;
pub mod orders;
pub mod production_orders;
pub mod sku_translation;
pub mod supplier_routing;

/// Actor recorded in status history for transitions driven by the
/// orchestrator rather than a human operator.
pub const SYSTEM_ACTOR: &str = "system";
