pub mod order;
pub mod order_item;
pub mod production_order;
pub mod sku_mapping;
pub mod supplier;
