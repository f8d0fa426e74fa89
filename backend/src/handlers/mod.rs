//! HTTP request handlers

pub mod aging;
pub mod batches;
pub mod health;
pub mod items;
pub mod ledger;
pub mod stock;

pub use aging::aging_report;
pub use batches::{delete_batch, list_batches};
pub use health::health_check;
pub use items::{get_item, reconcile_item, register_item};
pub use ledger::{list_damages, list_movements};
pub use stock::{stock_in, stock_out};
