//! Business logic services for the stock ledger

pub mod aging;
pub mod allocation;
pub mod batch;
pub mod item;
pub mod ledger;

pub use aging::AgingService;
pub use allocation::AllocationEngine;
pub use batch::BatchService;
pub use item::ItemService;
pub use ledger::LedgerService;
