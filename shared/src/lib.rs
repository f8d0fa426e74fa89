//! Shared types and models for the stock ledger
//!
//! Pure domain logic with no I/O: batch, movement and damage records, the FIFO
//! consumption planner and aging derivation. The backend applies these inside
//! storage transactions.

pub mod fifo;
pub mod models;
pub mod types;
pub mod validation;

pub use fifo::*;
pub use models::*;
pub use types::*;
pub use validation::*;
