//! Domain models for the stock ledger

mod aging;
mod batch;
mod damage;
mod item;
mod movement;

pub use aging::*;
pub use batch::*;
pub use damage::*;
pub use item::*;
pub use movement::*;

use thiserror::Error;

/// Raised when a stored or submitted enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
