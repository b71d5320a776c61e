//! Domain models for the pharmacy ledger.

mod medicine;
mod organization;
mod reports;
mod stock;

pub use medicine::*;
pub use organization::*;
pub use reports::*;
pub use stock::*;
