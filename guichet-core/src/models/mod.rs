//! Domain models for Guichet.
//!
//! This module contains the record types produced by site adapters.
//! Records are flat attribute bags with an identity key; ordering inside
//! one listing is site-defined and preserved by the session engine.
//!
//! ## Submodules
//!
//! - [`account`] - Account records (Account, AccountKind)
//! - [`transaction`] - Transaction records and id allocation
//! - [`investment`] - Investment portfolio lines
//! - [`advisor`] - Agency advisor contacts
//! - [`bill`] - Billed documents
//! - [`record`] - The tagged union over all kinds

mod account;
mod advisor;
mod bill;
mod investment;
mod record;
mod transaction;

// Re-export everything at the models level
pub use account::{Account, AccountKind};
pub use advisor::Advisor;
pub use bill::Bill;
pub use investment::Investment;
pub use record::{Record, RecordKind};
pub use transaction::{Transaction, TransactionIdAllocator};
