// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Guichet Core
//!
//! Record model and shared types for the Guichet site adapters.
//!
//! This crate provides the foundational types used across all other
//! Guichet crates:
//!
//! - Extracted record kinds (accounts, transactions, investments,
//!   advisors, bills)
//! - The [`Record`] enum unifying them for heterogeneous listings
//!
//! ## Key Types
//!
//! - [`Account`] / [`AccountKind`] - Bank account records
//! - [`Transaction`] - Account operations, with per-listing unique ids
//! - [`Investment`] - Portfolio lines
//! - [`Advisor`] - Agency contact records
//! - [`Bill`] - Billed documents
//! - [`Record`] / [`RecordKind`] - Tagged union over the above
//!
//! ## Equality contract
//!
//! Every record kind derives [`PartialEq`] over the full struct. The
//! session engine compares records across retries with that derived
//! equality and nothing else; adapters must not rely on any weaker
//! notion of sameness.

pub mod models;

// Re-export all model types
pub use models::{
    Account,
    AccountKind,
    Advisor,
    Bill,
    Investment,
    Record,
    RecordKind,
    Transaction,
    TransactionIdAllocator,
};
