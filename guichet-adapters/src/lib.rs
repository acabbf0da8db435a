// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Guichet Adapters
//!
//! Site-specific scraping adapters built on the Guichet session engine.
//!
//! Each adapter module declares a page-kind enumeration, a URL rule
//! table, a login routine, and the navigation producers for the record
//! listings the site exposes. The engine (`guichet-session`) supplies
//! everything else: session state, login gating, retry and replay.
//!
//! ## Modules
//!
//! - [`banquepopulaire`] - Banque Populaire regional banks
//! - [`registry`] - static adapter descriptors and lookup

pub mod banquepopulaire;
pub mod registry;

pub use registry::{AdapterDescriptor, AdapterRegistry};
