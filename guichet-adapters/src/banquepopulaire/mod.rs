//! Banque Populaire adapter.
//!
//! The regional Banque Populaire sites share one "cyber" web application:
//! a heavily stateful task engine where every listing is a task started
//! with `StartTask.do?taskInfoOID=...` and continued with posts to
//! `ContinueTask.do`, all chained through a rotating request token. Pages
//! answer JSON payloads; an `"error": true` payload on the continuation
//! endpoint is the task engine's way of refusing the requested task.
//!
//! Quirks this adapter absorbs:
//!
//! - the accounts task hides behind several `taskInfoOID` candidates
//!   depending on the contract; the first one that answers without error
//!   is pinned for the rest of the session
//! - a first `StartTask` call may answer an informational popup instead of
//!   the listing; the call is simply repeated
//! - the short account list must be expanded with a
//!   `EQUIPEMENT_COMPLET` continuation before iterating
//! - IBANs live behind a separate task and are unavailable for life
//!   insurance and market accounts
//!
//! ## Usage
//!
//! ```ignore
//! use guichet_adapters::banquepopulaire::{AdapterConfig, BanquePopulaire};
//!
//! let adapter = BanquePopulaire::new(config, transport);
//! let accounts = adapter.accounts(true).try_collect().await?;
//! ```

// Modules
mod browser;
mod config;
mod pages;

// Re-exports
pub use browser::{BanquePopulaire, BpAuthenticator, BpPage};
pub use config::AdapterConfig;

use crate::registry::AdapterDescriptor;
use guichet_core::RecordKind;

/// Descriptor for the adapter registry.
pub(crate) fn descriptor() -> AdapterDescriptor {
    AdapterDescriptor {
        name: "banquepopulaire",
        display_name: "Banque Populaire",
        country: "FR",
        websites: &[
            "www.ibps.alsace.banquepopulaire.fr",
            "www.ibps.bpaca.banquepopulaire.fr",
            "www.ibps.bpalc.banquepopulaire.fr",
            "www.ibps.bpaura.banquepopulaire.fr",
            "www.ibps.bpgo.banquepopulaire.fr",
            "www.ibps.bpnord.banquepopulaire.fr",
            "www.ibps.occitane.banquepopulaire.fr",
            "www.ibps.rivesparis.banquepopulaire.fr",
            "www.ibps.sud.banquepopulaire.fr",
        ],
        records: &[
            RecordKind::Account,
            RecordKind::Transaction,
            RecordKind::Investment,
            RecordKind::Advisor,
        ],
    }
}
