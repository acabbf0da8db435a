//! Bill record types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A billed document listed by a service site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Site-side document identifier (identity key).
    pub id: String,
    /// Document label.
    pub label: String,
    /// Billing date.
    pub date: NaiveDate,
    /// Billed amount in cents.
    pub amount_cents: i64,
    /// Download URL for the document, when exposed.
    pub document_url: Option<String>,
}

impl Bill {
    /// Creates a bill record.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        date: NaiveDate,
        amount_cents: i64,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            date,
            amount_cents,
            document_url: None,
        }
    }
}
