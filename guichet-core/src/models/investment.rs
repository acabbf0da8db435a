//! Investment record types.

use serde::{Deserialize, Serialize};

/// One line of an investment portfolio.
///
/// Quantities are fractional unit counts; all monetary fields are cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    /// Site-side line identifier, usually the ISIN code (identity key).
    pub id: String,
    /// Owning account identifier.
    pub account_id: String,
    /// Instrument label.
    pub label: String,
    /// Number of units held.
    pub quantity: f64,
    /// Unit value in cents.
    pub unit_value_cents: i64,
    /// Total valuation in cents.
    pub valuation_cents: i64,
}

impl Investment {
    /// Creates an investment line.
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            label: label.into(),
            quantity: 0.0,
            unit_value_cents: 0,
            valuation_cents: 0,
        }
    }
}
