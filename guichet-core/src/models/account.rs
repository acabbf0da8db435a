//! Account record types.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Account Kind
// ============================================================================

/// Classification of a bank account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Current/checking account.
    Checking,
    /// Savings account (livret, PEL, ...).
    Savings,
    /// Deferred-debit card account.
    Card,
    /// Market/securities account.
    Market,
    /// Life insurance contract.
    LifeInsurance,
    /// Loan or credit account.
    Loan,
    /// Could not be classified from the site labels.
    #[default]
    Unknown,
}

impl AccountKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Checking => "Checking",
            Self::Savings => "Savings",
            Self::Card => "Card",
            Self::Market => "Market",
            Self::LifeInsurance => "Life Insurance",
            Self::Loan => "Loan",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns true for kinds that never expose an IBAN on the site.
    ///
    /// Life insurance and market accounts are held by partner entities
    /// and the IBAN lookup page cannot select them.
    pub fn has_iban(&self) -> bool {
        !matches!(self, Self::LifeInsurance | Self::Market)
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Account
// ============================================================================

/// A bank account as listed by a site adapter.
///
/// `id` is the site-side account identifier and is unique within one
/// listing. Balances are integer cents; the currency is an ISO 4217 code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Site-side account identifier (identity key).
    pub id: String,
    /// Human-readable account label.
    pub label: String,
    /// Account classification.
    pub kind: AccountKind,
    /// Current balance in cents.
    pub balance_cents: i64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// IBAN, when the site exposes one for this account.
    pub iban: Option<String>,
}

impl Account {
    /// Creates an account with the mandatory fields.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            balance_cents: 0,
            currency: "EUR".to_string(),
            iban: None,
        }
    }

    /// Sets the balance in cents.
    pub fn with_balance(mut self, cents: i64) -> Self {
        self.balance_cents = cents;
        self
    }

    /// Sets the IBAN.
    pub fn with_iban(mut self, iban: impl Into<String>) -> Self {
        self.iban = Some(iban.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_iban_availability() {
        assert!(AccountKind::Checking.has_iban());
        assert!(AccountKind::Savings.has_iban());
        assert!(!AccountKind::LifeInsurance.has_iban());
        assert!(!AccountKind::Market.has_iban());
    }

    #[test]
    fn test_builder_style() {
        let acc = Account::new("123", "Compte cheques", AccountKind::Checking)
            .with_balance(150_042)
            .with_iban("FR7630001007941234567890185");
        assert_eq!(acc.balance_cents, 150_042);
        assert_eq!(acc.currency, "EUR");
        assert!(acc.iban.is_some());
    }
}
