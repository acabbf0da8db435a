//! The tagged union over all record kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Account, Advisor, Bill, Investment, Transaction};

// ============================================================================
// Record Kind
// ============================================================================

/// Classification tag for extracted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Bank account.
    Account,
    /// Account operation.
    Transaction,
    /// Portfolio line.
    Investment,
    /// Agency advisor.
    Advisor,
    /// Billed document.
    Bill,
}

impl RecordKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::Transaction => "Transaction",
            Self::Investment => "Investment",
            Self::Advisor => "Advisor",
            Self::Bill => "Bill",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Record
// ============================================================================

/// An extracted record, polymorphic over kind.
///
/// Heterogeneous listings stream `Record` values; homogeneous operations
/// stream the concrete type directly. Equality is the derived structural
/// comparison of the inner record, which is what the session engine uses
/// for replay consistency checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// Bank account.
    Account(Account),
    /// Account operation.
    Transaction(Transaction),
    /// Portfolio line.
    Investment(Investment),
    /// Agency advisor.
    Advisor(Advisor),
    /// Billed document.
    Bill(Bill),
}

impl Record {
    /// Returns the classification tag of this record.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Account(_) => RecordKind::Account,
            Self::Transaction(_) => RecordKind::Transaction,
            Self::Investment(_) => RecordKind::Investment,
            Self::Advisor(_) => RecordKind::Advisor,
            Self::Bill(_) => RecordKind::Bill,
        }
    }

    /// Returns the identity key, unique within one logical listing.
    pub fn identity_key(&self) -> &str {
        match self {
            Self::Account(r) => &r.id,
            Self::Transaction(r) => &r.id,
            Self::Investment(r) => &r.id,
            Self::Advisor(r) => &r.id,
            Self::Bill(r) => &r.id,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountKind;

    #[test]
    fn test_record_kind_and_key() {
        let rec = Record::Account(Account::new("42", "Livret A", AccountKind::Savings));
        assert_eq!(rec.kind(), RecordKind::Account);
        assert_eq!(rec.identity_key(), "42");
    }

    #[test]
    fn test_record_serde_tagged() {
        let rec = Record::Advisor(Advisor::new("a1", "Jean Dupont"));
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["kind"], "advisor");
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }
}
