//! Transaction record types and per-listing id allocation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Transaction
// ============================================================================

/// One operation on an account.
///
/// `id` is unique within one logical listing (see
/// [`TransactionIdAllocator`]); sites do not always provide a stable
/// identifier, so ids may be derived from the operation's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Listing-unique transaction identifier (identity key).
    pub id: String,
    /// Owning account identifier.
    pub account_id: String,
    /// Booking date.
    pub date: NaiveDate,
    /// Value date, when distinct from the booking date.
    pub value_date: Option<NaiveDate>,
    /// Raw site label.
    pub label: String,
    /// Signed amount in cents.
    pub amount_cents: i64,
    /// True for operations not yet debited (card encours).
    pub coming: bool,
}

impl Transaction {
    /// Creates a transaction with the mandatory fields.
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        date: NaiveDate,
        label: impl Into<String>,
        amount_cents: i64,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            date,
            value_date: None,
            label: label.into(),
            amount_cents,
            coming: false,
        }
    }
}

// ============================================================================
// Transaction Id Allocator
// ============================================================================

/// Allocates listing-unique transaction ids.
///
/// Sites frequently repeat the same derived identifier (same label, date
/// and amount). The allocator keeps a seen-set for the current listing
/// and suffixes colliding ids with `-2`, `-3`, ... so that identity keys
/// stay unique without reordering anything.
#[derive(Debug, Default)]
pub struct TransactionIdAllocator {
    seen: HashSet<String>,
}

impl TransactionIdAllocator {
    /// Creates an empty allocator for a new listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `candidate` or, on collision, the first free suffixed form.
    pub fn allocate(&mut self, candidate: impl Into<String>) -> String {
        let candidate = candidate.into();
        if self.seen.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 2u32;
        loop {
            let suffixed = format!("{candidate}-{n}");
            if self.seen.insert(suffixed.clone()) {
                return suffixed;
            }
            n += 1;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_unique_ids() {
        let mut alloc = TransactionIdAllocator::new();
        assert_eq!(alloc.allocate("abc"), "abc");
        assert_eq!(alloc.allocate("abc"), "abc-2");
        assert_eq!(alloc.allocate("abc"), "abc-3");
        assert_eq!(alloc.allocate("def"), "def");
    }

    #[test]
    fn test_allocator_survives_explicit_suffix() {
        let mut alloc = TransactionIdAllocator::new();
        assert_eq!(alloc.allocate("tr-2"), "tr-2");
        assert_eq!(alloc.allocate("tr"), "tr");
        // "tr-2" is taken, next free slot is "tr-3"
        assert_eq!(alloc.allocate("tr"), "tr-3");
    }
}
