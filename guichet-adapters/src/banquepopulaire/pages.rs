//! Page payload extraction for the cyber task engine.
//!
//! Every task page answers a JSON payload carrying the rotating request
//! `token` alongside the records. Extraction stays deliberately dumb:
//! deserialize, map to core records, surface continuation descriptors as
//! opaque [`PageToken`]s. Navigation decisions belong to the browser.

use serde::Deserialize;
use std::collections::BTreeMap;

use guichet_core::{
    Account, AccountKind, Advisor, Investment, Transaction, TransactionIdAllocator,
};
use guichet_session::{PageToken, SessionError};

// ============================================================================
// Payload scaffolding
// ============================================================================

fn parse<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, SessionError> {
    serde_json::from_str(body).map_err(|e| SessionError::Parse(e.to_string()))
}

/// Continuation descriptor as the site serializes it.
#[derive(Debug, Clone, Deserialize)]
pub struct NextRef {
    /// Form parameters to post back to `ContinueTask.do`.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Action to perform first to reach the page holding the next page.
    #[serde(default)]
    pub prev_action: Option<String>,
}

impl NextRef {
    /// Converts the descriptor into an opaque token.
    pub fn into_token(self) -> PageToken {
        PageToken::new(self.params.into_iter().collect())
    }
}

// ============================================================================
// Accounts page
// ============================================================================

#[derive(Debug, Deserialize)]
struct AccountEntry {
    id: String,
    label: String,
    #[serde(default)]
    kind: AccountKind,
    #[serde(default)]
    balance_cents: i64,
    #[serde(default = "default_currency")]
    currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// Parsed accounts listing page.
#[derive(Debug, Deserialize)]
pub struct AccountsPage {
    #[serde(default)]
    error: bool,
    /// The task engine sometimes answers an informational popup instead
    /// of the listing; the caller repeats the request once.
    #[serde(default)]
    pub popup: bool,
    /// True when only the short list is shown and the full equipment
    /// continuation must be posted first.
    #[serde(default)]
    pub short_list: bool,
    /// Rotating request token for the next continuation.
    pub token: String,
    #[serde(default)]
    accounts: Vec<AccountEntry>,
    #[serde(default)]
    next: Vec<NextRef>,
}

impl AccountsPage {
    /// Parses an accounts payload.
    pub fn parse(body: &str) -> Result<Self, SessionError> {
        parse(body)
    }

    /// True when the task engine refused the task.
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Maps the listing to core records, in site order.
    pub fn iter_accounts(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .map(|e| {
                let mut account = Account::new(e.id.clone(), e.label.clone(), e.kind)
                    .with_balance(e.balance_cents);
                account.currency.clone_from(&e.currency);
                account
            })
            .collect()
    }

    /// Continuation descriptors for further listing pages, in the order
    /// they should be visited.
    pub fn next_refs(&self) -> Vec<NextRef> {
        self.next.clone()
    }
}

// ============================================================================
// Transactions page
// ============================================================================

#[derive(Debug, Deserialize)]
struct TransactionEntry {
    #[serde(default)]
    id: Option<String>,
    date: chrono::NaiveDate,
    #[serde(default)]
    value_date: Option<chrono::NaiveDate>,
    label: String,
    amount_cents: i64,
    #[serde(default)]
    coming: bool,
}

/// Parsed transactions listing page.
#[derive(Debug, Deserialize)]
pub struct TransactionsPage {
    #[serde(default)]
    error: bool,
    /// Rotating request token.
    pub token: String,
    #[serde(default)]
    transactions: Vec<TransactionEntry>,
    /// Query parameters for the next history page, absent on the last.
    #[serde(default)]
    next: Option<BTreeMap<String, String>>,
}

impl TransactionsPage {
    /// Parses a transactions payload.
    pub fn parse(body: &str) -> Result<Self, SessionError> {
        parse(body)
    }

    /// True when the task engine refused the task.
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// True when the account has no operations at all.
    pub fn no_operations(&self) -> bool {
        self.transactions.is_empty() && self.next.is_none()
    }

    /// Maps the listing to core records, allocating listing-unique ids.
    ///
    /// Sites omit operation ids more often than not; the fallback id is
    /// derived from the operation's attributes and deduplicated through
    /// the allocator, which must span the whole listing so replays derive
    /// identical ids.
    pub fn iter_transactions(
        &self,
        account_id: &str,
        ids: &mut TransactionIdAllocator,
    ) -> Vec<Transaction> {
        self.transactions
            .iter()
            .map(|e| {
                let candidate = e.id.clone().unwrap_or_else(|| {
                    format!("{}-{}-{}", e.date, e.label.replace(' ', "_"), e.amount_cents)
                });
                let mut tr = Transaction::new(
                    ids.allocate(candidate),
                    account_id,
                    e.date,
                    e.label.clone(),
                    e.amount_cents,
                );
                tr.value_date = e.value_date;
                tr.coming = e.coming;
                tr
            })
            .collect()
    }

    /// Token for the next history page, when one remains.
    pub fn next_page_token(&self) -> Option<PageToken> {
        self.next
            .as_ref()
            .map(|params| PageToken::new(params.clone().into_iter().collect()))
    }
}

// ============================================================================
// Investments page
// ============================================================================

#[derive(Debug, Deserialize)]
struct InvestmentEntry {
    id: String,
    label: String,
    #[serde(default)]
    quantity: f64,
    #[serde(default)]
    unit_value_cents: i64,
    #[serde(default)]
    valuation_cents: i64,
}

/// Parsed investments page.
#[derive(Debug, Deserialize)]
pub struct InvestmentsPage {
    #[serde(default)]
    error: bool,
    /// Rotating request token.
    pub token: String,
    #[serde(default)]
    investments: Vec<InvestmentEntry>,
}

impl InvestmentsPage {
    /// Parses an investments payload.
    pub fn parse(body: &str) -> Result<Self, SessionError> {
        parse(body)
    }

    /// True when the task engine refused the task.
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Maps the portfolio to core records, in site order.
    pub fn iter_investments(&self, account_id: &str) -> Vec<Investment> {
        self.investments
            .iter()
            .map(|e| {
                let mut inv = Investment::new(e.id.clone(), account_id, e.label.clone());
                inv.quantity = e.quantity;
                inv.unit_value_cents = e.unit_value_cents;
                inv.valuation_cents = e.valuation_cents;
                inv
            })
            .collect()
    }
}

// ============================================================================
// Advisor pages
// ============================================================================

#[derive(Debug, Deserialize)]
struct AdvisorEntry {
    id: String,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

/// Parsed advisor (home) page.
#[derive(Debug, Deserialize)]
pub struct AdvisorPage {
    /// Rotating request token.
    pub token: String,
    advisor: Option<AdvisorEntry>,
}

impl AdvisorPage {
    /// Parses an advisor payload.
    pub fn parse(body: &str) -> Result<Self, SessionError> {
        parse(body)
    }

    /// The advisor record, when the home page shows one.
    pub fn advisor(&self) -> Option<Advisor> {
        self.advisor.as_ref().map(|e| {
            let mut a = Advisor::new(e.id.clone(), e.name.clone());
            a.email.clone_from(&e.email);
            a.phone.clone_from(&e.phone);
            a
        })
    }
}

/// Parsed contact page, which carries the agency name.
#[derive(Debug, Deserialize)]
pub struct ContactPage {
    #[serde(default)]
    agency: Option<String>,
}

impl ContactPage {
    /// Parses a contact payload.
    pub fn parse(body: &str) -> Result<Self, SessionError> {
        parse(body)
    }

    /// Fills the agency on an advisor record.
    pub fn update_agency(&self, advisor: &mut Advisor) {
        advisor.agency.clone_from(&self.agency);
    }
}

// ============================================================================
// IBAN page
// ============================================================================

/// Parsed IBAN lookup page.
#[derive(Debug, Deserialize)]
pub struct IbanPage {
    /// Rotating request token.
    pub token: String,
    #[serde(default)]
    ibans: BTreeMap<String, String>,
}

impl IbanPage {
    /// Parses an IBAN payload.
    pub fn parse(body: &str) -> Result<Self, SessionError> {
        parse(body)
    }

    /// The IBAN for an account, when the site exposes one.
    pub fn iban_for(&self, account_id: &str) -> Option<&str> {
        self.ibans.get(account_id).map(String::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounts_page_roundtrip() {
        let body = r#"{
            "token": "t1",
            "short_list": true,
            "accounts": [
                {"id": "001", "label": "Compte cheques", "kind": "checking", "balance_cents": 123456},
                {"id": "002", "label": "Livret A", "kind": "savings", "balance_cents": 500000}
            ],
            "next": [{"params": {"dialogActionPerformed": "SUITE", "page": "2"}}]
        }"#;
        let page = AccountsPage::parse(body).unwrap();
        assert!(!page.is_error());
        assert!(page.short_list);
        let accounts = page.iter_accounts();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, "001");
        assert_eq!(accounts[0].kind, AccountKind::Checking);
        assert_eq!(accounts[1].balance_cents, 500_000);
        assert_eq!(page.next_refs().len(), 1);
    }

    #[test]
    fn test_transactions_fallback_ids_are_unique() {
        let body = r#"{
            "token": "t2",
            "transactions": [
                {"date": "2016-03-01", "label": "CB LECLERC", "amount_cents": -2350},
                {"date": "2016-03-01", "label": "CB LECLERC", "amount_cents": -2350}
            ]
        }"#;
        let page = TransactionsPage::parse(body).unwrap();
        let mut ids = TransactionIdAllocator::new();
        let trs = page.iter_transactions("001", &mut ids);
        assert_eq!(trs.len(), 2);
        assert_ne!(trs[0].id, trs[1].id);
        assert!(page.next_page_token().is_none());
        assert!(!page.no_operations());
    }

    #[test]
    fn test_malformed_payload_is_parse_error() {
        let err = AccountsPage::parse("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, SessionError::Parse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_advisor_and_contact() {
        let page = AdvisorPage::parse(
            r#"{"token": "t3", "advisor": {"id": "a1", "name": "Jean Dupont", "phone": "0388000000"}}"#,
        )
        .unwrap();
        let mut advisor = page.advisor().unwrap();
        assert_eq!(advisor.name, "Jean Dupont");

        let contact = ContactPage::parse(r#"{"token": "t4", "agency": "Agence Strasbourg"}"#).unwrap();
        contact.update_agency(&mut advisor);
        assert_eq!(advisor.agency.as_deref(), Some("Agence Strasbourg"));
    }
}
