//! Page kinds, URL rules, login routine and navigation producers.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use guichet_core::{Account, Advisor, Investment, Transaction, TransactionIdAllocator};
use guichet_session::{
    Authenticator, EntryPoints, LoginGate, PageMatcher, PageToken, Producer, Request,
    ResumableStream, RetryPolicy, Session, SessionError, Transport, retry_value,
};

use super::config::AdapterConfig;
use super::pages::{
    AccountsPage, AdvisorPage, ContactPage, IbanPage, InvestmentsPage, NextRef, TransactionsPage,
};

/// Accounts task candidates, in fixed priority order. Which one answers
/// depends on the customer's contract; the winner is pinned per session.
const ACCOUNT_TASKS: [&str; 5] = [
    "mesComptes",
    "mesComptesPRO",
    "maSyntheseGratuite",
    "accueilSynthese",
    "equipementComplet",
];

// ============================================================================
// Page Kinds & Rules
// ============================================================================

/// Page kinds of the cyber application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpPage {
    /// SSO login form.
    Login,
    /// Post-login index, carries the first request token.
    Index,
    /// Accounts listing (short or synthese variants).
    Accounts,
    /// Full equipment accounts listing.
    AccountsFull,
    /// Operations listing for one account.
    Transactions,
    /// Portfolio listing for a market or life insurance account.
    Investments,
    /// IBAN lookup task.
    Iban,
    /// Advisor home and contact pages.
    Advisor,
    /// Task engine refusal.
    Error,
    /// Maintenance interstitial.
    Unavailable,
    /// Public portal pages.
    Home,
}

fn task_refused(body: &str) -> bool {
    body.contains("\"error\":true") || body.contains("\"error\": true")
}

/// Builds the URL rule table.
///
/// The refusal rule is registered first: it shares the task-engine URL
/// shapes and only the payload tells it apart.
fn page_rules() -> PageMatcher<BpPage> {
    PageMatcher::new()
        .rule_when(
            r"https://[^/]+/cyber/internet/(Start|Continue)Task\.do.*",
            task_refused,
            BpPage::Error,
        )
        .rule(r"https://[^/]+/auth/UI/Login.*", BpPage::Login)
        .rule(r"https://[^/]+/cyber/internet/Login\.do.*", BpPage::Index)
        .rule(
            r"https://[^/]+/cyber/internet/StartTask\.do\?taskInfoOID=(mesComptes|mesComptesPRO|maSyntheseGratuite|accueilSynthese|equipementComplet).*",
            BpPage::Accounts,
        )
        .rule(
            r"https://[^/]+/cyber/internet/ContinueTask\.do\?.*dialogActionPerformed=(VUE_COMPLETE|SUITE).*",
            BpPage::Accounts,
        )
        .rule(
            r"https://[^/]+/cyber/internet/ContinueTask\.do\?.*dialogActionPerformed=EQUIPEMENT_COMPLET.*",
            BpPage::AccountsFull,
        )
        .rule(
            r"https://[^/]+/cyber/internet/ContinueTask\.do\?.*dialogActionPerformed=(SOLDE|CONTRAT|SELECTION_ENCOURS_CARTE).*",
            BpPage::Transactions,
        )
        .rule(r"https://[^/]+/cyber/internet/(Page|Sort)\.do\?.*", BpPage::Transactions)
        .rule(
            r"https://[^/]+/cyber/internet/ContinueTask\.do\?.*dialogActionPerformed=PORTEFEUILLE.*",
            BpPage::Investments,
        )
        .rule(
            r"https://[^/]+/cyber/internet/StartTask\.do\?taskInfoOID=cyberIBAN.*",
            BpPage::Iban,
        )
        .rule(
            r"https://[^/]+/cyber/internet/StartTask\.do\?taskInfoOID=(accueil|contacter).*",
            BpPage::Advisor,
        )
        .rule(r"https://[^/]+/cyber/internet/ContinueTask\.do$", BpPage::Error)
        .rule(r"https://[^/]+/s3f-web/.*", BpPage::Unavailable)
        .rule(r"https://[^/]+/static/errors/nondispo\.html", BpPage::Unavailable)
        .rule(r"https://[^/]+/portailinternet/.*", BpPage::Home)
}

fn page_body(session: &Session<BpPage>) -> Result<&str, SessionError> {
    session
        .response()
        .map(|r| r.body.as_str())
        .ok_or_else(|| SessionError::BrokenPage("no page loaded".into()))
}

/// Reads the rotating request token off the current page payload.
fn current_token(session: &Session<BpPage>) -> Result<String, SessionError> {
    let body = page_body(session)?;
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| SessionError::Parse(e.to_string()))?;
    value
        .get("token")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SessionError::BrokenPage("page carries no request token".into()))
}

// ============================================================================
// Authenticator
// ============================================================================

/// Login routine for the SSO front of the cyber application.
pub struct BpAuthenticator {
    base: String,
    username: String,
    secret: String,
}

#[async_trait]
impl Authenticator<BpPage> for BpAuthenticator {
    #[instrument(skip(self, session))]
    async fn login(&self, session: &mut Session<BpPage>) -> Result<(), SessionError> {
        session.navigate(&Request::get(&self.base)).await?;
        session.require(BpPage::Login)?;

        session
            .navigate(&Request::post(
                format!("{}/auth/UI/Login", self.base),
                vec![
                    ("username".to_string(), self.username.clone()),
                    ("password".to_string(), self.secret.clone()),
                ],
            ))
            .await?;

        if session.is(BpPage::Login) {
            return Err(SessionError::InvalidCredentials);
        }
        session.require(BpPage::Index)?;

        // The index payload must carry the session's first request token.
        current_token(session)?;
        Ok(())
    }
}

// ============================================================================
// Shared navigation context
// ============================================================================

/// Everything a producer needs to drive the session, cheap to clone so
/// the producer factory can mint a fresh producer per retry attempt.
#[derive(Clone)]
struct BpContext {
    session: Arc<Mutex<Session<BpPage>>>,
    authenticator: Arc<BpAuthenticator>,
    entry: Arc<std::sync::Mutex<EntryPoints>>,
    base: String,
}

impl BpContext {
    async fn start_task(
        &self,
        session: &mut Session<BpPage>,
        oid: &str,
        token: &str,
    ) -> Result<(), SessionError> {
        let url = format!(
            "{}/cyber/internet/StartTask.do?taskInfoOID={oid}&token={token}",
            self.base
        );
        session.navigate(&Request::get(url)).await?;
        Ok(())
    }

    async fn continue_task(
        &self,
        session: &mut Session<BpPage>,
        form: Vec<(String, String)>,
    ) -> Result<(), SessionError> {
        let url = format!("{}/cyber/internet/ContinueTask.do", self.base);
        session.navigate(&Request::post(url, form)).await?;
        Ok(())
    }

    /// Enters the accounts task through the entry-point table.
    ///
    /// Tries the candidates in priority order until one answers without
    /// refusal, repeating once through an informational popup, and pins
    /// the winner. A short listing is expanded to the full equipment
    /// before returning.
    async fn go_accounts_list(
        &self,
        session: &mut Session<BpPage>,
        token: &mut String,
    ) -> Result<AccountsPage, SessionError> {
        let candidates: Vec<(usize, String)> = {
            let entry = self.entry.lock().expect("entry table poisoned");
            entry
                .candidates()
                .into_iter()
                .map(|(i, c)| (i, c.to_string()))
                .collect()
        };

        for (index, oid) in candidates {
            self.start_task(session, &oid, token).await?;
            if session.is(BpPage::Error) {
                debug!(task = %oid, "Accounts task refused, trying next candidate");
                continue;
            }
            session.require(BpPage::Accounts)?;

            let mut page = AccountsPage::parse(page_body(session)?)?;
            token.clone_from(&page.token);

            if page.popup {
                debug!(task = %oid, "Popup displayed, repeating task");
                self.start_task(session, &oid, token).await?;
                page = AccountsPage::parse(page_body(session)?)?;
                token.clone_from(&page.token);
            }
            if page.is_error() {
                continue;
            }

            self.entry.lock().expect("entry table poisoned").pin(index);

            if page.short_list {
                self.continue_task(
                    session,
                    vec![
                        ("dialogActionPerformed".to_string(), "EQUIPEMENT_COMPLET".to_string()),
                        ("token".to_string(), token.clone()),
                    ],
                )
                .await?;
                session.require(BpPage::AccountsFull)?;
                page = AccountsPage::parse(page_body(session)?)?;
                token.clone_from(&page.token);
            }
            return Ok(page);
        }

        Err(self
            .entry
            .lock()
            .expect("entry table poisoned")
            .exhausted("accounts list"))
    }

    /// Resolves the IBAN table through the dedicated task.
    async fn fetch_ibans(
        &self,
        session: &mut Session<BpPage>,
        token: &mut String,
    ) -> Result<IbanPage, SessionError> {
        self.start_task(session, "cyberIBAN", token).await?;
        session.require(BpPage::Iban)?;
        let page = IbanPage::parse(page_body(session)?)?;
        token.clone_from(&page.token);
        Ok(page)
    }
}

// ============================================================================
// Producers
// ============================================================================

/// Accounts listing traversal.
///
/// The listing is buffered before emission: IBAN resolution happens on a
/// separate task after the whole listing is known, so records cannot be
/// finalized page by page.
struct AccountsProducer {
    ctx: BpContext,
    resolve_iban: bool,
    ready: Option<VecDeque<Account>>,
}

impl AccountsProducer {
    async fn traverse(&self) -> Result<Vec<Account>, SessionError> {
        let mut session = self.ctx.session.lock().await;
        LoginGate::ensure(&mut session, self.ctx.authenticator.as_ref()).await?;
        let mut token = current_token(&session)?;

        let page = self.ctx.go_accounts_list(&mut session, &mut token).await?;
        let mut accounts = page.iter_accounts();
        // Continuations are visited in the order the site lists them.
        let mut pending: VecDeque<NextRef> = page.next_refs().into();

        while let Some(next) = pending.pop_front() {
            if let Some(prev_action) = next.prev_action.clone() {
                self.ctx
                    .continue_task(
                        &mut session,
                        vec![
                            ("dialogActionPerformed".to_string(), prev_action),
                            ("token".to_string(), token.clone()),
                        ],
                    )
                    .await?;
                token = current_token(&session)?;
            }

            let form = next
                .into_token()
                .with("token", token.clone())
                .into_params();
            self.ctx.continue_task(&mut session, form).await?;
            if session.is(BpPage::Error) {
                return Err(SessionError::BrokenPage("accounts continuation refused".into()));
            }

            let page = AccountsPage::parse(page_body(&session)?)?;
            token.clone_from(&page.token);
            accounts.extend(page.iter_accounts());
            pending.extend(page.next_refs());
        }

        if self.resolve_iban {
            let ibans = self.ctx.fetch_ibans(&mut session, &mut token).await?;
            for account in &mut accounts {
                if account.kind.has_iban() {
                    account.iban = ibans.iban_for(&account.id).map(str::to_string);
                }
            }
        }

        Ok(accounts)
    }
}

#[async_trait]
impl Producer<Account> for AccountsProducer {
    async fn next(&mut self) -> Result<Option<Account>, SessionError> {
        let ready = match self.ready.as_mut() {
            Some(ready) => ready,
            None => {
                let accounts = self.traverse().await?;
                self.ready.insert(accounts.into())
            }
        };
        Ok(ready.pop_front())
    }
}

/// Operations listing traversal, emitted page by page.
struct TransactionsProducer {
    ctx: BpContext,
    account_id: String,
    coming: bool,
    started: bool,
    finished: bool,
    pending: VecDeque<Transaction>,
    next_token: Option<PageToken>,
    token: String,
    ids: TransactionIdAllocator,
}

impl TransactionsProducer {
    fn new(ctx: BpContext, account_id: String, coming: bool) -> Self {
        Self {
            ctx,
            account_id,
            coming,
            started: false,
            finished: false,
            pending: VecDeque::new(),
            next_token: None,
            token: String::new(),
            ids: TransactionIdAllocator::new(),
        }
    }

    fn absorb(&mut self, page: &TransactionsPage) {
        self.token.clone_from(&page.token);
        self.pending
            .extend(page.iter_transactions(&self.account_id, &mut self.ids));
        self.next_token = page.next_page_token();
    }

    async fn start(&mut self) -> Result<(), SessionError> {
        let mut session = self.ctx.session.lock().await;
        LoginGate::ensure(&mut session, self.ctx.authenticator.as_ref()).await?;
        self.token = current_token(&session)?;

        // The history task continues off the accounts listing.
        self.ctx.go_accounts_list(&mut session, &mut self.token).await?;

        let action = if self.coming { "SELECTION_ENCOURS_CARTE" } else { "SOLDE" };
        self.ctx
            .continue_task(
                &mut session,
                vec![
                    ("dialogActionPerformed".to_string(), action.to_string()),
                    ("accountId".to_string(), self.account_id.clone()),
                    ("token".to_string(), self.token.clone()),
                ],
            )
            .await?;
        session.require(BpPage::Transactions)?;

        let page = TransactionsPage::parse(page_body(&session)?)?;
        if page.is_error() {
            return Err(SessionError::BrokenPage("history task refused".into()));
        }
        if page.no_operations() {
            self.finished = true;
            self.token.clone_from(&page.token);
            return Ok(());
        }
        drop(session);
        self.absorb(&page);
        Ok(())
    }

    async fn follow(&mut self, next: PageToken) -> Result<(), SessionError> {
        let mut session = self.ctx.session.lock().await;

        let url = {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in next.params() {
                query.append_pair(key, value);
            }
            query.append_pair("token", &self.token);
            format!("{}/cyber/internet/Page.do?{}", self.ctx.base, query.finish())
        };

        session.navigate(&Request::get(url)).await?;
        session.require(BpPage::Transactions)?;

        let page = TransactionsPage::parse(page_body(&session)?)?;
        drop(session);
        self.absorb(&page);
        Ok(())
    }
}

#[async_trait]
impl Producer<Transaction> for TransactionsProducer {
    async fn next(&mut self) -> Result<Option<Transaction>, SessionError> {
        loop {
            if let Some(transaction) = self.pending.pop_front() {
                return Ok(Some(transaction));
            }
            if self.finished {
                return Ok(None);
            }
            if !self.started {
                self.started = true;
                self.start().await?;
                continue;
            }
            match self.next_token.take() {
                Some(next) => self.follow(next).await?,
                None => self.finished = true,
            }
        }
    }
}

/// Portfolio traversal for one account.
struct InvestmentsProducer {
    ctx: BpContext,
    account_id: String,
    ready: Option<VecDeque<Investment>>,
}

impl InvestmentsProducer {
    async fn traverse(&self) -> Result<Vec<Investment>, SessionError> {
        let mut session = self.ctx.session.lock().await;
        LoginGate::ensure(&mut session, self.ctx.authenticator.as_ref()).await?;
        let mut token = current_token(&session)?;

        self.ctx.go_accounts_list(&mut session, &mut token).await?;

        self.ctx
            .continue_task(
                &mut session,
                vec![
                    ("dialogActionPerformed".to_string(), "PORTEFEUILLE".to_string()),
                    ("accountId".to_string(), self.account_id.clone()),
                    ("token".to_string(), token.clone()),
                ],
            )
            .await?;

        if session.is(BpPage::Error) {
            // Some partner-held contracts refuse the portfolio task; an
            // empty portfolio is the honest answer.
            warn!(account = %self.account_id, "Portfolio task refused by the site");
            return Ok(Vec::new());
        }
        session.require(BpPage::Investments)?;

        let page = InvestmentsPage::parse(page_body(&session)?)?;
        if page.is_error() {
            warn!(account = %self.account_id, "Portfolio payload flagged as error");
            return Ok(Vec::new());
        }
        Ok(page.iter_investments(&self.account_id))
    }
}

#[async_trait]
impl Producer<Investment> for InvestmentsProducer {
    async fn next(&mut self) -> Result<Option<Investment>, SessionError> {
        let ready = match self.ready.as_mut() {
            Some(ready) => ready,
            None => {
                let investments = self.traverse().await?;
                self.ready.insert(investments.into())
            }
        };
        Ok(ready.pop_front())
    }
}

/// Advisor lookup: the home task names the advisor, the contact task
/// adds the agency.
struct AdvisorProducer {
    ctx: BpContext,
    ready: Option<VecDeque<Advisor>>,
}

impl AdvisorProducer {
    async fn traverse(&self) -> Result<Vec<Advisor>, SessionError> {
        let mut session = self.ctx.session.lock().await;
        LoginGate::ensure(&mut session, self.ctx.authenticator.as_ref()).await?;
        let mut token = current_token(&session)?;

        self.ctx.start_task(&mut session, "accueil", &token).await?;
        session.require(BpPage::Advisor)?;
        let home = AdvisorPage::parse(page_body(&session)?)?;
        token.clone_from(&home.token);

        let Some(mut advisor) = home.advisor() else {
            return Ok(Vec::new());
        };

        self.ctx.start_task(&mut session, "contacter", &token).await?;
        session.require(BpPage::Advisor)?;
        let contact = ContactPage::parse(page_body(&session)?)?;
        contact.update_agency(&mut advisor);

        Ok(vec![advisor])
    }
}

#[async_trait]
impl Producer<Advisor> for AdvisorProducer {
    async fn next(&mut self) -> Result<Option<Advisor>, SessionError> {
        let ready = match self.ready.as_mut() {
            Some(ready) => ready,
            None => {
                let advisors = self.traverse().await?;
                self.ready.insert(advisors.into())
            }
        };
        Ok(ready.pop_front())
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// The Banque Populaire adapter.
///
/// One instance serves one authenticated identity and assumes one
/// extraction flow in flight at a time; run independent identities on
/// independent instances.
pub struct BanquePopulaire {
    ctx: BpContext,
    retry: RetryPolicy,
}

impl BanquePopulaire {
    /// Creates an adapter over the given transport.
    pub fn new(config: AdapterConfig, transport: Arc<dyn Transport>) -> Self {
        let base = config.base_url();
        let session = Session::new(transport, page_rules(), vec![BpPage::Login]);
        let authenticator = Arc::new(BpAuthenticator {
            base: base.clone(),
            username: config.username,
            secret: config.secret,
        });
        let ctx = BpContext {
            session: Arc::new(Mutex::new(session)),
            authenticator,
            entry: Arc::new(std::sync::Mutex::new(EntryPoints::new(ACCOUNT_TASKS))),
            base,
        };
        Self {
            ctx,
            retry: config.retry,
        }
    }

    /// Logs in now instead of lazily on the first listing.
    ///
    /// Retried on the transient class like any other operation; invalid
    /// credentials surface immediately.
    pub async fn login(&self) -> Result<(), SessionError> {
        retry_value(&self.retry, || async {
            let mut session = self.ctx.session.lock().await;
            LoginGate::ensure(&mut session, self.ctx.authenticator.as_ref()).await
        })
        .await
    }

    /// Streams the accounts listing, optionally resolving IBANs.
    pub fn accounts(&self, resolve_iban: bool) -> ResumableStream<Account> {
        let ctx = self.ctx.clone();
        ResumableStream::new(self.retry.clone(), move || {
            Box::new(AccountsProducer {
                ctx: ctx.clone(),
                resolve_iban,
                ready: None,
            })
        })
    }

    /// Finds one account by id, without IBAN resolution.
    pub async fn account(&self, id: &str) -> Result<Option<Account>, SessionError> {
        let mut stream = self.accounts(false);
        while let Some(account) = stream.next().await? {
            if account.id == id {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }

    /// Streams the operations of one account, site order preserved.
    ///
    /// `coming` selects the not-yet-debited card operations instead of
    /// the booked history.
    pub fn history(&self, account_id: &str, coming: bool) -> ResumableStream<Transaction> {
        let ctx = self.ctx.clone();
        let account_id = account_id.to_string();
        ResumableStream::new(self.retry.clone(), move || {
            Box::new(TransactionsProducer::new(
                ctx.clone(),
                account_id.clone(),
                coming,
            ))
        })
    }

    /// Streams the portfolio of one account.
    pub fn investments(&self, account_id: &str) -> ResumableStream<Investment> {
        let ctx = self.ctx.clone();
        let account_id = account_id.to_string();
        ResumableStream::new(self.retry.clone(), move || {
            Box::new(InvestmentsProducer {
                ctx: ctx.clone(),
                account_id: account_id.clone(),
                ready: None,
            })
        })
    }

    /// Streams the advisor record (zero or one element).
    pub fn advisor(&self) -> ResumableStream<Advisor> {
        let ctx = self.ctx.clone();
        ResumableStream::new(self.retry.clone(), move || {
            Box::new(AdvisorProducer {
                ctx: ctx.clone(),
                ready: None,
            })
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
