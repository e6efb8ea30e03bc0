// 🙋 Staff claim workflow
//
// A staff member sees unclaimed bank transactions, opens one, searches their
// own donations, picks exactly one and submits the claim. The claim then waits
// for an admin. Nothing here decides whether the claim is right; the
// backend and the admin do.

use crate::backend::ReconciliationBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    BankTransaction, ClaimRequest, Donation, DonationId, Page, PageRequest, StaffClaim,
};
use crate::request::{Applied, RequestTicket, RequestTracker};
use crate::session::Session;
use tracing::{debug, info};

/// A donation search that has been issued but not yet applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationQuery {
    pub ticket: RequestTicket,
    pub keyword: String,
    pub page: PageRequest,
}

/// Returned after a claim is accepted; the caller refreshes its list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaimReceipt {
    pub request: ClaimRequest,
    pub refresh_transactions: bool,
}

// ============================================================================
// CLAIM DIALOG
// ============================================================================

pub struct ClaimWorkflow {
    session: Session,
    page_size: u32,
    transaction: Option<BankTransaction>,
    keyword: String,
    results: Page<Donation>,
    selected: Option<Donation>,
    searching: bool,
    submitting: bool,
    last_error: Option<String>,
    tracker: RequestTracker,
}

impl ClaimWorkflow {
    pub fn new(session: Session, page_size: u32) -> Self {
        ClaimWorkflow {
            session,
            page_size,
            transaction: None,
            keyword: String::new(),
            results: Page::default(),
            selected: None,
            searching: false,
            submitting: false,
            last_error: None,
            tracker: RequestTracker::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn transaction(&self) -> Option<&BankTransaction> {
        self.transaction.as_ref()
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Edit the search box without querying.
    pub fn set_keyword(&mut self, keyword: impl Into<String>) {
        self.keyword = keyword.into();
    }

    pub fn results(&self) -> &Page<Donation> {
        &self.results
    }

    pub fn selected(&self) -> Option<&Donation> {
        self.selected.as_ref()
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the confirm button is enabled.
    pub fn can_confirm(&self) -> bool {
        self.transaction.is_some() && self.selected.is_some() && !self.submitting
    }

    pub async fn open_claim<B>(
        &mut self,
        backend: &B,
        transaction: BankTransaction,
    ) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        info!(reconciliation_id = transaction.id, "opening claim dialog");
        self.tracker.invalidate();
        self.transaction = Some(transaction);
        self.keyword.clear();
        self.results = Page::default();
        self.selected = None;
        self.last_error = None;
        self.search(backend, "", 0).await
    }

    pub fn begin_search(&mut self, keyword: &str, page: u32) -> ConsoleResult<DonationQuery> {
        if self.transaction.is_none() {
            return Err(ConsoleError::validation("Open a transaction before searching"));
        }
        self.keyword = keyword.to_string();
        self.searching = true;
        Ok(DonationQuery {
            ticket: self.tracker.issue(),
            keyword: keyword.trim().to_string(),
            page: PageRequest::at(page, self.page_size),
        })
    }

    /// Results replace the current page; pages never accumulate.
    pub fn apply_search(
        &mut self,
        query: &DonationQuery,
        result: ConsoleResult<Page<Donation>>,
    ) -> ConsoleResult<Applied> {
        if !self.tracker.is_current(query.ticket) {
            debug!(generation = query.ticket.generation(), "discarding stale donation search");
            return Ok(Applied::Stale);
        }
        self.searching = false;
        match result {
            Ok(page) => {
                self.results = page;
                self.last_error = None;
                Ok(Applied::Fresh)
            }
            Err(err) => {
                self.last_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    pub async fn search<B>(&mut self, backend: &B, keyword: &str, page: u32) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let query = self.begin_search(keyword, page)?;
        let result = backend
            .search_donations(self.session.staff_id, &query.keyword, query.page)
            .await;
        self.apply_search(&query, result)
    }

    /// Radio-style: picking a donation replaces any previous pick.
    pub fn select_donation(&mut self, donation_id: DonationId) -> ConsoleResult<()> {
        let donation = self
            .results
            .content
            .iter()
            .find(|d| d.id == donation_id)
            .cloned()
            .ok_or_else(|| {
                ConsoleError::validation(format!("Donation {donation_id} is not in the current results"))
            })?;
        self.selected = Some(donation);
        Ok(())
    }

    pub async fn confirm_claim<B>(&mut self, backend: &B) -> ConsoleResult<ClaimReceipt>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let (Some(transaction), Some(donation)) = (&self.transaction, &self.selected) else {
            let err = ConsoleError::validation("Please select a donation");
            self.last_error = Some(err.user_message());
            return Err(err);
        };

        let request = ClaimRequest {
            donation_id: donation.id,
            staff_id: self.session.staff_id,
            reconciliation_id: transaction.id,
        };

        self.submitting = true;
        let result = backend.create_claim(request).await;
        self.submitting = false;

        match result {
            Ok(()) => {
                info!(
                    reconciliation_id = request.reconciliation_id,
                    donation_id = request.donation_id,
                    "claim submitted, pending admin approval"
                );
                self.close();
                Ok(ClaimReceipt {
                    request,
                    refresh_transactions: true,
                })
            }
            Err(err) => {
                // Dialog stays open so the operator can retry.
                self.last_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Drop all transient state; in-flight searches become stale.
    pub fn close(&mut self) {
        self.tracker.invalidate();
        self.transaction = None;
        self.keyword.clear();
        self.results = Page::default();
        self.selected = None;
        self.searching = false;
        self.last_error = None;
    }
}

// ============================================================================
// STAFF QUEUE (unclaimed list + "My Claims")
// ============================================================================

pub struct StaffQueue {
    session: Session,
    page_size: u32,
    page: u32,
    transactions: Page<BankTransaction>,
    my_claims: Vec<StaffClaim>,
    tracker: RequestTracker,
    last_error: Option<String>,
}

impl StaffQueue {
    pub fn new(session: Session, page_size: u32) -> Self {
        StaffQueue {
            session,
            page_size,
            page: 0,
            transactions: Page::default(),
            my_claims: Vec::new(),
            tracker: RequestTracker::new(),
            last_error: None,
        }
    }

    pub fn transactions(&self) -> &Page<BankTransaction> {
        &self.transactions
    }

    pub fn my_claims(&self) -> &[StaffClaim] {
        &self.my_claims
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn load_transactions<B>(&mut self, backend: &B, page: u32) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let ticket = self.tracker.issue();
        let request = PageRequest::at(page, self.page_size);
        let result = backend.staff_transactions(self.session.staff_id, request).await;

        if !self.tracker.is_current(ticket) {
            return Ok(Applied::Stale);
        }
        match result {
            Ok(rows) => {
                self.transactions = rows;
                self.page = page;
                self.last_error = None;
                Ok(Applied::Fresh)
            }
            Err(err) => {
                self.last_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    pub async fn refresh<B>(&mut self, backend: &B) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.load_transactions(backend, self.page).await
    }

    pub async fn load_my_claims<B>(&mut self, backend: &B) -> ConsoleResult<()>
    where
        B: ReconciliationBackend + ?Sized,
    {
        match backend.staff_claims(self.session.staff_id).await {
            Ok(claims) => {
                self.my_claims = claims;
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.user_message());
                Err(err)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
