// ⚖️ Dispute resolution - admin adjudication of staff claims
//
// The admin works a list of transactions that carry open claims. A
// transaction with exactly one claim can be decided inline or in bulk; with
// several competing claims the admin has to open the list and pick.
//
// Per claim: CREATED -> APPROVED | REJECTED. Both ends are terminal and the
// desk never offers an action on a terminal claim.

use crate::backend::ReconciliationBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    ClaimId, ClaimSummary, DisputeStatus, Page, PageRequest, PendingReconciliation,
    ReconciliationId,
};
use crate::request::{Applied, RequestTicket, RequestTracker};
use crate::session::Session;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClaimActions {
    pub approve: bool,
    pub reject: bool,
}

impl ClaimActions {
    pub fn none() -> Self {
        ClaimActions::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.approve && !self.reject
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn verb(&self) -> &'static str {
        match self {
            Decision::Approve => "approve claims",
            Decision::Reject => "reject claims",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuery {
    pub ticket: RequestTicket,
    pub page: PageRequest,
}

/// Claims of one transaction, open for review.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimList {
    pub reconciliation_id: ReconciliationId,
    pub claims: Vec<ClaimSummary>,
}

pub struct DisputeDesk {
    session: Session,
    page_size: u32,
    page: u32,
    pending: Page<PendingReconciliation>,
    single_claim_mode: bool,
    selected: BTreeSet<ReconciliationId>,
    open_claims: Option<ClaimList>,
    pending_tracker: RequestTracker,
    claims_tracker: RequestTracker,
    last_error: Option<String>,
}

impl DisputeDesk {
    pub fn new(session: Session, page_size: u32) -> Self {
        DisputeDesk {
            session,
            page_size,
            page: 0,
            pending: Page::default(),
            single_claim_mode: false,
            selected: BTreeSet::new(),
            open_claims: None,
            pending_tracker: RequestTracker::new(),
            claims_tracker: RequestTracker::new(),
            last_error: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn pending(&self) -> &Page<PendingReconciliation> {
        &self.pending
    }

    pub fn single_claim_mode(&self) -> bool {
        self.single_claim_mode
    }

    pub fn open_claims(&self) -> Option<&ClaimList> {
        self.open_claims.as_ref()
    }

    pub fn selected_ids(&self) -> Vec<ReconciliationId> {
        self.selected.iter().copied().collect()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Rows on screen: only single-claim rows while that mode is on.
    pub fn visible_rows(&self) -> Vec<&PendingReconciliation> {
        self.pending
            .content
            .iter()
            .filter(|row| !self.single_claim_mode || row.is_single_claim())
            .collect()
    }

    pub fn available_actions(&self, claim: &ClaimSummary) -> ClaimActions {
        if !self.session.is_admin() || claim.dispute_status.is_terminal() {
            return ClaimActions::none();
        }
        ClaimActions {
            approve: true,
            reject: true,
        }
    }

    fn remember<T>(&mut self, result: ConsoleResult<T>) -> ConsoleResult<T> {
        if let Err(err) = &result {
            self.last_error = Some(err.user_message());
        }
        result
    }

    // ------------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------------

    pub fn begin_pending(&mut self, page: u32) -> PendingQuery {
        PendingQuery {
            ticket: self.pending_tracker.issue(),
            page: PageRequest::at(page, self.page_size),
        }
    }

    pub fn apply_pending(
        &mut self,
        query: &PendingQuery,
        result: ConsoleResult<Page<PendingReconciliation>>,
    ) -> ConsoleResult<Applied> {
        if !self.pending_tracker.is_current(query.ticket) {
            debug!(generation = query.ticket.generation(), "discarding stale pending page");
            return Ok(Applied::Stale);
        }
        let rows = self.remember(result)?;
        let visible: BTreeSet<_> = rows
            .content
            .iter()
            .filter(|r| r.is_single_claim())
            .map(|r| r.reconciliation_id)
            .collect();
        self.selected.retain(|id| visible.contains(id));
        self.pending = rows;
        self.page = query.page.page;
        self.last_error = None;
        Ok(Applied::Fresh)
    }

    pub async fn load_pending<B>(&mut self, backend: &B, page: u32) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let query = self.begin_pending(page);
        let result = backend.pending_reconciliations(query.page).await;
        self.apply_pending(&query, result)
    }

    pub async fn refresh<B>(&mut self, backend: &B) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.load_pending(backend, self.page).await
    }

    pub async fn list_claims<B>(
        &mut self,
        backend: &B,
        reconciliation_id: ReconciliationId,
    ) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let ticket = self.claims_tracker.issue();
        let result = backend
            .claims_for(reconciliation_id, PageRequest::first(self.page_size))
            .await;

        if !self.claims_tracker.is_current(ticket) {
            return Ok(Applied::Stale);
        }
        let page = self.remember(result)?;
        self.open_claims = Some(ClaimList {
            reconciliation_id,
            claims: page.content,
        });
        Ok(Applied::Fresh)
    }

    pub fn close_claims(&mut self) {
        self.claims_tracker.invalidate();
        self.open_claims = None;
    }

    pub fn set_single_claim_mode(&mut self, enabled: bool) {
        self.single_claim_mode = enabled;
        self.selected.clear();
    }

    // ------------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------------

    fn known_status(&self, claim_id: ClaimId) -> Option<DisputeStatus> {
        self.open_claims
            .as_ref()
            .and_then(|list| list.claims.iter().find(|c| c.id == claim_id))
            .map(|c| c.dispute_status)
    }

    fn ensure_actionable(&self, claim_id: ClaimId, decision: Decision) -> ConsoleResult<()> {
        self.session.require_admin(decision.verb())?;
        if let Some(status) = self.known_status(claim_id) {
            if status.is_terminal() {
                return Err(ConsoleError::validation(format!(
                    "Claim {claim_id} is already {}",
                    status.label().to_lowercase()
                )));
            }
        }
        Ok(())
    }

    async fn decide<B>(&mut self, backend: &B, claim_id: ClaimId, decision: Decision) -> ConsoleResult<()>
    where
        B: ReconciliationBackend + ?Sized,
    {
        if let Err(err) = self.ensure_actionable(claim_id, decision) {
            return self.remember(Err(err));
        }

        let result = match decision {
            Decision::Approve => backend.approve_claim(claim_id).await,
            Decision::Reject => backend.reject_claim(claim_id).await,
        };
        self.remember(result)?;
        info!(claim_id, ?decision, "claim decided");

        // Server-confirmed only: drop the sub-list and reload the outer list.
        self.close_claims();
        if let Err(err) = self.refresh(backend).await {
            warn!(error = %err, "refresh after decision failed");
        }
        Ok(())
    }

    pub async fn approve<B>(&mut self, backend: &B, claim_id: ClaimId) -> ConsoleResult<()>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.decide(backend, claim_id, Decision::Approve).await
    }

    pub async fn reject<B>(&mut self, backend: &B, claim_id: ClaimId) -> ConsoleResult<()>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.decide(backend, claim_id, Decision::Reject).await
    }

    fn single_claim_row(&self, reconciliation_id: ReconciliationId) -> ConsoleResult<&PendingReconciliation> {
        if !self.single_claim_mode {
            return Err(ConsoleError::validation(
                "Inline decisions are only available in single-claim mode",
            ));
        }
        self.pending
            .content
            .iter()
            .find(|r| r.reconciliation_id == reconciliation_id && r.is_single_claim())
            .ok_or_else(|| {
                ConsoleError::validation(format!(
                    "Transaction {reconciliation_id} does not have exactly one claim"
                ))
            })
    }

    async fn decide_inline<B>(
        &mut self,
        backend: &B,
        reconciliation_id: ReconciliationId,
        decision: Decision,
    ) -> ConsoleResult<ClaimId>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let checked = self
            .session
            .require_admin(decision.verb())
            .and_then(|_| self.single_claim_row(reconciliation_id).map(|_| ()));
        self.remember(checked)?;

        let result = backend.single_claim_for(reconciliation_id).await;
        let claim = self.remember(result)?.ok_or_else(|| {
            ConsoleError::validation(format!("No claim found for transaction {reconciliation_id}"))
        });
        let claim = self.remember(claim)?;

        if claim.dispute_status.is_terminal() {
            return self.remember(Err(ConsoleError::validation(format!(
                "Claim {} is already {}",
                claim.id,
                claim.dispute_status.label().to_lowercase()
            ))));
        }

        self.decide(backend, claim.id, decision).await?;
        Ok(claim.id)
    }

    pub async fn approve_inline<B>(
        &mut self,
        backend: &B,
        reconciliation_id: ReconciliationId,
    ) -> ConsoleResult<ClaimId>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.decide_inline(backend, reconciliation_id, Decision::Approve).await
    }

    pub async fn reject_inline<B>(
        &mut self,
        backend: &B,
        reconciliation_id: ReconciliationId,
    ) -> ConsoleResult<ClaimId>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.decide_inline(backend, reconciliation_id, Decision::Reject).await
    }

    // ------------------------------------------------------------------------
    // Bulk
    // ------------------------------------------------------------------------

    /// Multi-claim rows are never selectable; they need individual review.
    pub fn toggle_bulk_selection(&mut self, reconciliation_id: ReconciliationId) -> ConsoleResult<bool> {
        self.single_claim_row(reconciliation_id)?;
        if self.selected.remove(&reconciliation_id) {
            Ok(false)
        } else {
            self.selected.insert(reconciliation_id);
            Ok(true)
        }
    }

    pub async fn bulk_approve<B>(&mut self, backend: &B) -> ConsoleResult<usize>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let checked = self.session.require_admin("approve claims").and_then(|_| {
            if !self.single_claim_mode {
                Err(ConsoleError::validation(
                    "Bulk approval is only available in single-claim mode",
                ))
            } else if self.selected.is_empty() {
                Err(ConsoleError::validation("Select at least one transaction"))
            } else {
                Ok(())
            }
        });
        self.remember(checked)?;

        let ids = self.selected_ids();
        let result = backend.bulk_approve(&ids).await;
        self.remember(result)?;

        info!(count = ids.len(), "bulk approval accepted");
        self.selected.clear();
        if let Err(err) = self.refresh(backend).await {
            warn!(error = %err, "refresh after bulk approval failed");
        }
        Ok(ids.len())
    }
}

// ============================================================================
// TESTS
// ============================================================================
