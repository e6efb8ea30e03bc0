// In-memory backend that records every call
//
// Serves canned data with just enough behaviour for the console to be
// exercised end to end: searches filter, approvals flip a claim's status,
// manual settlement marks rows SETTLED. It performs no matching.

use super::{ReconciliationBackend, StatementUpload};
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    BankTransaction, ClaimId, ClaimRequest, ClaimSummary, DisputeStatus, Donation, Page,
    PageRequest, PendingReconciliation, ReconciliationId, ReconciliationStatus, StaffClaim,
    StaffId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    StaffTransactions { staff_id: StaffId, page: PageRequest },
    TransactionsByStatus { statuses: Vec<ReconciliationStatus>, page: PageRequest },
    SearchDonations { staff_id: StaffId, keyword: String, page: PageRequest },
    CreateClaim(ClaimRequest),
    StaffClaims(StaffId),
    PendingReconciliations(PageRequest),
    ClaimsFor { reconciliation_id: ReconciliationId, page: PageRequest },
    SingleClaimFor(ReconciliationId),
    ApproveClaim(ClaimId),
    RejectClaim(ClaimId),
    BulkApprove(Vec<ReconciliationId>),
    ManualSettle(Vec<ReconciliationId>),
    UploadStatement { file_name: String, digest: String },
}

impl BackendCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            BackendCall::CreateClaim(_)
                | BackendCall::ApproveClaim(_)
                | BackendCall::RejectClaim(_)
                | BackendCall::BulkApprove(_)
                | BackendCall::ManualSettle(_)
                | BackendCall::UploadStatement { .. }
        )
    }
}

#[derive(Default)]
struct FakeState {
    transactions: Vec<BankTransaction>,
    donations: Vec<(StaffId, Donation)>,
    pending: Vec<PendingReconciliation>,
    claims: HashMap<ReconciliationId, Vec<ClaimSummary>>,
    staff_claims: Vec<(StaffId, StaffClaim)>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<BackendCall>>,
    /// Errors handed out by the next call whose name matches
    failures: Mutex<HashMap<&'static str, ConsoleError>>,
}

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    let start = (page.page as usize).saturating_mul(page.size as usize);
    let content = items
        .iter()
        .skip(start)
        .take(page.size as usize)
        .cloned()
        .collect();
    Page::from_items(content, items.len() as u64, page)
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    pub fn with_transactions(self, transactions: Vec<BankTransaction>) -> Self {
        self.lock_state().transactions = transactions;
        self
    }

    pub fn with_donations(self, staff_id: StaffId, donations: Vec<Donation>) -> Self {
        self.lock_state()
            .donations
            .extend(donations.into_iter().map(|d| (staff_id, d)));
        self
    }

    pub fn with_pending(self, pending: Vec<PendingReconciliation>) -> Self {
        self.lock_state().pending = pending;
        self
    }

    pub fn with_claims(self, reconciliation_id: ReconciliationId, claims: Vec<ClaimSummary>) -> Self {
        self.lock_state().claims.insert(reconciliation_id, claims);
        self
    }

    pub fn with_staff_claims(self, staff_id: StaffId, claims: Vec<StaffClaim>) -> Self {
        self.lock_state()
            .staff_claims
            .extend(claims.into_iter().map(|c| (staff_id, c)));
        self
    }

    /// Make the next call to `operation` (trait method name) fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: ConsoleError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(operation, error);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    pub fn claim_status(&self, claim_id: ClaimId) -> Option<DisputeStatus> {
        self.lock_state()
            .claims
            .values()
            .flatten()
            .find(|c| c.id == claim_id)
            .map(|c| c.dispute_status)
    }

    pub fn transaction_status(&self, id: ReconciliationId) -> Option<ReconciliationStatus> {
        self.lock_state()
            .transactions
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.reconciliation_status)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: BackendCall, operation: &'static str) -> ConsoleResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        match self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(operation)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn decide(&self, claim_id: ClaimId, outcome: DisputeStatus) -> ConsoleResult<()> {
        let mut state = self.lock_state();
        let mut settled_txn = None;

        for (reconciliation_id, claims) in state.claims.iter_mut() {
            if let Some(claim) = claims.iter_mut().find(|c| c.id == claim_id) {
                if claim.dispute_status.is_terminal() {
                    return Err(ConsoleError::Server {
                        status: 409,
                        message: format!("Claim {claim_id} is already {:?}", claim.dispute_status),
                    });
                }
                claim.dispute_status = outcome;
                settled_txn = Some(*reconciliation_id);
                break;
            }
        }

        let Some(reconciliation_id) = settled_txn else {
            return Err(ConsoleError::Server {
                status: 404,
                message: format!("Claim {claim_id} not found"),
            });
        };

        if outcome == DisputeStatus::Approved {
            state.pending.retain(|p| p.reconciliation_id != reconciliation_id);
            if let Some(tx) = state.transactions.iter_mut().find(|t| t.id == reconciliation_id) {
                tx.reconciliation_status = ReconciliationStatus::Settled;
            }
        } else if let Some(row) = state
            .pending
            .iter_mut()
            .find(|p| p.reconciliation_id == reconciliation_id)
        {
            row.claims_count = row.claims_count.saturating_sub(1);
        }
        state.pending.retain(|p| p.claims_count > 0);
        Ok(())
    }
}

#[async_trait]
impl ReconciliationBackend for FakeBackend {
    async fn staff_transactions(
        &self,
        staff_id: StaffId,
        page: PageRequest,
    ) -> ConsoleResult<Page<BankTransaction>> {
        self.record(BackendCall::StaffTransactions { staff_id, page }, "staff_transactions")?;
        let state = self.lock_state();
        let open: Vec<_> = state
            .transactions
            .iter()
            .filter(|t| !t.reconciliation_status.is_resolved())
            .cloned()
            .collect();
        Ok(paginate(&open, page))
    }

    async fn transactions_by_status(
        &self,
        statuses: &[ReconciliationStatus],
        page: PageRequest,
    ) -> ConsoleResult<Page<BankTransaction>> {
        self.record(
            BackendCall::TransactionsByStatus {
                statuses: statuses.to_vec(),
                page,
            },
            "transactions_by_status",
        )?;
        let state = self.lock_state();
        let rows: Vec<_> = state
            .transactions
            .iter()
            .filter(|t| statuses.contains(&t.reconciliation_status))
            .cloned()
            .collect();
        Ok(paginate(&rows, page))
    }

    async fn search_donations(
        &self,
        staff_id: StaffId,
        keyword: &str,
        page: PageRequest,
    ) -> ConsoleResult<Page<Donation>> {
        self.record(
            BackendCall::SearchDonations {
                staff_id,
                keyword: keyword.to_string(),
                page,
            },
            "search_donations",
        )?;
        let needle = keyword.trim().to_lowercase();
        let state = self.lock_state();
        let hits: Vec<_> = state
            .donations
            .iter()
            .filter(|(owner, _)| *owner == staff_id)
            .map(|(_, d)| d)
            .filter(|d| {
                needle.is_empty()
                    || d.donor.name.to_lowercase().contains(&needle)
                    || format!("{}", d.amount).contains(&needle)
            })
            .cloned()
            .collect();
        Ok(paginate(&hits, page))
    }

    async fn create_claim(&self, request: ClaimRequest) -> ConsoleResult<()> {
        self.record(BackendCall::CreateClaim(request), "create_claim")?;
        let mut state = self.lock_state();
        if let Some(tx) = state
            .transactions
            .iter_mut()
            .find(|t| t.id == request.reconciliation_id)
        {
            tx.claims_count += 1;
        }
        Ok(())
    }

    async fn staff_claims(&self, staff_id: StaffId) -> ConsoleResult<Vec<StaffClaim>> {
        self.record(BackendCall::StaffClaims(staff_id), "staff_claims")?;
        Ok(self
            .lock_state()
            .staff_claims
            .iter()
            .filter(|(owner, _)| *owner == staff_id)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn pending_reconciliations(
        &self,
        page: PageRequest,
    ) -> ConsoleResult<Page<PendingReconciliation>> {
        self.record(BackendCall::PendingReconciliations(page), "pending_reconciliations")?;
        Ok(paginate(&self.lock_state().pending, page))
    }

    async fn claims_for(
        &self,
        reconciliation_id: ReconciliationId,
        page: PageRequest,
    ) -> ConsoleResult<Page<ClaimSummary>> {
        self.record(
            BackendCall::ClaimsFor {
                reconciliation_id,
                page,
            },
            "claims_for",
        )?;
        let state = self.lock_state();
        let claims = state
            .claims
            .get(&reconciliation_id)
            .cloned()
            .unwrap_or_default();
        Ok(paginate(&claims, page))
    }

    async fn single_claim_for(
        &self,
        reconciliation_id: ReconciliationId,
    ) -> ConsoleResult<Option<ClaimSummary>> {
        self.record(BackendCall::SingleClaimFor(reconciliation_id), "single_claim_for")?;
        Ok(self
            .lock_state()
            .claims
            .get(&reconciliation_id)
            .and_then(|claims| claims.first().cloned()))
    }

    async fn approve_claim(&self, claim_id: ClaimId) -> ConsoleResult<()> {
        self.record(BackendCall::ApproveClaim(claim_id), "approve_claim")?;
        self.decide(claim_id, DisputeStatus::Approved)
    }

    async fn reject_claim(&self, claim_id: ClaimId) -> ConsoleResult<()> {
        self.record(BackendCall::RejectClaim(claim_id), "reject_claim")?;
        self.decide(claim_id, DisputeStatus::Rejected)
    }

    async fn bulk_approve(&self, reconciliation_ids: &[ReconciliationId]) -> ConsoleResult<()> {
        self.record(BackendCall::BulkApprove(reconciliation_ids.to_vec()), "bulk_approve")?;
        let claim_ids: Vec<ClaimId> = {
            let state = self.lock_state();
            reconciliation_ids
                .iter()
                .filter_map(|id| state.claims.get(id))
                .filter_map(|claims| claims.first())
                .map(|c| c.id)
                .collect()
        };
        for claim_id in claim_ids {
            self.decide(claim_id, DisputeStatus::Approved)?;
        }
        Ok(())
    }

    async fn manual_settle(&self, reconciliation_ids: &[ReconciliationId]) -> ConsoleResult<()> {
        self.record(BackendCall::ManualSettle(reconciliation_ids.to_vec()), "manual_settle")?;
        let mut state = self.lock_state();
        for tx in state
            .transactions
            .iter_mut()
            .filter(|t| reconciliation_ids.contains(&t.id))
        {
            tx.reconciliation_status = ReconciliationStatus::Settled;
        }
        Ok(())
    }

    async fn upload_statement(&self, upload: &StatementUpload) -> ConsoleResult<()> {
        self.record(
            BackendCall::UploadStatement {
                file_name: upload.file_name.clone(),
                digest: upload.digest(),
            },
            "upload_statement",
        )
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Row builders shared by the unit tests and the integration tests.
pub mod fixtures {
    use crate::models::*;

    pub fn bank_transaction(id: ReconciliationId, status: ReconciliationStatus) -> BankTransaction {
        BankTransaction {
            id,
            transaction_id: format!("UTR{:06}", id),
            transaction_amount: 5000.0,
            transaction_date: "2025-01-15".to_string(),
            transaction_mode: "UPI".to_string(),
            reconciliation_status: status,
            claims_count: 0,
        }
    }

    pub fn donation(id: DonationId, donor: &str, amount: f64) -> Donation {
        Donation {
            id,
            donor: DonorRef {
                id: Some(id * 10),
                name: donor.to_string(),
            },
            amount,
            donation_date: Some("2025-01-14".to_string()),
            transaction_id: None,
            donation_campaign: None,
            donation_source: Some("UPI".to_string()),
            status: Some(DonationStatus::Completed),
            receipt_sent: Some(false),
            ack_sent: Some(false),
            form80_sent: Some(false),
        }
    }

    pub fn pending(reconciliation_id: ReconciliationId, claims_count: u32) -> PendingReconciliation {
        PendingReconciliation {
            reconciliation_id,
            bank_transaction_id: format!("UTR{:06}", reconciliation_id),
            bank_amount: Some(5000.0),
            bank_date: "2025-01-15".to_string(),
            transaction_mode: "NEFT".to_string(),
            claims_count,
        }
    }

    pub fn claim(id: ClaimId, staff: &str, status: DisputeStatus) -> ClaimSummary {
        ClaimSummary {
            id,
            staff_name: staff.to_string(),
            donor_name: "Ramesh Gupta".to_string(),
            donation_amount: 5000.0,
            claimed_at: Some("2025-01-16T10:00:00".to_string()),
            dispute_status: status,
        }
    }
}
