// Backend decorator that journals confirmed mutations

use super::{ReconciliationBackend, StatementUpload};
use crate::error::ConsoleResult;
use crate::journal::{ActionJournal, ActionRecord, JournalAction};
use crate::models::{
    BankTransaction, ClaimId, ClaimRequest, ClaimSummary, Donation, Page, PageRequest,
    PendingReconciliation, ReconciliationId, ReconciliationStatus, StaffClaim, StaffId,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use tracing::warn;

pub struct JournaledBackend<B> {
    inner: B,
    journal: Mutex<ActionJournal>,
    actor_staff_id: StaffId,
}

impl<B: ReconciliationBackend> JournaledBackend<B> {
    pub fn new(inner: B, journal: ActionJournal, actor_staff_id: StaffId) -> Self {
        JournaledBackend {
            inner,
            journal: Mutex::new(journal),
            actor_staff_id,
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Run `f` against the journal (for listing from the console).
    pub fn with_journal<T>(&self, f: impl FnOnce(&ActionJournal) -> T) -> T {
        let journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
        f(&journal)
    }

    // The backend already committed; a journal failure is logged, not raised.
    fn note(&self, action: JournalAction, subject: String, detail: serde_json::Value) {
        let record = ActionRecord::new(action, subject, self.actor_staff_id, detail);
        let journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = journal.record(&record) {
            warn!(error = %err, action = action.as_str(), "journal write failed");
        }
    }
}

fn id_list(ids: &[ReconciliationId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl<B: ReconciliationBackend> ReconciliationBackend for JournaledBackend<B> {
    async fn staff_transactions(
        &self,
        staff_id: StaffId,
        page: PageRequest,
    ) -> ConsoleResult<Page<BankTransaction>> {
        self.inner.staff_transactions(staff_id, page).await
    }

    async fn transactions_by_status(
        &self,
        statuses: &[ReconciliationStatus],
        page: PageRequest,
    ) -> ConsoleResult<Page<BankTransaction>> {
        self.inner.transactions_by_status(statuses, page).await
    }

    async fn search_donations(
        &self,
        staff_id: StaffId,
        keyword: &str,
        page: PageRequest,
    ) -> ConsoleResult<Page<Donation>> {
        self.inner.search_donations(staff_id, keyword, page).await
    }

    async fn create_claim(&self, request: ClaimRequest) -> ConsoleResult<()> {
        self.inner.create_claim(request).await?;
        self.note(
            JournalAction::ClaimCreated,
            format!("reconciliation:{}", request.reconciliation_id),
            json!({ "donationId": request.donation_id, "staffId": request.staff_id }),
        );
        Ok(())
    }

    async fn staff_claims(&self, staff_id: StaffId) -> ConsoleResult<Vec<StaffClaim>> {
        self.inner.staff_claims(staff_id).await
    }

    async fn pending_reconciliations(
        &self,
        page: PageRequest,
    ) -> ConsoleResult<Page<PendingReconciliation>> {
        self.inner.pending_reconciliations(page).await
    }

    async fn claims_for(
        &self,
        reconciliation_id: ReconciliationId,
        page: PageRequest,
    ) -> ConsoleResult<Page<ClaimSummary>> {
        self.inner.claims_for(reconciliation_id, page).await
    }

    async fn single_claim_for(
        &self,
        reconciliation_id: ReconciliationId,
    ) -> ConsoleResult<Option<ClaimSummary>> {
        self.inner.single_claim_for(reconciliation_id).await
    }

    async fn approve_claim(&self, claim_id: ClaimId) -> ConsoleResult<()> {
        self.inner.approve_claim(claim_id).await?;
        self.note(JournalAction::ClaimApproved, format!("claim:{claim_id}"), json!({}));
        Ok(())
    }

    async fn reject_claim(&self, claim_id: ClaimId) -> ConsoleResult<()> {
        self.inner.reject_claim(claim_id).await?;
        self.note(JournalAction::ClaimRejected, format!("claim:{claim_id}"), json!({}));
        Ok(())
    }

    async fn bulk_approve(&self, reconciliation_ids: &[ReconciliationId]) -> ConsoleResult<()> {
        self.inner.bulk_approve(reconciliation_ids).await?;
        self.note(
            JournalAction::BulkApproved,
            format!("reconciliation:{}", id_list(reconciliation_ids)),
            json!({ "count": reconciliation_ids.len() }),
        );
        Ok(())
    }

    async fn manual_settle(&self, reconciliation_ids: &[ReconciliationId]) -> ConsoleResult<()> {
        self.inner.manual_settle(reconciliation_ids).await?;
        self.note(
            JournalAction::ManuallySettled,
            format!("reconciliation:{}", id_list(reconciliation_ids)),
            json!({ "count": reconciliation_ids.len() }),
        );
        Ok(())
    }

    async fn upload_statement(&self, upload: &StatementUpload) -> ConsoleResult<()> {
        self.inner.upload_statement(upload).await?;
        self.note(
            JournalAction::StatementUploaded,
            format!("statement:{}", upload.digest()),
            json!({ "fileName": upload.file_name, "bytes": upload.bytes.len() }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::fixtures::*;
    use crate::backend::FakeBackend;
    use crate::error::ConsoleError;
    use crate::models::DisputeStatus;

    fn journaled(fake: FakeBackend) -> JournaledBackend<FakeBackend> {
        JournaledBackend::new(fake, ActionJournal::open_in_memory().unwrap(), 1)
    }

    #[tokio::test]
    async fn test_successful_mutation_is_journaled() {
        let backend = journaled(
            FakeBackend::new()
                .with_pending(vec![pending(10, 1)])
                .with_claims(10, vec![claim(100, "Anjali", DisputeStatus::Created)]),
        );

        backend.approve_claim(100).await.unwrap();

        let recent = backend.with_journal(|j| j.recent(5)).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, JournalAction::ClaimApproved);
        assert_eq!(recent[0].subject, "claim:100");
        assert_eq!(recent[0].actor_staff_id, 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_is_not_journaled() {
        let fake = FakeBackend::new();
        fake.fail_next(
            "manual_settle",
            ConsoleError::Server {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let backend = journaled(fake);

        assert!(backend.manual_settle(&[1, 2]).await.is_err());
        assert_eq!(backend.with_journal(|j| j.count()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reads_are_not_journaled() {
        let backend = journaled(FakeBackend::new());
        backend
            .pending_reconciliations(PageRequest::first(10))
            .await
            .unwrap();
        assert_eq!(backend.with_journal(|j| j.count()).unwrap(), 0);
        assert_eq!(backend.inner().call_count(), 1);
    }
}
