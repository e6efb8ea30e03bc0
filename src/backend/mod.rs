// Backend contract - the only way the console touches data
//
// Matching, settlement, numbering and uniqueness all happen behind this
// trait. Implementations: `HttpBackend` (the real REST service),
// `FakeBackend` (in-memory, records calls) and `JournaledBackend` (wraps
// either and writes successful mutations to the local journal).

pub mod fake;
pub mod http;
pub mod journaled;

pub use fake::{BackendCall, FakeBackend};
pub use http::HttpBackend;
pub use journaled::JournaledBackend;

use crate::error::ConsoleResult;
use crate::models::{
    BankTransaction, ClaimId, ClaimRequest, ClaimSummary, Donation, Page, PageRequest,
    PendingReconciliation, ReconciliationId, ReconciliationStatus, StaffClaim, StaffId,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;

#[async_trait]
pub trait ReconciliationBackend: Send + Sync {
    /// Unclaimed transactions offered to one staff member
    async fn staff_transactions(
        &self,
        staff_id: StaffId,
        page: PageRequest,
    ) -> ConsoleResult<Page<BankTransaction>>;

    /// Transactions whose status is any of `statuses`
    async fn transactions_by_status(
        &self,
        statuses: &[ReconciliationStatus],
        page: PageRequest,
    ) -> ConsoleResult<Page<BankTransaction>>;

    /// The staff member's own donations, filtered by donor name or amount
    async fn search_donations(
        &self,
        staff_id: StaffId,
        keyword: &str,
        page: PageRequest,
    ) -> ConsoleResult<Page<Donation>>;

    async fn create_claim(&self, request: ClaimRequest) -> ConsoleResult<()>;

    async fn staff_claims(&self, staff_id: StaffId) -> ConsoleResult<Vec<StaffClaim>>;

    /// Admin list: transactions with open claims
    async fn pending_reconciliations(
        &self,
        page: PageRequest,
    ) -> ConsoleResult<Page<PendingReconciliation>>;

    async fn claims_for(
        &self,
        reconciliation_id: ReconciliationId,
        page: PageRequest,
    ) -> ConsoleResult<Page<ClaimSummary>>;

    /// First claim on a single-claim transaction, for inline decisions
    async fn single_claim_for(
        &self,
        reconciliation_id: ReconciliationId,
    ) -> ConsoleResult<Option<ClaimSummary>>;

    async fn approve_claim(&self, claim_id: ClaimId) -> ConsoleResult<()>;

    async fn reject_claim(&self, claim_id: ClaimId) -> ConsoleResult<()>;

    /// Approve the single claim on each listed transaction
    async fn bulk_approve(&self, reconciliation_ids: &[ReconciliationId]) -> ConsoleResult<()>;

    async fn manual_settle(&self, reconciliation_ids: &[ReconciliationId]) -> ConsoleResult<()>;

    /// Hand a statement to the backend; processing continues server-side
    async fn upload_statement(&self, upload: &StatementUpload) -> ConsoleResult<()>;
}

/// A bank statement file about to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl StatementUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        StatementUpload {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "statement".to_string());
        Ok(StatementUpload { file_name, bytes })
    }

    /// SHA-256 of the file contents. Doubles as the upload's idempotency
    /// key: the same statement uploaded twice carries the same key.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_content_addressed() {
        let a = StatementUpload::new("jan.csv", b"date,amount\n2025-01-02,5000\n".to_vec());
        let b = StatementUpload::new("renamed.csv", a.bytes.clone());
        let c = StatementUpload::new("jan.csv", b"date,amount\n2025-01-02,5001\n".to_vec());

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_from_path_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hdfc-march.xlsx");
        std::fs::write(&path, b"bytes").unwrap();

        let upload = StatementUpload::from_path(&path).unwrap();
        assert_eq!(upload.file_name, "hdfc-march.xlsx");
        assert_eq!(upload.bytes, b"bytes");
    }
}
