// 📊 Reconciliation status view - transactions bucketed by status
//
// Buckets are exclusive views, never combined filters:
//
//   DEFAULT = UNSETTLED + NOT_FOUND   (needs attention)
//   MATCHED = MATCHED                 (backend found a claim)
//   SETTLED = SETTLED                 (done)
//
// Rows already MATCHED or SETTLED cannot be selected, so they can never be
// sent to manual settlement a second time.

use crate::backend::{ReconciliationBackend, StatementUpload};
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{BankTransaction, Page, PageRequest, ReconciliationId, ReconciliationStatus};
use crate::request::{Applied, RequestTicket, RequestTracker};
use crate::session::Session;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Default,
    Matched,
    Settled,
}

impl Bucket {
    pub fn statuses(&self) -> &'static [ReconciliationStatus] {
        match self {
            Bucket::Default => &[ReconciliationStatus::Unsettled, ReconciliationStatus::NotFound],
            Bucket::Matched => &[ReconciliationStatus::Matched],
            Bucket::Settled => &[ReconciliationStatus::Settled],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Bucket::Default => "Needs Attention",
            Bucket::Matched => "Matched",
            Bucket::Settled => "Settled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "unsettled" => Some(Bucket::Default),
            "matched" => Some(Bucket::Matched),
            "settled" => Some(Bucket::Settled),
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Bucket::Default => Bucket::Matched,
            Bucket::Matched => Bucket::Settled,
            Bucket::Settled => Bucket::Default,
        }
    }
}

/// Checkbox enabled?
pub fn is_selectable(row: &BankTransaction) -> bool {
    !row.reconciliation_status.is_resolved()
}

/// Clears the processing flag however the upload ends, including when the
/// future is dropped mid-flight.
struct ProcessingGuard(Arc<AtomicBool>);

impl ProcessingGuard {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        ProcessingGuard(Arc::clone(flag))
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketQuery {
    pub ticket: RequestTicket,
    pub bucket: Bucket,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub file_name: String,
    pub digest: String,
}

/// A started upload. Owns the processing flag, so it can be moved onto a
/// runtime task while the view keeps rendering.
pub struct UploadJob {
    upload: StatementUpload,
    outcome: UploadOutcome,
    refetch_delay: Duration,
    processing: ProcessingGuard,
}

impl UploadJob {
    /// Send the statement, then wait out the processing delay.
    pub async fn run<B>(self, backend: &B) -> ConsoleResult<UploadedStatement>
    where
        B: ReconciliationBackend + ?Sized,
    {
        if let Err(err) = backend.upload_statement(&self.upload).await {
            warn!(file = %self.outcome.file_name, error = %err, "statement upload failed");
            return Err(err);
        }
        info!(file = %self.outcome.file_name, digest = %self.outcome.digest, "statement uploaded");

        // No push channel from the backend; a fixed wait stands in for one.
        tokio::time::sleep(self.refetch_delay).await;
        Ok(UploadedStatement {
            outcome: self.outcome,
            _processing: self.processing,
        })
    }
}

/// Accepted by the backend; the flag stays up until the refetch is done.
pub struct UploadedStatement {
    outcome: UploadOutcome,
    _processing: ProcessingGuard,
}

pub struct StatusView {
    session: Session,
    bucket: Bucket,
    page: u32,
    page_size: u32,
    rows: Page<BankTransaction>,
    selected: BTreeSet<ReconciliationId>,
    processing: Arc<AtomicBool>,
    refetch_delay: Duration,
    loading: bool,
    last_error: Option<String>,
    tracker: RequestTracker,
}

impl StatusView {
    pub fn new(session: Session, page_size: u32, refetch_delay: Duration) -> Self {
        StatusView {
            session,
            bucket: Bucket::Default,
            page: 0,
            page_size,
            rows: Page::default(),
            selected: BTreeSet::new(),
            processing: Arc::new(AtomicBool::new(false)),
            refetch_delay,
            loading: false,
            last_error: None,
            tracker: RequestTracker::new(),
        }
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn rows(&self) -> &Page<BankTransaction> {
        &self.rows
    }

    pub fn selected_ids(&self) -> Vec<ReconciliationId> {
        self.selected.iter().copied().collect()
    }

    pub fn is_selected(&self, id: ReconciliationId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Shared handle so a renderer can watch an upload in flight.
    pub fn processing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.processing)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ------------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------------

    pub fn begin_fetch(&mut self, page: u32) -> BucketQuery {
        self.loading = true;
        BucketQuery {
            ticket: self.tracker.issue(),
            bucket: self.bucket,
            page: PageRequest::at(page, self.page_size),
        }
    }

    pub fn apply_fetch(
        &mut self,
        query: &BucketQuery,
        result: ConsoleResult<Page<BankTransaction>>,
    ) -> ConsoleResult<Applied> {
        if !self.tracker.is_current(query.ticket) || query.bucket != self.bucket {
            debug!(generation = query.ticket.generation(), "discarding stale bucket page");
            return Ok(Applied::Stale);
        }
        self.loading = false;
        match result {
            Ok(rows) => {
                // Selection only ever covers rows that are on screen
                let visible: BTreeSet<_> = rows.content.iter().map(|r| r.id).collect();
                self.selected.retain(|id| visible.contains(id));
                self.rows = rows;
                self.page = query.page.page;
                self.last_error = None;
                Ok(Applied::Fresh)
            }
            Err(err) => {
                self.last_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    pub async fn fetch_page<B>(&mut self, backend: &B, page: u32) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let query = self.begin_fetch(page);
        let result = backend
            .transactions_by_status(query.bucket.statuses(), query.page)
            .await;
        self.apply_fetch(&query, result)
    }

    pub async fn refresh<B>(&mut self, backend: &B) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.fetch_page(backend, self.page).await
    }

    /// Back to page 0 with nothing selected, then fetch.
    pub async fn switch_bucket<B>(&mut self, backend: &B, bucket: Bucket) -> ConsoleResult<Applied>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.tracker.invalidate();
        self.bucket = bucket;
        self.page = 0;
        self.selected.clear();
        self.rows = Page::default();
        self.fetch_page(backend, 0).await
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Returns whether the row is now selected.
    pub fn toggle_selection(&mut self, id: ReconciliationId) -> ConsoleResult<bool> {
        let row = self
            .rows
            .content
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ConsoleError::validation(format!("Transaction {id} is not on this page")))?;

        if !is_selectable(row) {
            return Err(ConsoleError::validation(format!(
                "Transaction {} is already {}",
                row.transaction_id, row.reconciliation_status
            )));
        }

        if self.selected.remove(&id) {
            Ok(false)
        } else {
            self.selected.insert(id);
            Ok(true)
        }
    }

    pub fn select_all_selectable(&mut self) {
        self.selected = self
            .rows
            .content
            .iter()
            .filter(|r| is_selectable(r))
            .map(|r| r.id)
            .collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    fn require_admin(&mut self, action: &str) -> ConsoleResult<()> {
        self.session.require_admin(action).map_err(|err| {
            self.last_error = Some(err.user_message());
            err
        })
    }

    /// One batched request; the batch passes or fails as a whole.
    pub async fn manually_settle<B>(&mut self, backend: &B) -> ConsoleResult<usize>
    where
        B: ReconciliationBackend + ?Sized,
    {
        self.require_admin("settle transactions")?;
        if self.selected.is_empty() {
            return Err(ConsoleError::validation("Select at least one transaction to settle"));
        }
        let ids = self.selected_ids();

        if let Err(err) = backend.manual_settle(&ids).await {
            self.last_error = Some(err.user_message());
            return Err(err);
        }

        info!(count = ids.len(), "transactions settled manually");
        self.selected.clear();
        // The settlement stands even if the list cannot be reloaded
        if let Err(err) = self.refresh(backend).await {
            warn!(error = %err, "refresh after manual settlement failed");
        }
        Ok(ids.len())
    }

    /// Raises the processing flag; nothing is sent yet.
    pub fn begin_upload(&mut self, upload: StatementUpload) -> ConsoleResult<UploadJob> {
        self.require_admin("upload statements")?;
        let outcome = UploadOutcome {
            file_name: upload.file_name.clone(),
            digest: upload.digest(),
        };
        Ok(UploadJob {
            upload,
            outcome,
            refetch_delay: self.refetch_delay,
            processing: ProcessingGuard::raise(&self.processing),
        })
    }

    /// Refetch the active bucket after an accepted upload.
    pub async fn finish_upload<B>(
        &mut self,
        backend: &B,
        result: ConsoleResult<UploadedStatement>,
    ) -> ConsoleResult<UploadOutcome>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let uploaded = match result {
            Ok(uploaded) => uploaded,
            Err(err) => {
                self.last_error = Some(err.user_message());
                return Err(err);
            }
        };
        if let Err(err) = self.refresh(backend).await {
            warn!(file = %uploaded.outcome.file_name, error = %err, "refresh after upload failed");
        }
        Ok(uploaded.outcome)
    }

    /// Upload, wait for the backend to chew on it, refetch.
    pub async fn upload_statement<B>(
        &mut self,
        backend: &B,
        upload: StatementUpload,
    ) -> ConsoleResult<UploadOutcome>
    where
        B: ReconciliationBackend + ?Sized,
    {
        let job = self.begin_upload(upload)?;
        let result = job.run(backend).await;
        self.finish_upload(backend, result).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::fixtures::*;
    use crate::backend::{BackendCall, FakeBackend};
    use crate::session::Role;

    fn admin() -> Session {
        Session::new(1, Role::Admin)
    }

    fn mixed_backend() -> FakeBackend {
        FakeBackend::new().with_transactions(vec![
            bank_transaction(1, ReconciliationStatus::Unsettled),
            bank_transaction(2, ReconciliationStatus::NotFound),
            bank_transaction(3, ReconciliationStatus::Matched),
            bank_transaction(4, ReconciliationStatus::Settled),
            bank_transaction(5, ReconciliationStatus::Unsettled),
        ])
    }

    #[test]
    fn test_bucket_status_sets() {
        assert_eq!(
            Bucket::Default.statuses(),
            &[ReconciliationStatus::Unsettled, ReconciliationStatus::NotFound]
        );
        assert_eq!(Bucket::Matched.statuses(), &[ReconciliationStatus::Matched]);
        assert_eq!(Bucket::Settled.statuses(), &[ReconciliationStatus::Settled]);
        assert_eq!(Bucket::parse("SETTLED"), Some(Bucket::Settled));
        assert_eq!(Bucket::parse("archived"), None);
    }

    #[test]
    fn test_resolved_rows_are_not_selectable() {
        assert!(is_selectable(&bank_transaction(1, ReconciliationStatus::Unsettled)));
        assert!(is_selectable(&bank_transaction(1, ReconciliationStatus::NotFound)));
        assert!(!is_selectable(&bank_transaction(1, ReconciliationStatus::Matched)));
        assert!(!is_selectable(&bank_transaction(1, ReconciliationStatus::Settled)));
    }

    #[tokio::test]
    async fn test_default_bucket_fetches_unsettled_and_not_found() {
        let backend = mixed_backend();
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));

        view.fetch_page(&backend, 0).await.unwrap();

        let ids: Vec<_> = view.rows().content.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 5]);
    }

    #[tokio::test]
    async fn test_switching_bucket_resets_page_and_selection() {
        let backend = mixed_backend();
        let mut view = StatusView::new(admin(), 2, Duration::from_millis(10));
        view.fetch_page(&backend, 1).await.unwrap();
        assert_eq!(view.page(), 1);
        view.toggle_selection(5).unwrap();
        assert_eq!(view.selected_ids(), vec![5]);

        view.switch_bucket(&backend, Bucket::Settled).await.unwrap();

        assert_eq!(view.bucket(), Bucket::Settled);
        assert_eq!(view.page(), 0);
        assert!(view.selected_ids().is_empty());
        assert_eq!(
            backend.calls().last(),
            Some(&BackendCall::TransactionsByStatus {
                statuses: vec![ReconciliationStatus::Settled],
                page: PageRequest::first(2),
            })
        );
    }

    #[tokio::test]
    async fn test_selecting_resolved_row_is_refused() {
        let backend = mixed_backend();
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));
        view.switch_bucket(&backend, Bucket::Matched).await.unwrap();

        assert!(view.toggle_selection(3).is_err());
        view.select_all_selectable();
        assert!(view.selected_ids().is_empty());
    }

    #[tokio::test]
    async fn test_manual_settle_batches_and_refetches() {
        let backend = mixed_backend();
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));
        view.fetch_page(&backend, 0).await.unwrap();
        view.toggle_selection(1).unwrap();
        view.toggle_selection(2).unwrap();

        let settled = view.manually_settle(&backend).await.unwrap();

        assert_eq!(settled, 2);
        assert!(view.selected_ids().is_empty());
        let ids: Vec<_> = view.rows().content.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5]);
        let settle_calls: Vec<_> = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::ManualSettle(_)))
            .collect();
        assert_eq!(settle_calls, vec![BackendCall::ManualSettle(vec![1, 2])]);
    }

    #[tokio::test]
    async fn test_failed_settle_keeps_selection() {
        let backend = mixed_backend();
        backend.fail_next(
            "manual_settle",
            ConsoleError::Server {
                status: 500,
                message: "Settlement service unavailable".to_string(),
            },
        );
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));
        view.fetch_page(&backend, 0).await.unwrap();
        view.toggle_selection(1).unwrap();

        assert!(view.manually_settle(&backend).await.is_err());
        assert_eq!(view.selected_ids(), vec![1]);
        assert_eq!(view.last_error(), Some("Settlement service unavailable"));
    }

    #[tokio::test]
    async fn test_settle_with_empty_selection_is_local() {
        let backend = mixed_backend();
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));

        let err = view.manually_settle(&backend).await.unwrap_err();
        assert!(err.is_local());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_processing_then_delayed_refetch() {
        let backend = mixed_backend();
        let mut view = StatusView::new(admin(), 10, Duration::from_secs(3));
        let flag = view.processing_flag();
        let upload = StatementUpload::new("jan.csv", b"UTR1,5000".to_vec());

        let mut pending = Box::pin(view.upload_statement(&backend, upload));

        // Still inside the refetch delay
        let early = tokio::time::timeout(Duration::from_millis(100), &mut pending).await;
        assert!(early.is_err());
        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(backend.call_count(), 1);

        let outcome = pending.await.unwrap();
        assert_eq!(outcome.file_name, "jan.csv");
        assert!(!flag.load(Ordering::SeqCst));

        let calls = backend.calls();
        assert!(matches!(calls[0], BackendCall::UploadStatement { .. }));
        assert!(matches!(calls[1], BackendCall::TransactionsByStatus { .. }));
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_upload_clears_processing_without_refetch() {
        let backend = mixed_backend();
        backend.fail_next("upload_statement", ConsoleError::Transport("reset".to_string()));
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));

        assert!(view
            .upload_statement(&backend, StatementUpload::new("bad.csv", vec![]))
            .await
            .is_err());
        assert!(!view.is_processing());
        assert_eq!(backend.call_count(), 1);
    }

    #[test]
    fn test_page_from_previous_bucket_is_discarded() {
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));
        let query = view.begin_fetch(0);
        view.tracker.invalidate();
        view.bucket = Bucket::Settled;

        let late = Page::from_items(
            vec![bank_transaction(1, ReconciliationStatus::Unsettled)],
            1,
            query.page,
        );
        assert_eq!(view.apply_fetch(&query, Ok(late)).unwrap(), Applied::Stale);
        assert!(view.rows().is_empty());
    }

    #[tokio::test]
    async fn test_settle_stands_when_refetch_fails() {
        let backend = mixed_backend();
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));
        view.fetch_page(&backend, 0).await.unwrap();
        view.toggle_selection(1).unwrap();
        backend.fail_next("transactions_by_status", ConsoleError::Transport("reset".to_string()));

        let settled = view.manually_settle(&backend).await.unwrap();

        assert_eq!(settled, 1);
        assert!(view.selected_ids().is_empty());
        assert!(backend.calls().contains(&BackendCall::ManualSettle(vec![1])));
        assert!(view.last_error().is_some());
    }

    #[tokio::test]
    async fn test_upload_stands_when_refetch_fails() {
        let backend = mixed_backend();
        backend.fail_next("transactions_by_status", ConsoleError::Transport("reset".to_string()));
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));

        let outcome = view
            .upload_statement(&backend, StatementUpload::new("feb.csv", b"UTR2,700".to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome.file_name, "feb.csv");
        assert!(!view.is_processing());
        let calls = backend.calls();
        assert!(matches!(calls[0], BackendCall::UploadStatement { .. }));
        assert!(matches!(calls[1], BackendCall::TransactionsByStatus { .. }));
    }

    #[tokio::test]
    async fn test_staff_session_cannot_settle_or_upload() {
        let backend = mixed_backend();
        let mut view = StatusView::new(Session::new(2, Role::Staff), 10, Duration::from_millis(10));
        view.fetch_page(&backend, 0).await.unwrap();
        view.toggle_selection(1).unwrap();

        assert!(matches!(
            view.manually_settle(&backend).await,
            Err(ConsoleError::Forbidden(_))
        ));
        assert!(matches!(
            view.upload_statement(&backend, StatementUpload::new("jan.csv", vec![1])).await,
            Err(ConsoleError::Forbidden(_))
        ));
        assert!(!view.is_processing());
        assert_eq!(view.selected_ids(), vec![1]);
        assert_eq!(backend.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_spawned_upload_keeps_flag_up_until_finished() {
        let backend = std::sync::Arc::new(mixed_backend());
        let mut view = StatusView::new(admin(), 10, Duration::from_millis(10));

        let job = view.begin_upload(StatementUpload::new("mar.csv", b"UTR3".to_vec())).unwrap();
        assert!(view.is_processing());
        let shared = std::sync::Arc::clone(&backend);
        let uploaded = tokio::spawn(async move { job.run(shared.as_ref()).await })
            .await
            .unwrap();
        assert!(view.is_processing());

        view.finish_upload(backend.as_ref(), uploaded).await.unwrap();
        assert!(!view.is_processing());
        assert_eq!(backend.call_count(), 2);
    }
}
