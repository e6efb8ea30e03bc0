// REST client for the donation backend (reqwest)

use super::{ReconciliationBackend, StatementUpload};
use crate::config::ConsoleConfig;
use crate::error::{extract_server_message, ConsoleError, ConsoleResult};
use crate::models::{
    page_or_list, BankTransaction, ClaimId, ClaimRequest, ClaimSummary, Donation, Page,
    PageRequest, PendingReconciliation, ReconciliationId, ReconciliationStatus, StaffClaim,
    StaffId,
};
use crate::session::Session;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &ConsoleConfig, session: &Session) -> ConsoleResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &session.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ConsoleError::validation(format!("invalid access token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConsoleError::Transport(format!("client setup failed: {e}")))?;

        Ok(HttpBackend {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Mutations carry a fresh idempotency key so a proxy replay is harmless.
    fn mutation(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
            .header(IDEMPOTENCY_KEY, uuid::Uuid::new_v4().to_string())
    }

    #[instrument(name = "backend_send", skip(self, builder, fallback))]
    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
        fallback: &str,
    ) -> ConsoleResult<Response> {
        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "request failed before a response arrived");
            ConsoleError::Transport(e.to_string())
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), "response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_server_message(&body, fallback);
        warn!(status = status.as_u16(), %message, "backend rejected request");
        Err(ConsoleError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        operation: &'static str,
        fallback: &str,
    ) -> ConsoleResult<T> {
        let response = self
            .send(self.request(Method::GET, path).query(query), operation, fallback)
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ConsoleError::Decode(format!("{operation}: {e}")))
    }
}

fn page_query(page: PageRequest) -> Vec<(&'static str, String)> {
    vec![("page", page.page.to_string()), ("size", page.size.to_string())]
}

fn status_list(statuses: &[ReconciliationStatus]) -> String {
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl ReconciliationBackend for HttpBackend {
    async fn staff_transactions(
        &self,
        staff_id: StaffId,
        page: PageRequest,
    ) -> ConsoleResult<Page<BankTransaction>> {
        self.get_json(
            &format!("/reconciliation/transactions/staff/{staff_id}"),
            &page_query(page),
            "staff_transactions",
            "Failed to load reconciliation data",
        )
        .await
    }

    async fn transactions_by_status(
        &self,
        statuses: &[ReconciliationStatus],
        page: PageRequest,
    ) -> ConsoleResult<Page<BankTransaction>> {
        let mut query = page_query(page);
        query.push(("statuses", status_list(statuses)));
        self.get_json(
            "/reconciliation/transactions",
            &query,
            "transactions_by_status",
            "Failed to load transactions",
        )
        .await
    }

    async fn search_donations(
        &self,
        staff_id: StaffId,
        keyword: &str,
        page: PageRequest,
    ) -> ConsoleResult<Page<Donation>> {
        let mut query = vec![
            ("staffId", staff_id.to_string()),
            ("keyword", keyword.to_string()),
        ];
        query.extend(page_query(page));
        self.get_json(
            "/donations/search",
            &query,
            "search_donations",
            "Failed to search donations",
        )
        .await
    }

    async fn create_claim(&self, request: ClaimRequest) -> ConsoleResult<()> {
        let path = format!("/donations/claim/{}/{}", request.donation_id, request.staff_id);
        let builder = self
            .mutation(&path)
            .query(&[("reconciliationId", request.reconciliation_id.to_string())]);
        self.send(builder, "create_claim", "Failed to claim transaction")
            .await
            .map(|_| ())
    }

    async fn staff_claims(&self, staff_id: StaffId) -> ConsoleResult<Vec<StaffClaim>> {
        self.get_json(
            &format!("/donations/disputes/staff/{staff_id}"),
            &[],
            "staff_claims",
            "Failed to load claims",
        )
        .await
    }

    async fn pending_reconciliations(
        &self,
        page: PageRequest,
    ) -> ConsoleResult<Page<PendingReconciliation>> {
        self.get_json(
            "/admin/reconciliation/pending",
            &page_query(page),
            "pending_reconciliations",
            "Failed to load pending claims",
        )
        .await
    }

    async fn claims_for(
        &self,
        reconciliation_id: ReconciliationId,
        page: PageRequest,
    ) -> ConsoleResult<Page<ClaimSummary>> {
        let raw: serde_json::Value = self
            .get_json(
                &format!("/admin/reconciliation/claims/pages/{reconciliation_id}"),
                &page_query(page),
                "claims_for",
                "Failed to load claims",
            )
            .await?;
        page_or_list(raw).map_err(|e| ConsoleError::Decode(format!("claims_for: {e}")))
    }

    async fn single_claim_for(
        &self,
        reconciliation_id: ReconciliationId,
    ) -> ConsoleResult<Option<ClaimSummary>> {
        let raw: serde_json::Value = self
            .get_json(
                &format!("/admin/reconciliation/claims/{reconciliation_id}"),
                &page_query(PageRequest::first(1)),
                "single_claim_for",
                "Failed to fetch claim",
            )
            .await?;
        let page: Page<ClaimSummary> = page_or_list(raw)
            .map_err(|e| ConsoleError::Decode(format!("single_claim_for: {e}")))?;
        Ok(page.content.into_iter().next())
    }

    async fn approve_claim(&self, claim_id: ClaimId) -> ConsoleResult<()> {
        self.send(
            self.mutation(&format!("/donations/approve-claim/{claim_id}")),
            "approve_claim",
            "Approval failed",
        )
        .await
        .map(|_| ())
    }

    async fn reject_claim(&self, claim_id: ClaimId) -> ConsoleResult<()> {
        self.send(
            self.mutation(&format!("/donations/dispute/reject/{claim_id}")),
            "reject_claim",
            "Reject failed",
        )
        .await
        .map(|_| ())
    }

    async fn bulk_approve(&self, reconciliation_ids: &[ReconciliationId]) -> ConsoleResult<()> {
        self.send(
            self.mutation("/admin/reconciliation/bulk-approve")
                .json(reconciliation_ids),
            "bulk_approve",
            "Bulk approval failed",
        )
        .await
        .map(|_| ())
    }

    async fn manual_settle(&self, reconciliation_ids: &[ReconciliationId]) -> ConsoleResult<()> {
        self.send(
            self.mutation("/reconciliation/manual-settle")
                .json(reconciliation_ids),
            "manual_settle",
            "Manual settlement failed",
        )
        .await
        .map(|_| ())
    }

    async fn upload_statement(&self, upload: &StatementUpload) -> ConsoleResult<()> {
        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let builder = self
            .request(Method::POST, "/batch/upload")
            .header(IDEMPOTENCY_KEY, upload.digest())
            .multipart(form);
        self.send(builder, "upload_statement", "Upload failed")
            .await
            .map(|_| ())
    }
}
