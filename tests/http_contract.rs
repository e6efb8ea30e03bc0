// HTTP contract tests: HttpBackend against a stub REST server (axum)

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use donation_console::backend::http::IDEMPOTENCY_KEY;
use donation_console::{
    ActionJournal, ClaimRequest, ConsoleConfig, ConsoleError, HttpBackend, JournalAction,
    JournaledBackend, PageRequest, ReconciliationBackend, ReconciliationStatus, Role, Session,
    StatementUpload, StatusView,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    idempotency_key: Option<String>,
    authorization: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct Stub {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn last(&self) -> Seen {
        self.seen().last().cloned().expect("no request reached the stub")
    }
}

fn page(content: Value, total: u64) -> Value {
    json!({ "content": content, "totalElements": total, "number": 0, "size": 10 })
}

fn transaction(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "transactionId": format!("UTR{id:06}"),
        "transactionAmount": 5000.0,
        "transactionDate": "2025-01-15",
        "transactionMode": "UPI",
        "reconciliationStatus": status,
        "claimsCount": 0
    })
}

async fn handle(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    stub.seen.lock().unwrap().push(Seen {
        method: method.clone(),
        path: uri.path().to_string(),
        query: query.clone(),
        idempotency_key: header(IDEMPOTENCY_KEY),
        authorization: header("authorization"),
        body: body.to_vec(),
    });

    let ok = |value: Value| (StatusCode::OK, Json(value)).into_response();

    match (method.as_str(), uri.path()) {
        ("GET", "/api/reconciliation/transactions/staff/3") => {
            ok(page(json!([transaction(7, "UNCLAIMED")]), 1))
        }
        ("GET", "/api/reconciliation/transactions") => {
            ok(page(json!([transaction(1, "UNSETTLED"), transaction(2, "NOT_FOUND")]), 2))
        }
        ("GET", "/api/donations/search") => ok(page(
            json!([{ "id": 1, "donor": { "name": "Ramesh Gupta" }, "amount": 5000.0 }]),
            1,
        )),
        ("GET", "/api/donations/disputes/staff/3") => ok(json!([{
            "id": 40,
            "bankTransactionId": "UTR000007",
            "bankAmount": 5000.0,
            "donationAmount": 5000.0,
            "donorName": "Ramesh Gupta",
            "disputeStatus": "APPROVED",
            "claimedAt": "2025-01-16T10:00:00",
            "reviewedAt": "2025-01-17T09:30:00"
        }])),
        ("GET", "/api/admin/reconciliation/pending") if query.get("page").map(String::as_str) == Some("99") => {
            ok(json!({ "content": "not a list" }))
        }
        ("GET", "/api/admin/reconciliation/pending") => ok(page(
            json!([{ "reconciliationId": 10, "bankTransactionId": "UTR000010", "claimsCount": 1 }]),
            1,
        )),
        // Bare array instead of a page
        ("GET", "/api/admin/reconciliation/claims/pages/10") => ok(json!([
            { "id": 100, "staffName": "Anjali", "donorName": "Ramesh Gupta", "donationAmount": 5000.0, "disputeStatus": "CREATED" }
        ])),
        ("GET", "/api/admin/reconciliation/claims/pages/11") => ok(page(
            json!([{ "id": 110, "staffName": "Rahul", "disputeStatus": "REJECTED" }]),
            4,
        )),
        ("GET", "/api/admin/reconciliation/claims/12") => ok(page(
            json!([{ "id": 120, "staffName": "Meena", "disputeStatus": "CREATED" }]),
            1,
        )),
        ("GET", "/api/admin/reconciliation/claims/13") => ok(json!([])),
        ("PUT", "/api/donations/approve-claim/999") => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detailedMessage": "  ", "message": "Claim already approved" })),
        )
            .into_response(),
        ("PUT", "/api/donations/dispute/reject/998") => {
            (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>").into_response()
        }
        ("PUT", "/api/donations/claim/1/3") if query.contains_key("reconciliationId") => {
            ok(json!({ "status": "CREATED" }))
        }
        ("PUT", _) | ("POST", "/api/batch/upload") => ok(json!({})),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "error": "no such route" }))).into_response(),
    }
}

async fn spawn_stub() -> (String, Stub) {
    let stub = Stub::default();
    let app = Router::new().fallback(handle).with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api"), stub)
}

fn backend_for(api_url: &str, session: &Session) -> HttpBackend {
    let config = ConsoleConfig {
        api_url: api_url.to_string(),
        request_timeout: Duration::from_secs(5),
        ..ConsoleConfig::default()
    };
    HttpBackend::new(&config, session).unwrap()
}

#[tokio::test]
async fn test_list_endpoints_send_paths_and_paging() {
    let (url, stub) = spawn_stub().await;
    let backend = backend_for(&url, &Session::new(3, Role::Staff));

    let staff = backend
        .staff_transactions(3, PageRequest::at(2, 10))
        .await
        .unwrap();
    assert_eq!(staff.content[0].reconciliation_status, ReconciliationStatus::Unclaimed);
    let seen = stub.last();
    assert_eq!(seen.query["page"], "2");
    assert_eq!(seen.query["size"], "10");

    backend
        .transactions_by_status(
            &[ReconciliationStatus::Unsettled, ReconciliationStatus::NotFound],
            PageRequest::first(10),
        )
        .await
        .unwrap();
    assert_eq!(stub.last().query["statuses"], "UNSETTLED,NOT_FOUND");

    let donations = backend
        .search_donations(3, "ramesh", PageRequest::first(5))
        .await
        .unwrap();
    assert_eq!(donations.content[0].donor.name, "Ramesh Gupta");
    let seen = stub.last();
    assert_eq!(seen.query["staffId"], "3");
    assert_eq!(seen.query["keyword"], "ramesh");

    let mine = backend.staff_claims(3).await.unwrap();
    assert_eq!(mine[0].reviewed_at.as_deref(), Some("2025-01-17T09:30:00"));

    // Reads never carry an idempotency key
    assert!(stub.seen().iter().all(|s| s.idempotency_key.is_none()));
}

#[tokio::test]
async fn test_claims_accept_bare_array_and_page() {
    let (url, _stub) = spawn_stub().await;
    let backend = backend_for(&url, &Session::new(1, Role::Admin));

    let bare = backend.claims_for(10, PageRequest::first(1)).await.unwrap();
    assert_eq!(bare.content.len(), 1);
    assert_eq!(bare.total_elements, 1);

    let paged = backend.claims_for(11, PageRequest::first(10)).await.unwrap();
    assert_eq!(paged.total_elements, 4);
    assert!(paged.content[0].dispute_status.is_terminal());
}

#[tokio::test]
async fn test_inline_claim_lookup_uses_unpaged_path() {
    let (url, stub) = spawn_stub().await;
    let backend = backend_for(&url, &Session::new(1, Role::Admin));

    let claim = backend.single_claim_for(12).await.unwrap().unwrap();
    assert_eq!(claim.id, 120);
    let seen = stub.last();
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.path, "/api/admin/reconciliation/claims/12");
    assert_eq!(seen.query["page"], "0");
    assert_eq!(seen.query["size"], "1");

    assert!(backend.single_claim_for(13).await.unwrap().is_none());
}

#[tokio::test]
async fn test_mutations_carry_fresh_idempotency_keys() {
    let (url, stub) = spawn_stub().await;
    let backend = backend_for(&url, &Session::new(3, Role::Staff));

    backend
        .create_claim(ClaimRequest {
            donation_id: 1,
            staff_id: 3,
            reconciliation_id: 7,
        })
        .await
        .unwrap();
    let claim = stub.last();
    assert_eq!(claim.method, Method::PUT);
    assert_eq!(claim.path, "/api/donations/claim/1/3");
    assert_eq!(claim.query["reconciliationId"], "7");

    backend.approve_claim(5).await.unwrap();
    let approve = stub.last();
    assert_eq!(approve.path, "/api/donations/approve-claim/5");

    assert!(claim.idempotency_key.is_some());
    assert_ne!(claim.idempotency_key, approve.idempotency_key);
}

#[tokio::test]
async fn test_batch_endpoints_send_id_arrays() {
    let (url, stub) = spawn_stub().await;
    let backend = backend_for(&url, &Session::new(1, Role::Admin));

    backend.bulk_approve(&[10, 12]).await.unwrap();
    let bulk = stub.last();
    assert_eq!(bulk.path, "/api/admin/reconciliation/bulk-approve");
    assert_eq!(serde_json::from_slice::<Value>(&bulk.body).unwrap(), json!([10, 12]));

    backend.manual_settle(&[4]).await.unwrap();
    let settle = stub.last();
    assert_eq!(settle.path, "/api/reconciliation/manual-settle");
    assert_eq!(serde_json::from_slice::<Value>(&settle.body).unwrap(), json!([4]));
}

#[tokio::test]
async fn test_upload_is_multipart_keyed_by_digest() {
    let (url, stub) = spawn_stub().await;
    let backend = backend_for(&url, &Session::new(1, Role::Admin));
    let upload = StatementUpload::new("hdfc-jan.csv", b"date,amount\n2025-01-02,5000\n".to_vec());

    backend.upload_statement(&upload).await.unwrap();

    let seen = stub.last();
    assert_eq!(seen.method, Method::POST);
    assert_eq!(seen.path, "/api/batch/upload");
    assert_eq!(seen.idempotency_key.as_deref(), Some(upload.digest().as_str()));
    let body = String::from_utf8_lossy(&seen.body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"hdfc-jan.csv\""));
    assert!(body.contains("2025-01-02,5000"));
}

#[tokio::test]
async fn test_error_messages_follow_the_body() {
    let (url, _stub) = spawn_stub().await;
    let backend = backend_for(&url, &Session::new(1, Role::Admin));

    let err = backend.approve_claim(999).await.unwrap_err();
    assert_eq!(
        err,
        ConsoleError::Server {
            status: 400,
            message: "Claim already approved".to_string()
        }
    );

    // Unreadable body falls back to the operation's message
    let err = backend.reject_claim(998).await.unwrap_err();
    assert_eq!(err.user_message(), "Reject failed");

    let err = backend
        .pending_reconciliations(PageRequest::at(99, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Decode(_)));
    assert_eq!(err.user_message(), "Unexpected response from the server");
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = backend_for(&format!("http://{addr}/api"), &Session::new(1, Role::Admin));
    let err = backend
        .pending_reconciliations(PageRequest::first(10))
        .await
        .unwrap_err();

    assert!(matches!(err, ConsoleError::Transport(_)));
    assert_eq!(err.user_message(), "Network error: could not reach the server");
}

#[tokio::test]
async fn test_access_token_is_sent_as_bearer() {
    let (url, stub) = spawn_stub().await;
    let session = Session::new(1, Role::Admin).with_token("t0k3n");
    let backend = backend_for(&url, &session);

    backend
        .pending_reconciliations(PageRequest::first(10))
        .await
        .unwrap();

    assert_eq!(stub.last().authorization.as_deref(), Some("Bearer t0k3n"));
}

#[tokio::test]
async fn test_upload_then_refetch_is_journaled() {
    let (url, stub) = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let journal = ActionJournal::open(&dir.path().join("journal.db")).unwrap();
    let backend = JournaledBackend::new(backend_for(&url, &Session::new(1, Role::Admin)), journal, 1);

    let mut view = StatusView::new(Session::new(1, Role::Admin), 10, Duration::from_millis(10));
    let outcome = view
        .upload_statement(&backend, StatementUpload::new("jan.csv", b"x".to_vec()))
        .await
        .unwrap();

    assert_eq!(outcome.file_name, "jan.csv");
    assert_eq!(view.rows().content.len(), 2);
    assert!(!view.is_processing());
    let paths: Vec<_> = stub.seen().into_iter().map(|s| s.path).collect();
    assert_eq!(paths, vec!["/api/batch/upload", "/api/reconciliation/transactions"]);

    let recent = backend.with_journal(|j| j.recent(5)).unwrap();
    assert_eq!(recent[0].action, JournalAction::StatementUploaded);
    assert_eq!(recent[0].subject, format!("statement:{}", outcome.digest));
}
