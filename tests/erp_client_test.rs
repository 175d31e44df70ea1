//! ERP client tests against an in-process mock OData server.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use secondcheck::config::ErpConfig;
use secondcheck::erp::{ErpApi, ErpClient, ErpError, VerificationFields};
use secondcheck::humanize::ByteSize;

const USER: &str = "svc";
const KEY: &str = "web-service-key";

#[derive(Default)]
struct MockErp {
    /// Bumped on every job-list read so each read observes a fresh etag
    etag_reads: AtomicU32,
    /// PATCH attempts that should fail with a token mismatch before success
    patch_failures: AtomicU32,
    patches: Mutex<Vec<(String, Value)>>,
}

impl MockErp {
    fn current_etag(&self) -> String {
        format!("W/\"etag-{}\"", self.etag_reads.load(Ordering::SeqCst))
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Basic {}", BASE64.encode(format!("{USER}:{KEY}")));
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false)
}

async fn collection(
    State(state): State<Arc<MockErp>>,
    Path(entity): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match entity.as_str() {
        "JobListEntries" => {
            state.etag_reads.fetch_add(1, Ordering::SeqCst);
            Json(json!({
                "value": [{
                    "@odata.etag": state.current_etag(),
                    "Job_No": "J069026",
                    "Description": "Pump overhaul",
                    "Bill_to_Name": "Contoso Ltd",
                    "_x0031_st_Check_Date": "2024-01-10",
                    "_x0031_st_Check_By": "MILLER",
                    "_x0032_nd_Check_By": ""
                }]
            }))
            .into_response()
        }
        "JobLedgerEntries" => Json(json!({
            "value": [{
                "Entry_No": 101,
                "Job_No": "J069026",
                "Document_No": "Q1001",
                "Posting_Date": "2024-01-09",
                "Quantity": 4.0,
                "Total_Cost": 1000.0
            }]
        }))
        .into_response(),
        "SalesQuotes" => Json(json!({
            "value": [{
                "No": "Q1001",
                "Sell_to_Customer_Name": "Contoso Ltd",
                "Document_Date": "2024-01-05",
                "Amount": 1000.0
            }]
        }))
        .into_response(),
        "SalesQuoteLines" => Json(json!({
            "value": [
                {"Document_No": "Q1001", "Line_No": 10000, "No": "ITEM-1", "Quantity": 2.0, "Unit_Price": 250.0, "Line_Amount": 500.0},
                {"Document_No": "Q1001", "Line_No": 20000, "No": "ITEM-2", "Quantity": 1.0, "Unit_Price": 500.0, "Line_Amount": 500.0}
            ]
        }))
        .into_response(),
        "SalesInvoices" => Json(json!({"value": []})).into_response(),
        "JobAttachmentLinks" => Json(json!({
            "value": [{
                "Job_No": "J069026",
                "Attachment_Links": "https://sp.example/a.pdf, https://sp.example/b.pdf"
            }]
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn entity_patch(
    State(state): State<Arc<MockErp>>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !entity.starts_with("JobListEntries('") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let presented = headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let mismatch = presented != state.current_etag();
    let forced_failure = state
        .patch_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();

    if mismatch || forced_failure {
        return StatusCode::PRECONDITION_FAILED.into_response();
    }

    state.patches.lock().unwrap().push((entity, body));
    StatusCode::OK.into_response()
}

async fn download(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"Quote 4.pdf\"".to_string(),
            ),
        ],
        b"%PDF-1.7 fake quote".to_vec(),
    )
        .into_response()
}

async fn start_server(state: Arc<MockErp>) -> String {
    let app = Router::new()
        .route("/odata/{entity}", get(collection).patch(entity_patch))
        .route("/files/quote.pdf", get(download))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    format!("http://{addr}")
}

fn client_for(base: &str) -> ErpClient {
    let config = ErpConfig {
        base_url: format!("{base}/odata"),
        username: Some(USER.to_string()),
        access_key: Some(KEY.to_string()),
        ..ErpConfig::default()
    };
    ErpClient::new(&config, 3).unwrap()
}

#[tokio::test]
async fn fetches_job_list_entry_with_encoded_fields() {
    let state = Arc::new(MockErp::default());
    let base = start_server(state).await;
    let client = client_for(&base);

    let entry = client.fetch_job_list_entry("J069026").await.unwrap();
    assert_eq!(entry.job_no, "J069026");
    assert_eq!(entry.first_check_date, "2024-01-10");
    assert_eq!(entry.first_check_by, "MILLER");
    assert!(entry.second_check_by.is_empty());
    assert!(entry.etag.starts_with("W/"));
}

#[tokio::test]
async fn fetches_ledger_quote_and_links() {
    let state = Arc::new(MockErp::default());
    let base = start_server(state).await;
    let client = client_for(&base);

    let ledger = client.fetch_ledger_entries("J069026").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].document_no, "Q1001");

    let quote = client.fetch_sales_quote("Q1001").await.unwrap();
    assert_eq!(quote.header.no, "Q1001");
    assert_eq!(quote.lines.len(), 2);

    let links = client.fetch_attachment_links("J069026").await.unwrap();
    assert_eq!(links.urls().len(), 2);

    assert!(matches!(
        client.fetch_sales_invoice("I1").await,
        Err(ErpError::NotFound(_))
    ));
}

#[tokio::test]
async fn download_uses_content_disposition_name() {
    let state = Arc::new(MockErp::default());
    let base = start_server(state).await;
    let client = client_for(&base);

    let document = client
        .download_document(&format!("{base}/files/quote.pdf"))
        .await
        .unwrap();
    assert_eq!(document.file_name, "Quote 4.pdf");
    assert_eq!(document.content_type, "application/pdf");
    assert!(document.bytes.starts_with(b"%PDF-1.7"));
}

#[tokio::test]
async fn writeback_retries_past_a_token_mismatch() {
    let state = Arc::new(MockErp::default());
    state.patch_failures.store(1, Ordering::SeqCst);
    let base = start_server(state.clone()).await;
    let client = client_for(&base);

    let fields = VerificationFields {
        date: "2024-01-11".to_string(),
        time: "09:30:00".to_string(),
        checker: "AI LLM Service".to_string(),
        comment: "Job J069026 passed verification with no discrepancies.".to_string(),
    };
    client
        .update_verification_fields("J069026", &fields)
        .await
        .unwrap();

    let patches = state.patches.lock().unwrap();
    assert_eq!(patches.len(), 1);
    let (entity, body) = &patches[0];
    assert_eq!(entity, "JobListEntries('J069026')");
    assert_eq!(body["_x0032_nd_Check_Date"], "2024-01-11");
    assert_eq!(body["_x0032_nd_Check_By"], "AI LLM Service");
    assert!(
        body["Verification_Comment"]
            .as_str()
            .unwrap()
            .contains("passed verification")
    );
}

#[tokio::test]
async fn writeback_gives_up_after_the_retry_budget() {
    let state = Arc::new(MockErp::default());
    state.patch_failures.store(100, Ordering::SeqCst);
    let base = start_server(state.clone()).await;
    let client = client_for(&base);

    let fields = VerificationFields {
        date: "2024-01-11".to_string(),
        time: "09:30:00".to_string(),
        checker: "AI LLM Service".to_string(),
        comment: "comment".to_string(),
    };
    let err = client
        .update_verification_fields("J069026", &fields)
        .await
        .unwrap_err();
    assert_eq!(err.attempts, 3);
    assert!(state.patches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bad_credentials_surface_as_auth() {
    let state = Arc::new(MockErp::default());
    let base = start_server(state).await;

    let config = ErpConfig {
        base_url: format!("{base}/odata"),
        username: Some(USER.to_string()),
        access_key: Some("wrong".to_string()),
        ..ErpConfig::default()
    };
    let client = ErpClient::new(&config, 3).unwrap();

    assert!(matches!(
        client.fetch_job_list_entry("J069026").await,
        Err(ErpError::Auth)
    ));
}

#[tokio::test]
async fn oversized_responses_are_rejected() {
    let state = Arc::new(MockErp::default());
    let base = start_server(state).await;

    let config = ErpConfig {
        base_url: format!("{base}/odata"),
        username: Some(USER.to_string()),
        access_key: Some(KEY.to_string()),
        max_response_bytes: ByteSize(16),
        ..ErpConfig::default()
    };
    let client = ErpClient::new(&config, 3).unwrap();

    let err = client.fetch_job_list_entry("J069026").await.unwrap_err();
    assert!(matches!(err, ErpError::Transport(msg) if msg.contains("too large")));
}
