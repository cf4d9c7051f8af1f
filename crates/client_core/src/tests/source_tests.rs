use super::*;
use crate::BreachQueryEngine;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;
use shared::domain::FilterMode;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

#[derive(Clone)]
struct UpstreamState {
    status: StatusCode,
    body: String,
    hits: Arc<AtomicUsize>,
    user_agent: Arc<Mutex<Option<String>>>,
}

async fn serve_breaches(
    State(state): State<UpstreamState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.user_agent.lock().await = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.body.clone(),
    )
}

async fn spawn_upstream(
    status: StatusCode,
    body: String,
) -> anyhow::Result<(String, UpstreamState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = UpstreamState {
        status,
        body,
        hits: Arc::new(AtomicUsize::new(0)),
        user_agent: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/api/v3/breaches", get(serve_breaches))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api/v3/breaches"), state))
}

fn wire_breach(name: &str, verified: bool) -> serde_json::Value {
    json!({
        "Name": name,
        "Title": format!("{name} Ltd"),
        "Domain": format!("{}.example", name.to_lowercase()),
        "BreachDate": "2019-05-01",
        "AddedDate": "2019-06-01T10:00:00Z",
        "ModifiedDate": "2019-06-01T10:00:00Z",
        "PwnCount": 12345,
        "Description": "Accounts were exposed.",
        "LogoPath": "https://logos.example/logo.png",
        "DataClasses": ["Email addresses", "Passwords"],
        "IsVerified": verified,
        "IsFabricated": false,
        "IsSensitive": false,
        "IsRetired": false,
        "IsSpamList": false,
        "IsMalware": false,
        "IsSubscriptionFree": false
    })
}

struct CountingSource {
    records: Vec<BreachRecord>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingSource {
    fn new(count: usize, failures: usize) -> Self {
        let records = (0..count)
            .map(|i| BreachRecord {
                name: format!("Breach{i}"),
                title: format!("Breach {i}"),
                domain: format!("b{i}.example"),
                breach_date: String::new(),
                added_date: String::new(),
                modified_date: String::new(),
                pwn_count: i as u64,
                description: String::new(),
                logo_path: String::new(),
                data_classes: Vec::new(),
                is_verified: i % 2 == 0,
                is_fabricated: false,
                is_sensitive: false,
                is_retired: false,
                is_spam_list: false,
                is_malware: false,
                is_subscription_free: false,
            })
            .collect();
        Self {
            records,
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BreachDataSource for CountingSource {
    fn mode(&self) -> FetchMode {
        FetchMode::Bulk
    }

    async fn fetch(&self, page: Option<PageRequest>) -> Result<Vec<BreachRecord>, FetchError> {
        assert!(page.is_none(), "bulk source must not receive page requests");
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(FetchError::transport("Failed to fetch breaches: reset by peer"));
        }
        Ok(self.records.clone())
    }
}

fn page(index: usize, size: usize) -> Option<PageRequest> {
    Some(PageRequest { index, size })
}

fn names(records: &[BreachRecord]) -> Vec<&str> {
    records.iter().map(|r| r.name.as_str()).collect()
}

#[tokio::test]
async fn http_source_fetches_and_decodes_breach_list() {
    let body = json!([wire_breach("Adobe", true), wire_breach("Dropbox", false)]).to_string();
    let (endpoint, upstream) = spawn_upstream(StatusCode::OK, body).await.expect("spawn");
    let source = HttpBreachSource::new(&endpoint).expect("source");

    assert_eq!(source.mode(), FetchMode::Bulk);
    let records = source.fetch(None).await.expect("fetch");

    assert_eq!(names(&records), vec!["Adobe", "Dropbox"]);
    assert_eq!(records[0].pwn_count, 12345);
    assert_eq!(records[0].data_classes, vec!["Email addresses", "Passwords"]);
    assert!(records[0].is_verified);
    assert!(!records[1].is_verified);
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        upstream.user_agent.lock().await.as_deref(),
        Some(DEFAULT_USER_AGENT)
    );
}

#[tokio::test]
async fn http_source_sends_configured_user_agent() {
    let (endpoint, upstream) = spawn_upstream(StatusCode::OK, "[]".to_string())
        .await
        .expect("spawn");
    let source = HttpBreachSource::with_user_agent(&endpoint, "breach-tests/1.0").expect("source");

    let records = source.fetch(None).await.expect("fetch");

    assert!(records.is_empty());
    assert_eq!(
        upstream.user_agent.lock().await.as_deref(),
        Some("breach-tests/1.0")
    );
}

#[tokio::test]
async fn http_source_maps_error_status_to_status_failure() {
    let (endpoint, _upstream) =
        spawn_upstream(StatusCode::SERVICE_UNAVAILABLE, "down".to_string())
            .await
            .expect("spawn");
    let source = HttpBreachSource::new(&endpoint).expect("source");

    let err = source.fetch(None).await.expect_err("must fail");

    assert_eq!(err.kind(), FetchErrorKind::Status);
    assert!(err.message().starts_with("Failed to fetch breaches:"));
    assert!(err.message().contains("503"));
}

#[tokio::test]
async fn http_source_rejects_non_array_body() {
    let body = wire_breach("Adobe", true).to_string();
    let (endpoint, _upstream) = spawn_upstream(StatusCode::OK, body).await.expect("spawn");
    let source = HttpBreachSource::new(&endpoint).expect("source");

    let err = source.fetch(None).await.expect_err("must fail");

    assert_eq!(err.kind(), FetchErrorKind::Decode);
    assert!(err.message().starts_with("Failed to fetch breaches:"));
}

#[tokio::test]
async fn http_source_tolerates_sparse_entries() {
    let body = json!([{ "Name": "Sparse", "Title": "Sparse", "Domain": "sparse.example" }])
        .to_string();
    let (endpoint, _upstream) = spawn_upstream(StatusCode::OK, body).await.expect("spawn");
    let source = HttpBreachSource::new(&endpoint).expect("source");

    let records = source.fetch(None).await.expect("fetch");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pwn_count, 0);
    assert!(records[0].data_classes.is_empty());
}

#[tokio::test]
async fn http_source_reports_unreachable_upstream_as_transport_failure() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let source = HttpBreachSource::new(&format!("http://{addr}/breaches")).expect("source");

    let err = source.fetch(None).await.expect_err("must fail");

    assert_eq!(err.kind(), FetchErrorKind::Transport);
    assert!(!err.message().is_empty());
}

#[test]
fn rejects_invalid_or_unsupported_endpoints() {
    assert!(matches!(
        HttpBreachSource::new("not a url"),
        Err(SourceConfigError::InvalidEndpoint { .. })
    ));
    assert!(matches!(
        HttpBreachSource::new("ftp://breaches.example/list"),
        Err(SourceConfigError::UnsupportedScheme { .. })
    ));
    let source = HttpBreachSource::new(DEFAULT_ENDPOINT).expect("default endpoint");
    assert_eq!(source.endpoint().as_str(), DEFAULT_ENDPOINT);
}

#[tokio::test]
async fn paged_source_serves_slices_from_one_inner_fetch() {
    let inner = Arc::new(CountingSource::new(5, 0));
    let paged = PagedSource::new(Arc::clone(&inner), 2).expect("paged");

    assert_eq!(paged.mode(), FetchMode::Paged { page_size: 2 });
    let first = paged.fetch(page(0, 2)).await.expect("page 0");
    let second = paged.fetch(page(1, 2)).await.expect("page 1");
    let third = paged.fetch(page(2, 2)).await.expect("page 2");
    let beyond = paged.fetch(page(3, 2)).await.expect("page 3");

    assert_eq!(names(&first), vec!["Breach0", "Breach1"]);
    assert_eq!(names(&second), vec!["Breach2", "Breach3"]);
    assert_eq!(names(&third), vec!["Breach4"]);
    assert!(beyond.is_empty());
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn paged_source_retries_inner_fetch_after_failure() {
    let inner = Arc::new(CountingSource::new(3, 1));
    let paged = PagedSource::new(Arc::clone(&inner), 2).expect("paged");

    let err = paged.fetch(page(0, 2)).await.expect_err("first fails");
    assert_eq!(err.kind(), FetchErrorKind::Transport);

    let first = paged.fetch(page(0, 2)).await.expect("retry succeeds");
    assert_eq!(names(&first), vec!["Breach0", "Breach1"]);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn paged_source_rejects_zero_page_size() {
    assert!(matches!(
        PagedSource::new(CountingSource::new(1, 0), 0),
        Err(SourceConfigError::ZeroPageSize)
    ));
}

#[tokio::test]
async fn engine_pages_through_http_upstream_until_exhausted() {
    let body = json!([
        wire_breach("Adobe", true),
        wire_breach("Canva", true),
        wire_breach("Dropbox", false),
        wire_breach("LinkedIn", true),
        wire_breach("MySpace", false)
    ])
    .to_string();
    let (endpoint, upstream) = spawn_upstream(StatusCode::OK, body).await.expect("spawn");
    let http = HttpBreachSource::new(&endpoint).expect("source");
    let engine = BreachQueryEngine::new(Arc::new(PagedSource::new(http, 2).expect("paged")));
    engine.set_filter_mode(FilterMode::Verified);

    while let Some(handle) = engine.load() {
        handle.await.expect("fetch task");
    }

    let state = engine.snapshot();
    assert!(state.is_exhausted());
    assert_eq!(state.all_records().len(), 5);
    assert_eq!(state.next_page(), 3);
    let visible: Vec<&str> = state
        .visible_records()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(visible, vec!["Adobe", "Canva", "LinkedIn"]);
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}
