//! Consumer registration integration tests
//!
//! These tests run the full router against throwaway identity and encryption
//! authorities served over real HTTP on 127.0.0.1.

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use consumers::{
    config::LocalEncryptionKey,
    consumers::{
        HttpIdentityGate, IdentityGate, LocalSecretEncryptor, RegistrationService,
        RemoteSecretEncryptor, SecretProtector,
    },
    http::{AppState, build_router},
    storage::{ConsumerStore, MemoryConsumerStore},
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

const LOCAL_KEY: [u8; 32] = [42u8; 32];

#[derive(Default)]
struct AuthorityLog {
    verify_calls: AtomicUsize,
    /// (component_id, tenant token, plaintext)
    encrypt_calls: Mutex<Vec<(String, String, String)>>,
}

impl AuthorityLog {
    fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn encrypt_calls(&self) -> Vec<(String, String, String)> {
        self.encrypt_calls.lock().unwrap().clone()
    }
}

async fn verify(State(log): State<Arc<AuthorityLog>>, headers: HeaderMap) -> Response {
    log.verify_calls.fetch_add(1, Ordering::SeqCst);

    let authorization = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    match authorization {
        "Bearer manage" => axum::Json(json!({
            "scopes": ["oauth:manage"],
            "description": "manage token"
        }))
        .into_response(),
        "Bearer reader" => axum::Json(json!({"scopes": ["other:scope"]})).into_response(),
        "Bearer garbled" => "not json".into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Behaviour is picked by component id: `broken`, `silent` and `slow` misbehave
async fn encrypt(
    State(log): State<Arc<AuthorityLog>>,
    Path(component_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let tenant = headers
        .get("X-Tenant-Token")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    log.encrypt_calls
        .lock()
        .unwrap()
        .push((component_id.clone(), tenant.clone(), body.clone()));

    match component_id.as_str() {
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "silent" => StatusCode::OK.into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late".into_response()
        }
        _ => format!("KBC::ComponentSecure::{}::{}::{}", component_id, tenant, body).into_response(),
    }
}

async fn spawn_authority() -> (Url, Arc<AuthorityLog>) {
    let log = Arc::new(AuthorityLog::default());
    let app = Router::new()
        .route("/verify", get(verify))
        .route("/encrypt/{component_id}/encrypt", post(encrypt))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{addr}/")).unwrap(), log)
}

struct TestApp {
    router: Router,
    store: Arc<MemoryConsumerStore>,
    log: Arc<AuthorityLog>,
}

async fn test_app() -> TestApp {
    let (base, log) = spawn_authority().await;
    let verify_url = base.join("verify").unwrap();
    test_app_with(base, verify_url, log)
}

fn test_app_with(base: Url, verify_url: Url, log: Arc<AuthorityLog>) -> TestApp {
    let http_client = reqwest::Client::new();
    let timeout = Duration::from_millis(500);

    let identity_gate: Arc<dyn IdentityGate> = Arc::new(HttpIdentityGate::new(
        http_client.clone(),
        verify_url,
        timeout,
    ));
    let protectors: Vec<Arc<dyn SecretProtector>> = vec![
        Arc::new(RemoteSecretEncryptor::new(
            http_client,
            base.join("encrypt/").unwrap(),
            timeout,
        )),
        Arc::new(LocalSecretEncryptor::new(&LocalEncryptionKey::from_bytes(
            LOCAL_KEY,
        ))),
    ];
    let store = Arc::new(MemoryConsumerStore::new());
    let registration_service = Arc::new(RegistrationService::new(
        identity_gate.clone(),
        protectors,
        store.clone(),
        "oauth:manage".to_string(),
    ));

    let router = build_router(AppState {
        identity_gate,
        registration_service,
        consumer_store: store.clone(),
    });

    TestApp { router, store, log }
}

fn definition(component_id: &str) -> Value {
    json!({
        "component_id": component_id,
        "app_key": "k1",
        "app_secret": "s1",
        "friendly_name": "Slack",
        "oauth_version": "2.0",
        "auth_url": "https://slack.com/oauth/authorize",
        "token_url": "https://slack.com/api/oauth.access"
    })
}

fn register(token: Option<&str>, tenant: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/consumers")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    if let Some(tenant) = tenant {
        builder = builder.header("X-Tenant-Token", tenant);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_register_protects_secret_in_both_layers() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        register(Some("manage"), Some("tenant-1"), &definition("slack")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"status": "created", "component_id": "slack"}));

    assert_eq!(app.log.verify_calls(), 1);
    assert_eq!(
        app.log.encrypt_calls(),
        vec![(
            "slack".to_string(),
            "tenant-1".to_string(),
            "s1".to_string()
        )]
    );

    let record = app.store.get_consumer("slack").await.unwrap().unwrap();
    assert_eq!(
        record.secret_remote_cipher,
        b"KBC::ComponentSecure::slack::tenant-1::s1"
    );
    let local = LocalSecretEncryptor::new(&LocalEncryptionKey::from_bytes(LOCAL_KEY));
    assert_eq!(local.decrypt(&record.secret_local_cipher).unwrap(), b"s1");
}

#[tokio::test]
async fn test_detail_never_exposes_plaintext() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        register(Some("manage"), Some("tenant-1"), &definition("slack")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let request = Request::builder()
        .uri("/consumers/slack")
        .header("Authorization", "Bearer reader")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["component_id"], "slack");
    assert!(!body.to_string().contains("\"s1\""));
    assert!(body.get("app_secret").is_none());
}

#[tokio::test]
async fn test_remote_failures_persist_nothing() {
    for component_id in ["broken", "silent", "slow"] {
        let app = test_app().await;

        let (status, body) = send(
            &app,
            register(Some("manage"), Some("tenant-1"), &definition(component_id)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "{component_id}");
        assert_eq!(body["stage"], "protect_remote");
        assert!(app.store.is_empty(), "{component_id}");
    }
}

#[tokio::test]
async fn test_authorization_failures_make_no_encryption_calls() {
    let app = test_app().await;
    let body = definition("slack");

    let (status, _) = send(&app, register(Some("reader"), Some("tenant-1"), &body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, register(Some("unknown"), Some("tenant-1"), &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, response) = send(&app, register(Some("garbled"), Some("tenant-1"), &body)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(response["stage"], "authorize");

    assert_eq!(app.log.verify_calls(), 3);
    assert!(app.log.encrypt_calls().is_empty());
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_missing_credentials_make_no_calls() {
    let app = test_app().await;
    let body = definition("slack");

    let (status, response) = send(&app, register(None, Some("tenant-1"), &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["stage"], "authorize");

    let (status, response) = send(&app, register(Some("manage"), None, &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(
        response["error_description"]
            .as_str()
            .unwrap()
            .contains("X-Tenant-Token")
    );

    assert_eq!(app.log.verify_calls(), 0);
    assert!(app.log.encrypt_calls().is_empty());
}

#[tokio::test]
async fn test_identity_authority_reports_credential_description() {
    let (base, log) = spawn_authority().await;
    let gate = HttpIdentityGate::new(
        reqwest::Client::new(),
        base.join("verify").unwrap(),
        Duration::from_millis(500),
    );

    let granted = gate.verify("manage").await.unwrap();
    assert!(granted.contains("oauth:manage"));
    assert_eq!(granted.description(), Some("manage token"));

    let granted = gate.verify("reader").await.unwrap();
    assert_eq!(granted.description(), None);
    assert_eq!(log.verify_calls(), 2);
}

#[tokio::test]
async fn test_dot_component_id_is_rejected_before_encryption() {
    let app = test_app().await;

    for component_id in [".", ".."] {
        let (status, body) = send(
            &app,
            register(Some("manage"), Some("tenant-1"), &definition(component_id)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{component_id}");
        assert_eq!(body["stage"], "validate");
    }

    assert!(app.log.encrypt_calls().is_empty());
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_unreachable_identity_authority() {
    let (base, log) = spawn_authority().await;

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let verify_url = Url::parse(&format!("http://127.0.0.1:{port}/verify")).unwrap();

    let app = test_app_with(base, verify_url, log);
    let (status, body) = send(
        &app,
        register(Some("manage"), Some("tenant-1"), &definition("slack")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["stage"], "authorize");
    assert!(app.log.encrypt_calls().is_empty());
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_concurrent_duplicate_registration_has_one_winner() {
    let app = test_app().await;

    let requests = (0..4).map(|_| {
        send(
            &app,
            register(Some("manage"), Some("tenant-1"), &definition("slack")),
        )
    });
    let statuses: Vec<StatusCode> = futures::future::join_all(requests)
        .await
        .into_iter()
        .map(|(status, _)| status)
        .collect();

    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CREATED).count(),
        1
    );
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(),
        3
    );
    assert_eq!(app.store.len(), 1);
}
