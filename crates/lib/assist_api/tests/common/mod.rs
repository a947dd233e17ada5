//! Shared fixtures for the router integration tests: in-memory stores, seeded
//! users, and request helpers driving the router with `oneshot`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use assist_api::{AppState, config::ApiConfig};
use assist_core::auth::password::hash_password_with_cost;
use assist_core::models::audit::AuditEntry;
use assist_core::models::auth::{NewUser, Role, UserRecord};
use assist_core::store::memory::MemoryStore;
use assist_core::store::{AuditStore, StoreResult, Stores, UserStore};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use serde_json::Value;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Contains `<` and `>` so tests notice if passwords get sanitized.
pub const PASSWORD: &str = "Senha<Forte>1";

pub const SECRETARY_CPF: &str = "52998224725";
pub const COORDINATOR_CPF: &str = "12345678909";
pub const BENEFICIARY_CPF: &str = "11144477735";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub users: HashMap<Role, i64>,
    lookups: Arc<CountingUsers>,
}

/// User store that counts CPF lookups before delegating.
struct CountingUsers {
    inner: Arc<MemoryStore>,
    cpf_lookups: AtomicUsize,
}

#[async_trait]
impl UserStore for CountingUsers {
    async fn find_by_cpf(&self, cpf: &str) -> StoreResult<Option<UserRecord>> {
        self.cpf_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_cpf(cpf).await
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, user: NewUser) -> StoreResult<UserRecord> {
        self.inner.create(user).await
    }
}

pub fn config(extra: &[(&str, &str)]) -> ApiConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("JWT_SECRET".to_string(), SECRET.to_string()),
        ("BCRYPT_COST".to_string(), "4".to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    ApiConfig::from_lookup(|k| vars.get(k).cloned()).expect("test config")
}

pub async fn app() -> TestApp {
    app_with(&[]).await
}

/// Test log output, filtered by `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub async fn app_with(extra: &[(&str, &str)]) -> TestApp {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let mut users = HashMap::new();
    for (cpf, name, role) in [
        (SECRETARY_CPF, "Sofia Secretária", Role::Secretary),
        (COORDINATOR_CPF, "Carlos Coordenador", Role::Coordinator),
        (BENEFICIARY_CPF, "Bruna Beneficiária", Role::Beneficiary),
    ] {
        let user = store
            .create(NewUser {
                cpf: cpf.into(),
                name: name.into(),
                email: None,
                password_hash: hash_password_with_cost(PASSWORD, 4).expect("hash"),
                role,
            })
            .await
            .expect("seed user");
        users.insert(role, user.id);
    }

    let lookups = Arc::new(CountingUsers {
        inner: store.clone(),
        cpf_lookups: AtomicUsize::new(0),
    });
    let stores = Stores {
        users: lookups.clone(),
        ..Stores::from_memory(store.clone())
    };
    let state = AppState::new(config(extra), stores);
    TestApp {
        router: assist_api::router(state),
        store,
        users,
        lookups,
    }
}

impl TestApp {
    /// Number of credential lookups by CPF so far.
    pub fn cpf_lookups(&self) -> usize {
        self.lookups.cpf_lookups.load(Ordering::SeqCst)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Log in and return the response body. Panics unless the login succeeds.
    pub async fn login(&self, cpf: &str) -> Value {
        let response = self
            .send(json_request(
                "POST",
                "/auth/login",
                serde_json::json!({ "cpf": cpf, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), 200, "login for {cpf} failed");
        body_json(response).await
    }

    pub async fn access_token(&self, cpf: &str) -> String {
        self.login(cpf).await["accessToken"]
            .as_str()
            .expect("accessToken")
            .to_string()
    }

    /// Audit entries once the background writes have landed.
    pub async fn audit_entries(&self, expected: usize) -> Vec<AuditEntry> {
        for _ in 0..100 {
            let entries = self.store.recent(500).await.expect("audit entries");
            if entries.len() >= expected {
                return entries;
            }
            tokio::task::yield_now().await;
        }
        self.store.recent(500).await.expect("audit entries")
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}
