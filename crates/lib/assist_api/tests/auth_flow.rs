//! End-to-end auth flows through the full middleware stack.

mod common;

use assist_core::models::audit::AuditAction;
use assist_core::models::auth::Role;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{
    BENEFICIARY_CPF, COORDINATOR_CPF, PASSWORD, SECRETARY_CPF, app, authed, body_json, get,
    json_request,
};
use serde_json::json;

fn refresh_request(token: &str) -> Request<Body> {
    json_request("POST", "/auth/refresh", json!({ "refreshToken": token }))
}

#[tokio::test]
async fn login_returns_token_pair_and_cookie() {
    let app = app().await;
    let response = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "cpf": "529.982.247-25", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("refresh cookie")
        .to_string();
    assert!(cookie.starts_with("assist_refresh="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/auth"));

    let body = body_json(response).await;
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 28_800);
    assert_eq!(body["refreshToken"].as_str().unwrap().len(), 64);
    assert!(cookie.contains(body["refreshToken"].as_str().unwrap()));
    assert_eq!(body["user"]["role"], "secretary");
    assert_eq!(body["user"]["name"], "Sofia Secretária");
    assert_eq!(body["user"]["id"], app.users[&Role::Secretary]);
    assert_eq!(body["principal"]["id"], app.users[&Role::Secretary]);
    assert_eq!(body["principal"]["role"], "secretary");
    assert!(body["principal"]["issuedAt"].is_string());
    assert!(body["principal"]["expiresAt"].is_string());
}

#[tokio::test]
async fn unknown_cpf_and_wrong_password_look_the_same() {
    let app = app().await;
    let unknown = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "cpf": "11122233396", "password": PASSWORD }),
        ))
        .await;
    let wrong = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "cpf": SECRETARY_CPF, "password": "not-the-password" }),
        ))
        .await;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let unknown = body_json(unknown).await;
    assert_eq!(unknown["error"], "invalid_credentials");
    assert_eq!(unknown, body_json(wrong).await);
}

#[tokio::test]
async fn malformed_cpf_is_rejected_before_lookup() {
    let app = app().await;
    let response = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "cpf": "000.000.000-00", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
    assert_eq!(app.cpf_lookups(), 0);

    app.login(SECRETARY_CPF).await;
    assert_eq!(app.cpf_lookups(), 1);
}

#[tokio::test]
async fn missing_login_fields_are_a_validation_error() {
    let app = app().await;
    let response = app
        .send(json_request("POST", "/auth/login", json!({ "cpf": SECRETARY_CPF })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
}

#[tokio::test]
async fn me_requires_a_valid_access_token() {
    let app = app().await;

    let response = app.send(get("/auth/me")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthenticated");

    let response = app.send(authed("GET", "/auth/me", "not.a.jwt")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "token_invalid");

    let token = app.access_token(COORDINATOR_CPF).await;
    let response = app.send(authed("GET", "/auth/me", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], app.users[&Role::Coordinator]);
    assert_eq!(body["role"], "coordinator");
}

#[tokio::test]
async fn refresh_tokens_are_single_use() {
    let app = app().await;
    let first = app.login(BENEFICIARY_CPF).await["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app.send(refresh_request(&first)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    let second = rotated["refreshToken"].as_str().unwrap();
    assert_ne!(second, first);
    assert!(rotated["accessToken"].is_string());
    assert_eq!(rotated["principal"]["role"], "beneficiary");

    let replay = app.send(refresh_request(&first)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(replay).await["error"], "token_revoked");

    let unknown = app.send(refresh_request("deadbeef")).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(unknown).await["error"], "token_not_found");

    let ok = app.send(refresh_request(second)).await;
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_accepts_the_cookie() {
    let app = app().await;
    let token = app.login(SECRETARY_CPF).await["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .header(header::COOKIE, format!("assist_refresh={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let missing = app
        .send(Request::post("/auth/refresh").body(Body::empty()).unwrap())
        .await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await["error"], "token_not_found");
}

#[tokio::test]
async fn logout_revokes_and_is_idempotent() {
    let app = app().await;
    let token = app.login(BENEFICIARY_CPF).await["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();
    let logout = || json_request("POST", "/auth/logout", json!({ "refreshToken": token }));

    let response = app.send(logout()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cleared.starts_with("assist_refresh=;") || cleared.starts_with("assist_refresh=\"\""));
    assert!(cleared.contains("Max-Age=0"));

    assert_eq!(app.send(logout()).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        app.send(Request::post("/auth/logout").body(Body::empty()).unwrap())
            .await
            .status(),
        StatusCode::NO_CONTENT
    );

    let response = app.send(refresh_request(&token)).await;
    assert_eq!(body_json(response).await["error"], "token_revoked");

    let entries = app.audit_entries(2).await;
    let logouts: Vec<_> = entries
        .iter()
        .filter(|e| e.action == AuditAction::Logout)
        .collect();
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0].actor_id, Some(app.users[&Role::Beneficiary]));
}

#[tokio::test]
async fn audit_logs_are_limited_to_staff() {
    let app = app().await;

    let beneficiary = app.access_token(BENEFICIARY_CPF).await;
    let response = app.send(authed("GET", "/api/audit-logs", &beneficiary)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "forbidden");

    let response = app.send(get("/api/audit-logs")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let secretary = app.access_token(SECRETARY_CPF).await;
    app.audit_entries(2).await;
    let response = app
        .send(authed("GET", "/api/audit-logs?limit=10", &secretary))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let entries = body_json(response).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["action"] == "LOGIN"));
    assert_eq!(entries[0]["userId"], app.users[&Role::Secretary]);
    assert_eq!(entries[0]["details"]["role"], "secretary");
    assert_eq!(entries[1]["userId"], app.users[&Role::Beneficiary]);

    let response = app
        .send(authed("GET", "/api/audit-logs?limit=many", &secretary))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn secretary_can_revoke_all_sessions_of_a_user() {
    let app = app().await;
    let beneficiary_id = app.users[&Role::Beneficiary];
    let first = app.login(BENEFICIARY_CPF).await["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();
    app.login(BENEFICIARY_CPF).await;
    let uri = format!("/api/users/{beneficiary_id}/sessions");

    let coordinator = app.access_token(COORDINATOR_CPF).await;
    let response = app.send(authed("DELETE", &uri, &coordinator)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let secretary = app.access_token(SECRETARY_CPF).await;
    let response = app.send(authed("DELETE", &uri, &secretary)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "revoked": 2 }));

    let response = app.send(refresh_request(&first)).await;
    assert_eq!(body_json(response).await["error"], "token_revoked");

    let response = app
        .send(authed("DELETE", "/api/users/abc/sessions", &secretary))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Four logins, then the revocation.
    let entries = app.audit_entries(5).await;
    let deletion = entries
        .iter()
        .find(|e| e.action == AuditAction::Delete)
        .expect("revocation is audited");
    assert_eq!(deletion.resource, "users");
    assert_eq!(deletion.resource_id.as_deref(), Some(beneficiary_id.to_string().as_str()));
    assert_eq!(deletion.actor_id, Some(app.users[&Role::Secretary]));
}
