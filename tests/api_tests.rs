use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use sokoni::config::Config;
use sokoni::db::{NewUser, Role};
use std::sync::Arc;
use tower::ServiceExt;

async fn spawn_app() -> (Router, Arc<sokoni::api::AppState>) {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.server.secure_cookies = false;

    let state = sokoni::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    let router = sokoni::api::router(state.clone())
        .await
        .expect("Failed to build router");

    (router, state)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_request_with_cookie(
    method: &str,
    uri: &str,
    cookie: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Cookie", cookie)
        .header("Content-Type", "application/json");

    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("set-cookie")
        .expect("response should set a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn sign_up(app: &Router, username: &str, email: &str, password: &str) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

async fn login(app: &Router, identifier: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "identifier": identifier, "password": password }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (app, _state) = spawn_app().await;

    for uri in ["/api/auth/me", "/api/businesses", "/api/admin/users"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn health_is_public() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn signup_login_me_flow() {
    let (app, _state) = spawn_app().await;

    sign_up(&app, "biz1", "biz1@example.com", "Secret123!").await;

    // Email and username sign-in both verify the same stored credential.
    let cookie = login(&app, "biz1@example.com", "Secret123!").await;
    let _ = login(&app, "biz1", "Secret123!").await;

    let response = app
        .clone()
        .oneshot(json_request_with_cookie("GET", "/api/auth/me", &cookie, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["user"]["username"], "biz1");
    assert_eq!(body["data"]["user"]["role"], "user");
    assert_eq!(body["data"]["auth"]["is_authenticated"], true);
    assert_eq!(body["data"]["auth"]["is_admin"], false);
    assert_eq!(body["data"]["auth"]["is_user"], true);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let (app, _state) = spawn_app().await;

    sign_up(&app, "biz1", "biz1@example.com", "Secret123!").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({
                "username": "biz1",
                "email": "other@example.com",
                "password": "Secret123!",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_failures_share_one_generic_message() {
    let (app, _state) = spawn_app().await;

    sign_up(&app, "biz1", "biz1@example.com", "Secret123!").await;

    let wrong_password = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "identifier": "biz1@example.com", "password": "WrongPass" }),
        ))
        .await
        .unwrap();

    let unknown_identity = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "identifier": "ghost@example.com", "password": "Secret123!" }),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_identity.status(), StatusCode::UNAUTHORIZED);

    // The two failure bodies are byte-identical: nothing discloses which
    // factor was wrong.
    let a = body_json(wrong_password).await;
    let b = body_json(unknown_identity).await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn failed_logins_are_recorded_as_attempts() {
    let (app, state) = spawn_app().await;

    sign_up(&app, "biz1", "biz1@example.com", "Secret123!").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "identifier": "biz1@example.com", "password": "WrongPass" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let _ = login(&app, "biz1@example.com", "Secret123!").await;

    let (attempts, _) = state
        .store()
        .audit_repo()
        .login_attempts(1, 10, None)
        .await
        .unwrap();

    let failures: Vec<_> = attempts.iter().filter(|a| !a.success).collect();
    let successes: Vec<_> = attempts.iter().filter(|a| a.success).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(successes.len(), 1);
    assert!(failures[0].failure_reason.is_some());
}

#[tokio::test]
async fn admin_routes_are_forbidden_to_plain_users() {
    let (app, state) = spawn_app().await;

    sign_up(&app, "biz1", "biz1@example.com", "Secret123!").await;
    let user_cookie = login(&app, "biz1@example.com", "Secret123!").await;

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "GET",
            "/api/admin/users",
            &user_cookie,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admins are provisioned out of band, never via sign-in.
    state
        .store()
        .create_user(
            NewUser {
                username: "root".to_string(),
                email: "root@example.com".to_string(),
                password: Some("RootSecret1!".to_string()),
                ..Default::default()
            },
            Role::Admin,
        )
        .await
        .unwrap();

    let admin_cookie = login(&app, "root@example.com", "RootSecret1!").await;

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "GET",
            "/api/admin/users",
            &admin_cookie,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["data"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn federated_first_contact_provisions_a_user_role_account() {
    let (app, state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/federated",
            serde_json::json!({
                "federated_id": "google-oauth2|12345",
                "email": "mapped@example.com",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["user"]["role"], "user");
    assert_eq!(body["data"]["user"]["has_federated_identity"], true);
    assert_eq!(body["data"]["auth"]["is_admin"], false);

    let user = state
        .store()
        .find_user_by_federated_id("google-oauth2|12345")
        .await
        .unwrap()
        .expect("federated user persisted");
    assert!(user.last_login.is_some());

    // Second sign-in reuses the record instead of creating another.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/federated",
            serde_json::json!({
                "federated_id": "google-oauth2|12345",
                "email": "mapped@example.com",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn two_factor_lifecycle_over_the_api() {
    let (app, _state) = spawn_app().await;

    sign_up(&app, "biz1", "biz1@example.com", "Secret123!").await;
    let cookie = login(&app, "biz1@example.com", "Secret123!").await;

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            "/api/auth/2fa/setup",
            &cookie,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let codes: Vec<String> = body["data"]["backup_codes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap().to_string())
        .collect();
    assert_eq!(codes.len(), 8);

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            "/api/auth/2fa/enable",
            &cookie,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request_with_cookie("GET", "/api/auth/2fa", &cookie, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["enabled"], true);
    assert_eq!(body["data"]["remaining_backup_codes"], 8);

    // A backup code works exactly once.
    let consume = serde_json::json!({ "code": codes[0] });
    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            "/api/auth/2fa/backup/consume",
            &cookie,
            Some(consume.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            "/api/auth/2fa/backup/consume",
            &cookie,
            Some(consume),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn business_crud_with_admin_verification() {
    let (app, state) = spawn_app().await;

    sign_up(&app, "owner", "owner@example.com", "Secret123!").await;
    let cookie = login(&app, "owner@example.com", "Secret123!").await;

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            "/api/businesses",
            &cookie,
            Some(serde_json::json!({
                "name": "Mama Njeri Grocers",
                "category": "retail",
                "region": "nairobi",
                "latitude": -1.2921,
                "longitude": 36.8219,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let business_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["verified"], false);

    state
        .store()
        .create_user(
            NewUser {
                username: "root".to_string(),
                email: "root@example.com".to_string(),
                password: Some("RootSecret1!".to_string()),
                ..Default::default()
            },
            Role::Admin,
        )
        .await
        .unwrap();
    let admin_cookie = login(&app, "root@example.com", "RootSecret1!").await;

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            &format!("/api/admin/businesses/{business_id}/verify"),
            &admin_cookie,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "GET",
            &format!("/api/businesses/{business_id}"),
            &cookie,
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["verified"], true);

    // The privileged action landed in the audit log.
    let (events, _) = state
        .store()
        .audit_repo()
        .audit_events(1, 50, Some("business_verified".to_string()))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "DELETE",
            &format!("/api/businesses/{business_id}"),
            &cookie,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "GET",
            &format!("/api/businesses/{business_id}"),
            &cookie,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let (app, _state) = spawn_app().await;

    sign_up(&app, "biz1", "biz1@example.com", "Secret123!").await;
    let cookie = login(&app, "biz1@example.com", "Secret123!").await;

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            "/api/auth/logout",
            &cookie,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request_with_cookie("GET", "/api/auth/me", &cookie, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
