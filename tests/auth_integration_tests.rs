mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{ADMIN, TestApp, session_cookie};
use serde_json::json;

#[tokio::test]
async fn test_login_me_logout_flow() {
    let app = TestApp::new().await;
    app.add_user("alice", "wonderland", false).await;

    let cookie = app.login("alice", "wonderland").await;
    let (status, me) = app.json(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["isAdmin"], false);
    assert!(me["theme"].is_null());

    let response = app.send(Method::POST, "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cleared.starts_with("facilita_session="));
    assert!(cleared.contains("Max-Age=0"));

    // The old token no longer maps to a session.
    let (status, body) = app.json(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_login_cookie_attributes() {
    let app = TestApp::new().await;
    let response = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": ADMIN.0, "password": ADMIN.1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Lax"));
    assert!(raw.contains("Path=/"));
    // Local config: no Secure flag so plain-http development works.
    assert!(!raw.contains("Secure"));
    assert!(session_cookie(&response).is_some());
}

#[tokio::test]
async fn test_login_rejections_share_one_answer() {
    let app = TestApp::new().await;
    let bob = app.add_user("bob", "builder1", false).await;

    let (status, wrong_password) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "bob", "password": "nope-nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password["error"], "invalid_credentials");

    let (status, unknown_user) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": "builder1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user["message"], wrong_password["message"]);

    // Deactivated accounts cannot log in either.
    let admin = app.admin_cookie().await;
    let (status, _) = app
        .json(
            Method::PATCH,
            &format!("/api/users/{bob}"),
            Some(&admin),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "bob", "password": "builder1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_username_is_case_insensitive_at_login() {
    let app = TestApp::new().await;
    app.add_user("carol", "secret-1", false).await;

    let response = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "  CAROL ", "password": "secret-1" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_of_deleted_user_is_rejected() {
    let app = TestApp::new().await;
    let dave = app.add_user("dave", "password1", false).await;
    let cookie = app.login("dave", "password1").await;

    // Remove the user behind the admin's back, leaving the session in place.
    app.state.repo.delete_user(dave).await.unwrap();

    // Even a public endpoint refuses the stale session instead of degrading to anonymous.
    let (status, body) = app.json(Method::GET, "/api/links", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(app.state.sessions.len().await, 0);

    // The session is gone, so the cookie now reads as anonymous.
    let (status, _) = app.json(Method::GET, "/api/links", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_cookie_is_anonymous() {
    let app = TestApp::new().await;
    let cookie = "facilita_session=not.a.token";

    let (status, _) = app.json(Method::GET, "/api/links", Some(cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::GET, "/api/auth/me", Some(cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_creates_regular_user() {
    let app = TestApp::new().await;

    let (status, created) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "Erin_99", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["username"], "erin_99");
    assert_eq!(created["isAdmin"], false);
    // Registration does not log the new user in.
    assert_eq!(app.state.sessions.len().await, 0);

    let (status, conflict) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "erin_99", "password": "another1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(conflict["error"], "conflict");
}

#[tokio::test]
async fn test_register_reports_every_invalid_field() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "x!", "password": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["username", "password"]);
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new().await;
    app.add_user("frank", "old-pass", false).await;
    let cookie = app.login("frank", "old-pass").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/change-password",
            Some(&cookie),
            Some(json!({ "old_password": "wrong", "new_password": "new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "old_password");

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/change-password",
            Some(&cookie),
            Some(json!({ "old_password": "old-pass", "new_password": "new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.login("frank", "new-pass").await;
}

#[tokio::test]
async fn test_login_is_rate_limited_per_client() {
    let app = TestApp::new().await;
    let limit = app.state.config.auth_rate_limit_per_minute;

    let attempt = |ip: &'static str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("x-forwarded-for", ip)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "username": "ghost", "password": "whatever" }).to_string(),
            ))
            .unwrap()
    };

    for _ in 0..limit {
        let response = app.raw(attempt("203.0.113.7")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.raw(attempt("203.0.113.7")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another client is unaffected.
    let response = app.raw(attempt("203.0.113.8")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
