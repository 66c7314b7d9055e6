//! End-to-end checks over a real socket: what a browser actually receives.

use facilita_portal::{
    AppConfig, AppState, InMemoryRepository, LocalDiskStorage, auth::ensure_admin_account,
    create_router, repository::RepositoryState, storage::StorageState,
};
use reqwest::header;
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    _uploads: TempDir,
}

async fn spawn_app() -> TestApp {
    let uploads = TempDir::new().unwrap();
    let config = AppConfig {
        upload_dir: uploads.path().to_path_buf(),
        ..AppConfig::default()
    };

    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    ensure_admin_account(&repo, &config.admin_username, &config.admin_password)
        .await
        .unwrap();
    let storage = Arc::new(LocalDiskStorage::new(config.upload_dir.clone())) as StorageState;

    let state = AppState::new(repo, storage, config);
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address,
        _uploads: uploads,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_response_headers() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/links", app.address))
        .header(header::ORIGIN, "http://localhost:5173")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_openapi_document() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let doc: Value = client
        .get(format!("{}/api-docs/openapi.json", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let paths = doc["paths"].as_object().unwrap();
    for path in ["/api/auth/login", "/api/links", "/api/schedules/{id}", "/api/upload"] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}

#[tokio::test]
async fn test_browser_session_flow() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let login = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&json!({ "username": "admin", "password": "admin123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);
    let cookie = login
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.split(';').next())
        .unwrap()
        .to_string();

    let created = client
        .post(format!("{}/api/links", app.address))
        .header(header::COOKIE, &cookie)
        .json(&json!({ "title": "Canteen menu", "url": "https://menu.example", "user_id": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let link: Value = created.json().await.unwrap();

    let click: Value = client
        .post(format!("{}/api/links/{}/click", app.address, link["id"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(click["click_count"], 1);

    let unauthenticated = client
        .get(format!("{}/api/auth/me", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), 401);
    let body: Value = unauthenticated.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}
