#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use facilita_portal::{
    AppConfig, AppState, InMemoryRepository, LocalDiskStorage, create_router,
    auth::{ensure_admin_account, hash_password},
    models::NewUser,
    repository::RepositoryState,
    storage::StorageState,
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const ADMIN: (&str, &str) = ("admin", "admin123");

/// TestApp
///
/// Full router over the in-memory repository and a throwaway upload directory. Requests
/// go through `oneshot`, so no socket is opened.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
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
        let router = create_router(state.clone());
        TestApp {
            router,
            state,
            _uploads: uploads,
        }
    }

    /// Inserts an account directly, bypassing the HTTP layer. Returns its id.
    pub async fn add_user(&self, username: &str, password: &str, is_admin: bool) -> i64 {
        self.state
            .repo
            .create_user(NewUser {
                username: username.to_string(),
                password_hash: hash_password(password).unwrap(),
                is_admin,
            })
            .await
            .unwrap()
            .id
    }

    /// Logs in and returns the `name=value` pair to send back in a `Cookie` header.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed for {username}");
        session_cookie(&response).expect("login did not set a session cookie")
    }

    pub async fn admin_cookie(&self) -> String {
        self.login(ADMIN.0, ADMIN.1).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.raw(request).await
    }

    pub async fn raw(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// `send`, then decode the body as JSON (`Null` for an empty body).
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, cookie, body).await;
        let status = response.status();
        (status, body_json(response).await)
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

/// The session cookie set by a response, as `name=value`.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("facilita_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

/// Builds a `multipart/form-data` body with a single file part named `field`.
pub fn multipart(field: &str, filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "facilita-test-boundary";
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

pub async fn upload(app: &TestApp, cookie: &str, filename: &str, data: &[u8]) -> Response {
    let (content_type, body) = multipart("file", filename, data);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    app.raw(request).await
}
