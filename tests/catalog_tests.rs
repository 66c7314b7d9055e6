mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

// --- Categories ---

#[tokio::test]
async fn test_admin_only_category_gate() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;
    app.add_user("gina", "gina-pw", false).await;
    let gina = app.login("gina", "gina-pw").await;

    let (status, board) = app
        .json(
            Method::POST,
            "/api/categories",
            Some(&admin),
            Some(json!({ "name": "Board", "admin_only": true, "color": "#112233", "sort_order": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(board["adminOnly"], true);
    let (_, _) = app
        .json(
            Method::POST,
            "/api/categories",
            Some(&admin),
            Some(json!({ "name": "General", "sort_order": 1 })),
        )
        .await;

    let names = |body: &serde_json::Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["name"].as_str().map(str::to_string))
            .collect()
    };

    let (_, listed) = app.json(Method::GET, "/api/categories", None, None).await;
    assert_eq!(names(&listed), vec!["General"]);
    let (_, listed) = app.json(Method::GET, "/api/categories", Some(&gina), None).await;
    assert_eq!(names(&listed), vec!["General"]);
    let (_, listed) = app.json(Method::GET, "/api/categories", Some(&admin), None).await;
    assert_eq!(names(&listed), vec!["General", "Board"]);

    let uri = format!("/api/categories/{}", board["id"]);
    let (status, _) = app.json(Method::GET, &uri, Some(&gina), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.json(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_category_mutations_are_admin_only() {
    let app = TestApp::new().await;
    app.add_user("hank", "hank-pw", false).await;
    let hank = app.login("hank", "hank-pw").await;

    let (status, body) = app
        .json(Method::POST, "/api/categories", Some(&hank), Some(json!({ "name": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "admin access required");

    let (status, _) = app
        .json(Method::POST, "/api/categories", None, Some(json!({ "name": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_category_patch_and_conflict() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;

    let (_, first) = app
        .json(
            Method::POST,
            "/api/categories",
            Some(&admin),
            Some(json!({ "name": "HR", "icon": "users", "description": "People" })),
        )
        .await;
    app.json(Method::POST, "/api/categories", Some(&admin), Some(json!({ "name": "IT" })))
        .await;

    let uri = format!("/api/categories/{}", first["id"]);
    let (status, body) = app
        .json(Method::PATCH, &uri, Some(&admin), Some(json!({ "name": "IT" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conflict");

    let (status, patched) = app
        .json(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "icon": null, "color": "#ABCDEF" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(patched["icon"].is_null());
    assert_eq!(patched["color"], "#ABCDEF");
    assert_eq!(patched["description"], "People");

    let (status, body) = app
        .json(Method::PATCH, &uri, Some(&admin), Some(json!({ "color": "teal" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "color");

    let (status, _) = app
        .json(Method::DELETE, "/api/categories/9999", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Colors ---

#[tokio::test]
async fn test_duplicate_color_is_a_conflict() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;

    let (status, created) = app
        .json(
            Method::POST,
            "/api/colors",
            Some(&admin),
            Some(json!({ "value": "#1a2b3c", "name": "Primary" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["value"], "#1A2B3C");

    let (status, body) = app
        .json(Method::POST, "/api/colors", Some(&admin), Some(json!({ "value": "#1A2B3C" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_single_default_color() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;

    let (_, first) = app
        .json(
            Method::POST,
            "/api/colors",
            Some(&admin),
            Some(json!({ "value": "#000001", "is_default": true })),
        )
        .await;
    let (_, second) = app
        .json(
            Method::POST,
            "/api/colors",
            Some(&admin),
            Some(json!({ "value": "#000002", "is_default": true })),
        )
        .await;

    let (_, first) = app
        .json(Method::GET, &format!("/api/colors/{}", first["id"]), None, None)
        .await;
    assert_eq!(first["isDefault"], false);
    assert_eq!(second["isDefault"], true);

    let (_, all) = app.json(Method::GET, "/api/colors", None, None).await;
    let defaults = all
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["isDefault"] == true)
        .count();
    assert_eq!(defaults, 1);
}

#[tokio::test]
async fn test_color_helpers() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;

    let (status, verdict) = app
        .json(Method::POST, "/api/colors/validate", None, Some(json!({ "value": " #abcdef " })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict, json!({ "value": "#abcdef", "valid": true }));
    let (_, verdict) = app
        .json(Method::POST, "/api/colors/validate", None, Some(json!({ "value": "#abc" })))
        .await;
    assert_eq!(verdict["valid"], false);

    for (value, name) in [("#0000FF", "Main Blue"), ("#00FF00", "Accent"), ("#808080", "Gray")] {
        app.json(
            Method::POST,
            "/api/colors",
            Some(&admin),
            Some(json!({ "value": value, "name": name })),
        )
        .await;
    }
    let (status, palette) = app.json(Method::GET, "/api/colors/palette", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(palette["primary"][0]["value"], "#0000FF");
    assert_eq!(palette["secondary"][0]["value"], "#00FF00");
    assert_eq!(palette["neutral"][0]["value"], "#808080");
    assert_eq!(palette["custom"], json!([]));
}

// --- Users ---

#[tokio::test]
async fn test_user_management() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;

    let (status, ivy) = app
        .json(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "username": "Ivy", "password": "ivy-pass", "is_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ivy["username"], "ivy");
    assert_eq!(ivy["isAdmin"], true);
    assert!(ivy.get("passwordHash").is_none());

    let (_, users) = app.json(Method::GET, "/api/users", Some(&admin), None).await;
    let names: Vec<&str> = users
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|u| u["username"].as_str())
        .collect();
    assert_eq!(names, vec!["admin", "ivy"]);

    let uri = format!("/api/users/{}", ivy["id"]);
    let (status, renamed) = app
        .json(Method::PATCH, &uri, Some(&admin), Some(json!({ "username": "ivy2" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["username"], "ivy2");

    let (status, body) = app
        .json(Method::PATCH, &uri, Some(&admin), Some(json!({ "username": "admin" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conflict");

    let (_, stats) = app.json(Method::GET, "/api/users/stats", Some(&admin), None).await;
    assert_eq!(stats["totalUsers"], 2);
    assert_eq!(stats["adminUsers"], 2);

    let (status, _) = app.json(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_remove_themselves() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;
    let (_, me) = app.json(Method::GET, "/api/auth/me", Some(&admin), None).await;
    let uri = format!("/api/users/{}", me["id"]);

    let (status, body) = app.json(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_operation");
    assert_eq!(body["message"], "Cannot delete your own account");

    let (status, _) = app
        .json(Method::PATCH, &uri, Some(&admin), Some(json!({ "is_active": false })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .json(Method::PATCH, &uri, Some(&admin), Some(json!({ "is_admin": false })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deactivation_ends_sessions() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;
    let jade = app.add_user("jade", "jade-pw", false).await;
    let cookie = app.login("jade", "jade-pw").await;

    app.json(
        Method::PATCH,
        &format!("/api/users/{jade}"),
        Some(&admin),
        Some(json!({ "is_active": false })),
    )
    .await;

    let (status, _) = app.json(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_routes_reject_regular_users() {
    let app = TestApp::new().await;
    app.add_user("kim", "kim-pass", false).await;
    let kim = app.login("kim", "kim-pass").await;

    for uri in ["/api/users", "/api/users/stats", "/api/files"] {
        let (status, _) = app.json(Method::GET, uri, Some(&kim), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

// --- Theme ---

#[tokio::test]
async fn test_theme_round_trip_per_user() {
    let app = TestApp::new().await;
    app.add_user("lee", "lee-pass", false).await;
    app.add_user("max", "max-pass", false).await;
    let lee = app.login("lee", "lee-pass").await;
    let max = app.login("max", "max-pass").await;

    let theme = json!({ "primary": "#112233", "dark": true });
    let (status, saved) = app
        .json(Method::POST, "/api/theme", Some(&lee), Some(json!({ "theme": theme })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["theme"], theme);

    let (_, read) = app.json(Method::GET, "/api/theme", Some(&lee), None).await;
    assert_eq!(read["theme"], theme);
    let (_, read) = app.json(Method::GET, "/api/theme", Some(&max), None).await;
    assert!(read["theme"].is_null());

    let (_, me) = app.json(Method::GET, "/api/auth/me", Some(&lee), None).await;
    assert_eq!(me["theme"], theme);

    let (status, cleared) = app
        .json(Method::POST, "/api/theme", Some(&lee), Some(json!({ "theme": null })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared["theme"].is_null());

    let (status, _) = app
        .json(Method::POST, "/api/theme", None, Some(json!({ "theme": {} })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anonymous_theme_falls_back_to_admin() {
    let app = TestApp::new().await;
    let (_, read) = app.json(Method::GET, "/api/theme", None, None).await;
    assert_eq!(read, json!({ "theme": null }));

    let admin = app.admin_cookie().await;
    let branding = json!({ "logo": "/api/files/logo.png" });
    app.json(Method::POST, "/api/theme", Some(&admin), Some(json!({ "theme": branding })))
        .await;

    let (_, read) = app.json(Method::GET, "/api/theme", None, None).await;
    assert_eq!(read["theme"], branding);
}
