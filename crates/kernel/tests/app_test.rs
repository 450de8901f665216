#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Authentication, health and metrics tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use canopy_test_utils::test_page;

use common::{EDITOR_TOKEN, TestApp, body_bytes};

#[tokio::test]
async fn unknown_bearer_token_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/content?id=1", Some("forged")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");
}

#[tokio::test]
async fn non_bearer_credentials_are_rejected() {
    let app = TestApp::new().await;
    let request = Request::get("/api/content?id=1")
        .header(header::AUTHORIZATION, "Basic ZWQ6c2VjcmV0")
        .body(Body::empty())
        .unwrap();

    assert_eq!(app.request(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_may_read() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/api/content?id=1", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_post_path_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post("/api/content/rename", Some(EDITOR_TOKEN), "id=1")
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn health_reports_store() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], true);
}

#[tokio::test]
async fn metrics_count_tree_operations() {
    let app = TestApp::new().await;
    let home = app.tree.add(test_page(app.tree.root.id, "home")).await;

    app.get(&format!("/api/content/children?id={}", home.id), None)
        .await;
    app.post(
        "/api/content/move",
        None,
        &format!("id={}&to={}", home.id, app.tree.trash.id),
    )
    .await;

    let response = app
        .request(Request::get("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("tree_operations_total{operation=\"children\",outcome=\"ok\"} 1"));
    assert!(text.contains("tree_operations_total{operation=\"move\",outcome=\"forbidden\"} 1"));
    assert!(text.contains("http_requests_total{method=\"GET\",path=\"/api/content/children\",status=\"200\"} 1"));
}

#[test]
fn sample_config_files_parse() {
    use std::path::Path;

    use canopy_kernel::content::ContentTypeRegistry;
    use canopy_kernel::middleware::PrincipalDirectory;

    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");

    let types = ContentTypeRegistry::new();
    assert_eq!(types.load_file(&root.join("content_types.toml")).unwrap(), 4);
    assert!(!types.resolve("Teaser").is_page);
    assert!(!types.resolve("LegalNotice").deletable);
    assert!(types.resolve("NewsContainer").allows_child("NewsItem"));
    assert!(!types.resolve("NewsContainer").allows_child("Page"));

    let principals = PrincipalDirectory::load_file(&root.join("principals.toml.example")).unwrap();
    assert_eq!(principals.len(), 3);
    assert!(principals.lookup("change-me-editor").unwrap().has_role("Editors"));
}

#[tokio::test]
async fn memory_state_seeds_root_and_trash() {
    use canopy_kernel::middleware::PrincipalDirectory;
    use canopy_kernel::store::ContentStore;
    use canopy_kernel::{AppState, Config};

    let state = AppState::in_memory(Config::default(), PrincipalDirectory::new())
        .await
        .unwrap();

    let root = state.store().get(1).await.unwrap().unwrap();
    assert_eq!(root.item_type, "Root");
    assert_eq!(root.parent_id, None);

    let trash = state.store().get(2).await.unwrap().unwrap();
    assert_eq!(trash.item_type, "Trash");
    assert_eq!(trash.parent_id, Some(1));
    assert_eq!(state.tree().settings().trash_id, Some(2));
    assert!(state.store_healthy().await);
}

#[tokio::test]
async fn explicit_cors_origins_allow_credentials() {
    let app = TestApp::with_config(100, |config| {
        config.cors_allowed_origins = vec!["https://admin.example".to_string()];
    })
    .await;

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/content/move")
        .header(header::ORIGIN, "https://admin.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.request(preflight).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://admin.example"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains("authorization"));
    assert!(allowed.contains("content-type"));
}
