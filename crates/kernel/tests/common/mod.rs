#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! This module drives the REAL kernel router and state over an in-memory
//! tree, so tests verify actual behavior end to end.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use canopy_kernel::middleware::PrincipalDirectory;
use canopy_kernel::search::MemorySearchIndex;
use canopy_kernel::{AppState, Config, routes};
use canopy_test_utils::{TreeFixture, admin, editor, member};

pub const EDITOR_TOKEN: &str = "editor-token";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const MEMBER_TOKEN: &str = "member-token";

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub tree: TreeFixture,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_threshold(100).await
    }

    /// Create a test application whose large collection threshold is
    /// `threshold`.
    pub async fn with_threshold(threshold: usize) -> Self {
        Self::with_config(threshold, |_| {}).await
    }

    /// Create a test application, adjusting the config before the router is
    /// built.
    pub async fn with_config(threshold: usize, adjust: impl FnOnce(&mut Config)) -> Self {
        let tree = TreeFixture::new(threshold).await;

        let mut config = Config {
            large_collection_threshold: threshold,
            trash_item_id: Some(tree.trash.id),
            scheduler_interval_secs: 0,
            ..Config::default()
        };
        adjust(&mut config);

        let principals = PrincipalDirectory::new();
        principals.insert(EDITOR_TOKEN, editor());
        principals.insert(ADMIN_TOKEN, admin());
        principals.insert(MEMBER_TOKEN, member("member", &["Members"]));

        let search = Arc::new(MemorySearchIndex::new(tree.store.clone()));
        let state = AppState::from_parts(config, tree.store.clone(), search, principals)
            .expect("Failed to build AppState");

        let router = routes::app(state.clone());

        Self {
            router,
            state,
            tree,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// GET `uri`, optionally with a bearer token.
    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self.request(builder.body(Body::empty()).unwrap()).await;
        split(response).await
    }

    /// POST a form body to `uri`, optionally with a bearer token.
    pub async fn post(&self, uri: &str, token: Option<&str>, form: &str) -> (StatusCode, Value) {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .request(builder.body(Body::from(form.to_string())).unwrap())
            .await;
        split(response).await
    }
}

/// Status and JSON body of a response. Empty bodies become `Value::Null`.
pub async fn split(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = body_bytes(response).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("response body is not JSON")
    };
    (status, json)
}

/// Read the full response body.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec()
}
