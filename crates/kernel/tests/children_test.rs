#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Child listing tests.

mod common;

use axum::http::StatusCode;
use canopy_test_utils::{assert, test_page, test_part};

use common::{MEMBER_TOKEN, TestApp};

#[tokio::test]
async fn leaf_has_no_children() {
    let app = TestApp::new().await;
    let leaf = app.tree.add(test_page(app.tree.root.id, "leaf")).await;

    let (status, body) = app
        .get(&format!("/api/content/children?id={}", leaf.id), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Children"].as_array().unwrap().len(), 0);
    assert_eq!(body["IsPaged"], false);
}

#[tokio::test]
async fn lists_children_in_sibling_order() {
    let app = TestApp::new().await;
    let home = app.tree.add(test_page(app.tree.root.id, "home")).await;
    let pages = app.tree.add_pages(home.id, "page", 3).await;
    app.tree.add(test_page(pages[1].id, "deep")).await;

    let (status, body) = app
        .get(&format!("/api/content/children?id={}", home.id), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = pages.iter().map(|p| p.id).collect();
    assert_eq!(assert::child_ids(&body), ids);

    let children = body["Children"].as_array().unwrap();
    assert_eq!(children[0]["HasChildren"], false);
    assert_eq!(children[1]["HasChildren"], true);
    assert_eq!(children[1]["Expanded"], false);
    assert_eq!(children[1]["Current"]["Name"], "page-1");
    assert_eq!(
        children[1]["Current"]["Url"],
        format!("/api/content/children?id={}", pages[1].id)
    );
}

#[tokio::test]
async fn large_collection_is_paged() {
    let app = TestApp::with_threshold(5).await;
    let home = app.tree.add(test_page(app.tree.root.id, "home")).await;
    let pages = app.tree.add_pages(home.id, "page", 8).await;

    let (_, body) = app
        .get(&format!("/api/content/children?id={}", home.id), None)
        .await;
    assert_eq!(body["IsPaged"], true);
    assert_eq!(assert::child_ids(&body).len(), 5);

    let (_, body) = app
        .get(&format!("/api/content/children?id={}&skip=5", home.id), None)
        .await;
    let rest: Vec<i64> = pages[5..].iter().map(|p| p.id).collect();
    assert_eq!(assert::child_ids(&body), rest);

    let (_, body) = app
        .get(&format!("/api/content/children?id={}&skip=1&take=2", home.id), None)
        .await;
    assert_eq!(assert::child_ids(&body), vec![pages[1].id, pages[2].id]);
}

#[tokio::test]
async fn unauthorized_children_are_filtered() {
    let app = TestApp::new().await;
    let home = app.tree.add(test_page(app.tree.root.id, "home")).await;
    let public = app.tree.add(test_page(home.id, "public")).await;
    let secret = app
        .tree
        .add(test_page(home.id, "secret").readable_by(&["Members"]))
        .await;
    app.tree
        .add(test_page(public.id, "hidden").readable_by(&["Members"]))
        .await;

    let uri = format!("/api/content/children?id={}", home.id);

    let (_, anonymous) = app.get(&uri, None).await;
    assert_eq!(assert::child_ids(&anonymous), vec![public.id]);
    assert_eq!(anonymous["Children"][0]["HasChildren"], false);

    let (_, member) = app.get(&uri, Some(MEMBER_TOKEN)).await;
    assert_eq!(assert::child_ids(&member), vec![public.id, secret.id]);
    assert_eq!(member["Children"][0]["HasChildren"], true);
}

#[tokio::test]
async fn pages_parameter_filters_parts() {
    let app = TestApp::new().await;
    let home = app.tree.add(test_page(app.tree.root.id, "home")).await;
    let page = app.tree.add(test_page(home.id, "page")).await;
    let part = app.tree.add(test_part(home.id, "teaser")).await;

    let (_, pages) = app
        .get(&format!("/api/content/children?id={}&pages=true", home.id), None)
        .await;
    assert_eq!(assert::child_ids(&pages), vec![page.id]);

    let (_, parts) = app
        .get(&format!("/api/content/children?id={}&pages=false", home.id), None)
        .await;
    assert_eq!(assert::child_ids(&parts), vec![part.id]);
}

#[tokio::test]
async fn any_sub_path_lists_children() {
    let app = TestApp::new().await;
    let home = app.tree.add(test_page(app.tree.root.id, "home")).await;
    let child = app.tree.add(test_page(home.id, "child")).await;

    let (status, body) = app
        .get(&format!("/api/content/tree/anything?id={}", home.id), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(assert::child_ids(&body), vec![child.id]);
}

#[tokio::test]
async fn selected_path_resolves_from_the_site_start() {
    let app = TestApp::new().await;
    let home = app.tree.add(test_page(app.tree.root.id, "home")).await;
    let news = app.tree.add(test_page(home.id, "news")).await;
    let story = app.tree.add(test_page(news.id, "story")).await;

    let (status, body) = app.get("/api/content?selected=/home/news", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(assert::child_ids(&body), vec![story.id]);
}

#[tokio::test]
async fn selection_errors() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/content/children", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "resolution");

    let (status, body) = app.get("/api/content/children?id=999", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "resolution");

    let (status, body) = app.get("/api/content/children?id=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = app.get("/api/content?selected=/nowhere", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
