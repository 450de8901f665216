//! Content tree API.
//!
//! `GET` on the base path or any unknown sub-path lists children, so a
//! tree widget can point at `/api/content/<anything>?id=N`.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use tracing::info;

use crate::content::{ChildrenResponse, DeleteResponse, SearchResponse, TreeRequest, TreeResult};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentPrincipal;
use crate::routes::params::Params;
use crate::state::AppState;

/// Create the content tree router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/content", get(children).delete(delete))
        .route("/api/content/children", get(children))
        .route("/api/content/search", get(search))
        .route("/api/content/sort", post(move_item))
        .route("/api/content/move", post(move_item))
        .route("/api/content/delete", post(delete).delete(delete))
        .route("/api/content/publish", post(publish))
        .route("/api/content/unpublish", post(unpublish))
        .route("/api/content/schedule", post(schedule))
        .route("/api/content/{*rest}", get(children).post(unknown))
}

fn tree_request(headers: &HeaderMap, principal: CurrentPrincipal, params: Params) -> TreeRequest {
    let request = TreeRequest::new(params.0, principal.0);
    match headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => request.with_host(host),
        None => request,
    }
}

/// Count the outcome of one operation and lift it into the HTTP error type.
fn observe<T>(state: &AppState, operation: &str, result: TreeResult<T>) -> AppResult<T> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    state.metrics().record_tree_operation(operation, outcome);
    result.map_err(AppError::from)
}

async fn children(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    headers: HeaderMap,
    params: Params,
) -> AppResult<Json<ChildrenResponse>> {
    let request = tree_request(&headers, principal, params);
    let result = state.tree().children(&request).await;
    observe(&state, "children", result).map(Json)
}

async fn search(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    headers: HeaderMap,
    params: Params,
) -> AppResult<Json<SearchResponse>> {
    let request = tree_request(&headers, principal, params);
    let result = state.tree().search(&request).await;
    observe(&state, "search", result).map(Json)
}

async fn move_item(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    headers: HeaderMap,
    params: Params,
) -> AppResult<StatusCode> {
    let request = tree_request(&headers, principal, params);
    let result = state.tree().move_item(&request).await;
    observe(&state, "move", result)?;

    info!(principal = %request.principal.name, "item moved");
    Ok(StatusCode::OK)
}

async fn delete(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    headers: HeaderMap,
    params: Params,
) -> AppResult<Json<DeleteResponse>> {
    let request = tree_request(&headers, principal, params);
    let result = state.tree().delete(&request).await;
    let response = observe(&state, "delete", result)?;

    info!(
        principal = %request.principal.name,
        removed_permanently = response.removed_permanently,
        "item deleted"
    );
    Ok(Json(response))
}

async fn publish(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    headers: HeaderMap,
    params: Params,
) -> AppResult<StatusCode> {
    let request = tree_request(&headers, principal, params);
    let result = state.tree().publish(&request).await;
    let item = observe(&state, "publish", result)?;

    info!(item_id = item.id, principal = %request.principal.name, "item published");
    Ok(StatusCode::OK)
}

async fn unpublish(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    headers: HeaderMap,
    params: Params,
) -> AppResult<StatusCode> {
    let request = tree_request(&headers, principal, params);
    let result = state.tree().unpublish(&request).await;
    let item = observe(&state, "unpublish", result)?;

    info!(item_id = item.id, principal = %request.principal.name, "item unpublished");
    Ok(StatusCode::OK)
}

async fn schedule(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    headers: HeaderMap,
    params: Params,
) -> AppResult<StatusCode> {
    let request = tree_request(&headers, principal, params);
    let result = state.tree().schedule(&request).await;
    let item = observe(&state, "schedule", result)?;

    info!(
        item_id = item.id,
        publish_on = item.publish_on,
        principal = %request.principal.name,
        "item scheduled"
    );
    Ok(StatusCode::OK)
}

async fn unknown() -> AppError {
    AppError::NotFound
}
