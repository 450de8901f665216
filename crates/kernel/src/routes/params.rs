//! Request parameter extraction.
//!
//! Tree operations read their inputs by name regardless of where the client
//! put them: the query string, a form body or a JSON object body.

use std::collections::HashMap;

use axum::extract::{FromRequest, Query, Request};
use axum::http::{Method, header};
use axum::{Form, Json};
use serde_json::{Map, Value};

use crate::content::RequestParams;
use crate::error::AppError;

/// Query string merged with the request body. Body values win.
#[derive(Debug, Clone, Default)]
pub struct Params(pub RequestParams);

impl<S: Send + Sync> FromRequest<S> for Params {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let mut params: RequestParams = query.into_iter().collect();

        if matches!(*req.method(), Method::GET | Method::HEAD) {
            return Ok(Self(params));
        }

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(body) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            params.merge(body.into_iter().filter_map(json_param).collect());
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            params.merge(body.into_iter().collect());
        }

        Ok(Self(params))
    }
}

/// Flatten one JSON member to a string parameter. Nulls are dropped.
fn json_param((key, value): (String, Value)) -> Option<(String, String)> {
    let value = match value {
        Value::Null => return None,
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };
    Some((key, value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn extract(req: Request) -> RequestParams {
        Params::from_request(req, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn reads_query_string() {
        let req = Request::builder()
            .uri("/children?id=4&take=10")
            .body(Body::empty())
            .unwrap();

        let params = extract(req).await;
        assert_eq!(params.get("id"), Some("4"));
        assert_eq!(params.get("take"), Some("10"));
    }

    #[tokio::test]
    async fn form_body_overrides_query() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/move?id=4&to=1")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("to=9&before="))
            .unwrap();

        let params = extract(req).await;
        assert_eq!(params.get("id"), Some("4"));
        assert_eq!(params.get("to"), Some("9"));
        assert_eq!(params.get("before"), None);
    }

    #[tokio::test]
    async fn json_body_values_become_strings() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/schedule")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"id": 7, "publishDate": "2030-01-01", "pages": true, "x": null}"#,
            ))
            .unwrap();

        let params = extract(req).await;
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("publishDate"), Some("2030-01-01"));
        assert_eq!(params.get("pages"), Some("true"));
        assert_eq!(params.get("x"), None);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/delete")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("[1, 2"))
            .unwrap();

        let err = Params::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
