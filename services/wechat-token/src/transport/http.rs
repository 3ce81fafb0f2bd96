//! HTTP transport.
//!
//! `POST /get-token` with a JSON body. Success answers `200 {"token"}`;
//! every failure, decode errors included, answers `400 {"error"}`.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::context::{RequestContext, TRACEPARENT, TraceContext};
use crate::endpoint::{Endpoints, GetTokenRequest, GetTokenResponse};
use crate::error::TokenServiceError;

/// Route serving `GetToken`.
pub const GET_TOKEN_ROUTE: &str = "/get-token";

#[derive(Clone)]
struct HttpState {
    endpoints: Endpoints,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct TokenBody<'a> {
    token: &'a str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Application router.
pub fn router(endpoints: Endpoints, request_timeout: Duration) -> Router {
    Router::new()
        .route(GET_TOKEN_ROUTE, post(get_token))
        .layer(TraceLayer::new_for_http())
        .with_state(HttpState {
            endpoints,
            request_timeout,
        })
}

/// Decodes a request body.
///
/// # Errors
///
/// Returns `InvalidRequest` when the body is not a JSON request object.
pub fn decode_request(body: &[u8]) -> Result<GetTokenRequest, TokenServiceError> {
    serde_json::from_slice(body).map_err(|e| TokenServiceError::InvalidRequest {
        reason: e.to_string(),
    })
}

/// Encodes a pipeline outcome as an HTTP response.
pub fn encode_response(result: Result<GetTokenResponse, TokenServiceError>) -> Response {
    match result.and_then(GetTokenResponse::into_result) {
        Ok(token) => (StatusCode::OK, Json(TokenBody { token: &token })).into_response(),
        Err(err) => encode_error(&err),
    }
}

fn encode_error(err: &TokenServiceError) -> Response {
    warn!(transport = "http", error = %err, "GetToken failed");
    (
        err.http_status(),
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

async fn get_token(State(state): State<HttpState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match decode_request(&body) {
        Ok(request) => request,
        Err(err) => return encode_error(&err),
    };

    let mut ctx = RequestContext::new().with_timeout(state.request_timeout);
    if let Some(trace) = headers
        .get(TRACEPARENT)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceContext::parse)
    {
        ctx = ctx.with_trace(trace);
    }

    encode_response(state.endpoints.invoke(ctx, request).await)
}
