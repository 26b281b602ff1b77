//!
//! Server half of the sync protocol: two POST endpoints per user token,
//! each token mapping to a directory of replica logs under the data
//! root. The server never holds keys; it shuttles ciphertext ranges and
//! refuses grafts that would leave gaps.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::sync::Mutex;

use crate::error::{MergeError, Unauthenticated};
use crate::merge;
use crate::store::Store;
use crate::types::is_valid_token;

use super::{validate_data, validate_offs, PullRequest, PullResponse, PushRequest};

struct ServerState {
    data_root: PathBuf,
    // the original served these handlers from a single-threaded loop;
    // axum does not, so mutations serialize here
    write_lock: Mutex<()>,
}

/// Routes `/gtd/:token/pull` and `/gtd/:token/push` over `data_root`.
pub fn router(data_root: PathBuf) -> Router {
    let state = Arc::new(ServerState {
        data_root,
        write_lock: Mutex::new(()),
    });
    Router::new()
        .route("/gtd/:token/pull", post(pull))
        .route("/gtd/:token/push", post(push))
        .with_state(state)
}

/// A token authenticates a user iff it is well-formed and a same-named
/// directory exists under the data root.
fn authenticate(state: &ServerState, token: &str) -> Result<Store, Unauthenticated> {
    if !is_valid_token(token) {
        return Err(Unauthenticated);
    }
    let dir = state.data_root.join(token);
    if !dir.is_dir() {
        return Err(Unauthenticated);
    }
    Ok(Store::open(dir))
}

async fn pull(
    State(state): State<Arc<ServerState>>,
    Path(token): Path<String>,
    body: String,
) -> Response {
    let store = match authenticate(&state, &token) {
        Ok(store) => store,
        Err(Unauthenticated) => return StatusCode::UNAUTHORIZED.into_response(),
    };
    let request: PullRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    if !validate_offs(&request.offs) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let local_offs = match store.offsets() {
        Ok(offs) => offs,
        Err(err) => return internal(err),
    };
    match merge::missing_data(&store, &local_offs, &request.offs) {
        Ok(data) => Json(PullResponse {
            offs: local_offs,
            data,
        })
        .into_response(),
        Err(err) => internal(err),
    }
}

async fn push(
    State(state): State<Arc<ServerState>>,
    Path(token): Path<String>,
    body: String,
) -> Response {
    let store = match authenticate(&state, &token) {
        Ok(store) => store,
        Err(Unauthenticated) => return StatusCode::UNAUTHORIZED.into_response(),
    };
    let request: PushRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    if !validate_data(&request.data) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let _guard = state.write_lock.lock().await;
    let local_offs = match store.offsets() {
        Ok(offs) => offs,
        Err(err) => return internal(err),
    };
    if !merge::is_gapless(&local_offs, &request.data) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match merge::insert_data(&store, &local_offs, &request.data) {
        Ok(()) => Json(serde_json::json!({})).into_response(),
        Err(MergeError::Gap(_)) => StatusCode::BAD_REQUEST.into_response(),
        Err(err) => internal(err),
    }
}

fn internal(err: impl std::fmt::Display) -> Response {
    tracing::warn!(%err, "sync request failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
