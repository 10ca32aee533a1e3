/**
 * CESI REST API - Read side of the dashboard and reload trigger
 *
 * ROLE:
 * Thin adapter between the topology store and HTTP clients (web UI, scripts).
 *
 * ROUTES:
 * - GET  /health                 liveness
 * - GET  /status                 generation + load time of the current topology
 * - GET  /nodes, /nodes/{name}
 * - GET  /environments, /environments/{name}
 * - GET  /groups                 group -> environment -> nodes tree (live query)
 * - GET  /topology               nodes and environments in one object
 * - POST /reload                 re-read the configuration file
 *
 * ERRORS:
 * Unknown node/environment names answer 400 "Wrong node name"-style errors,
 * configuration failures during reload answer 500 and keep the old topology.
 */

use crate::error::TopologyError;
use crate::groups::{GroupTree, NodeClient};
use crate::models::Environment;
use crate::topology::{NodeView, TopologyStore};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TopologyStore>,
    pub nodes: Arc<dyn NodeClient>,
}

/// Maps core errors onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Topology(e) if e.is_not_found() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub name: String,
    pub generation: u64,
    pub loaded_at: String, // RFC3339
    pub nodes: usize,
    pub environments: usize,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(get_status))
        .route("/nodes", get(list_nodes))
        .route("/nodes/{name}", get(get_node))
        .route("/environments", get(list_environments))
        .route("/environments/{name}", get(get_environment))
        .route("/groups", get(get_groups))
        .route("/topology", get(get_topology))
        .route("/reload", post(reload))
        .with_state(app_state)
}

// GET /status
async fn get_status(State(app): State<AppState>) -> Json<StatusView> {
    let topo = app.store.snapshot();
    Json(StatusView {
        name: topo.settings.name.clone(),
        generation: topo.generation,
        loaded_at: topo.loaded_at.format(&Rfc3339).unwrap_or_default(),
        nodes: topo.nodes.len(),
        environments: topo.environments.len(),
    })
}

// GET /nodes
async fn list_nodes(State(app): State<AppState>) -> Json<Vec<NodeView>> {
    Json(app.store.serialize_nodes())
}

// GET /nodes/{name}
async fn get_node(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NodeView>, ApiError> {
    let topo = app.store.snapshot();
    let node = topo.get_node_or_400(&name)?;
    Ok(Json(topo.node_view(node)))
}

// GET /environments
async fn list_environments(State(app): State<AppState>) -> Json<Vec<Environment>> {
    Json(app.store.serialize_environments())
}

// GET /environments/{name}
async fn get_environment(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Environment>, ApiError> {
    Ok(Json(app.store.get_environment_or_400(&name)?))
}

// GET /groups
async fn get_groups(State(app): State<AppState>) -> Json<Vec<GroupTree>> {
    Json(app.store.groups_tree(app.nodes.as_ref()).await)
}

// GET /topology
async fn get_topology(
    State(app): State<AppState>,
) -> Json<serde_json::Map<String, serde_json::Value>> {
    Json(app.store.serialize())
}

// POST /reload
async fn reload(State(app): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let store = app.store.clone();
    let reloaded = tokio::task::spawn_blocking(move || store.reload()).await;
    match reloaded {
        Ok(Ok(topo)) => Ok(Json(serde_json::json!({ "ok": true, "generation": topo.generation }))),
        Ok(Err(e)) => Err(e.into()),
        Err(join) => {
            error!("reload task failed: {join}");
            Err(ApiError::Internal(join.to_string()))
        }
    }
}
