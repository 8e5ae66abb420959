use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::cluster::{
    ClusterStats, Node, NodeError, OperationStatus, Pod, PodError, PodSpec, ResourceList,
};
use crate::server::state::AppState;

/// Create the API router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        // Pods
        .route("/v1/pods", get(list_pods).post(create_pod))
        .route("/v1/pods/{id}", get(get_pod).delete(delete_pod))
        // Nodes
        .route("/v1/nodes", get(list_nodes).post(register_node))
        .route("/v1/nodes/{name}", get(get_node).delete(unregister_node))
        // Status
        .route("/v1/status", get(cluster_status))
        .route("/health", get(health))
        // Routes served by the first release of the API
        .route("/createPod", post(legacy_create_pod))
        .route("/listPods", get(legacy_list_pods))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

/// Error returned by any handler
#[derive(Debug)]
pub enum ApiError {
    Pod(PodError),
    Node(NodeError),
    BadRequest(String),
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub kind: String,
    /// True when the failure left capacity held by a failed pod
    pub leaked: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Pod(err) => match err {
                PodError::InvalidSpec(_) => StatusCode::BAD_REQUEST,
                PodError::NotFound(_) => StatusCode::NOT_FOUND,
                PodError::NoCapacityAvailable { .. } | PodError::DeleteFailed { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                PodError::ImagePullFailed { .. }
                | PodError::ContainerCreateFailed { .. }
                | PodError::ContainerStartFailed { .. } => StatusCode::BAD_GATEWAY,
                PodError::Interrupted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Node(err) => match err {
                NodeError::NotFound(_) => StatusCode::NOT_FOUND,
                NodeError::AlreadyExists(_) | NodeError::Busy { .. } => StatusCode::CONFLICT,
                NodeError::EmptyName
                | NodeError::InvalidCapacity { .. }
                | NodeError::CapacityExceeded(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, kind, leaked) = match self {
            ApiError::Pod(err) => (err.to_string(), err.kind(), err.leaks_capacity()),
            ApiError::Node(err) => (err.to_string(), "NodeError", false),
            ApiError::BadRequest(msg) => (msg.clone(), "BadRequest", false),
        };
        ErrorBody {
            success: false,
            error,
            kind: kind.to_string(),
            leaked,
        }
    }
}

impl From<PodError> for ApiError {
    fn from(err: PodError) -> Self {
        ApiError::Pod(err)
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        ApiError::Node(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed with {}: {:?}", status, self);
        }
        (status, Json(self.body())).into_response()
    }
}

// ============================================================================
// Health & Status
// ============================================================================

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterStatusResponse {
    pub status: String,
    pub runtime: String,
    pub stats: ClusterStats,
}

async fn cluster_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(ClusterStatusResponse {
        status: "ok".to_string(),
        runtime: state.manager.runtime_name().to_string(),
        stats: state.manager.stats(),
    })
}

// ============================================================================
// Pod Endpoints
// ============================================================================

async fn create_pod(
    State(state): State<AppState>,
    body: Result<Json<PodSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<Pod>), ApiError> {
    let Json(spec) = body?;
    let pod = state.manager.create(spec).await?;
    Ok((StatusCode::CREATED, Json(pod)))
}

async fn list_pods(State(state): State<AppState>) -> Json<ResourceList<Pod>> {
    Json(ResourceList::new("PodList", state.manager.list_pods()))
}

async fn get_pod(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Pod>, ApiError> {
    state
        .manager
        .get_pod(&id)
        .map(Json)
        .ok_or_else(|| PodError::NotFound(id).into())
}

async fn delete_pod(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OperationStatus>, ApiError> {
    state.manager.delete(&id).await?;
    Ok(Json(OperationStatus::success(format!("Pod '{}' deleted", id))))
}

async fn legacy_create_pod(
    State(state): State<AppState>,
    body: Result<Json<PodSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<Pod>), ApiError> {
    let Json(spec) = body?;
    let pod = state.manager.create(spec).await?;
    Ok((StatusCode::CREATED, Json(pod)))
}

async fn legacy_list_pods(State(state): State<AppState>) -> Json<Vec<Pod>> {
    Json(state.manager.list_pods())
}

// ============================================================================
// Node Endpoints
// ============================================================================

/// Node as reported by the API, with its free capacity spelled out
#[derive(Debug, Serialize, Deserialize)]
pub struct NodeSummary {
    #[serde(flatten)]
    pub node: Node,
    pub available: u32,
}

impl From<Node> for NodeSummary {
    fn from(node: Node) -> Self {
        let available = node.available();
        Self { node, available }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterNodeRequest {
    name: String,
    capacity: u32,
}

async fn list_nodes(State(state): State<AppState>) -> Json<ResourceList<NodeSummary>> {
    let items = state
        .manager
        .list_nodes()
        .into_iter()
        .map(NodeSummary::from)
        .collect();
    Json(ResourceList::new("NodeList", items))
}

async fn get_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NodeSummary>, ApiError> {
    state
        .manager
        .get_node(&name)
        .map(|node| Json(node.into()))
        .ok_or_else(|| NodeError::NotFound(name).into())
}

async fn register_node(
    State(state): State<AppState>,
    body: Result<Json<RegisterNodeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OperationStatus>), ApiError> {
    let Json(request) = body?;
    state
        .manager
        .register_node(request.name.clone(), request.capacity)?;
    Ok((
        StatusCode::CREATED,
        Json(OperationStatus::success(format!(
            "Node '{}' registered",
            request.name
        ))),
    ))
}

async fn unregister_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<OperationStatus>, ApiError> {
    state.manager.unregister_node(&name)?;
    Ok(Json(OperationStatus::success(format!(
        "Node '{}' unregistered",
        name
    ))))
}
