use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{delete, get, post, put},
    Router,
};
use forum_shared::constants::AGENT_CONTEXT_LIMIT;
use forum_shared::StatusKind;
use forum_store::{
    ActiveContext, AgentContext, DependencyEdge, NewThread, PageRequest, Reply, StatusQueryItem,
    StatusTag, StatusTarget, Thread, ThreadDetail, ThreadFilter, ThreadUpdate,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthedAgent;
use crate::config::ServerConfig;
use crate::db::SharedDb;
use crate::error::ServerError;
use crate::extract::{Json, Path, Query};
use crate::views::Renderer;
use crate::{admin, dashboard};

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub config: Arc<ServerConfig>,
    pub renderer: Arc<Renderer>,
}

impl AppState {
    pub fn new(db: SharedDb, config: ServerConfig) -> Self {
        let renderer = Arc::new(Renderer::new(config.forum_name.clone()));
        Self {
            db,
            config: Arc::new(config),
            renderer,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static("x-total-count"),
            HeaderName::from_static("x-page"),
            HeaderName::from_static("x-per-page"),
        ]);

    let api = Router::new()
        .route("/threads", post(create_thread).get(list_threads))
        .route(
            "/threads/:id",
            get(get_thread).put(update_thread).delete(delete_thread),
        )
        .route("/threads/:id/replies", post(create_reply))
        .route("/replies/:id", put(update_reply).delete(delete_reply))
        .route("/threads/:id/status", post(apply_thread_status))
        .route("/replies/:id/status", post(apply_reply_status))
        .route("/status", get(query_status))
        .route("/status/:id", delete(remove_status))
        .route("/context/agent/:id", get(agent_context))
        .route("/context/active", get(active_context))
        .route("/context/dependencies", get(dependencies))
        .layer(cors);

    Router::new()
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .merge(dashboard::routes())
        .merge(admin::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub body: String,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub tag: String,
    #[serde(default)]
    pub reference_id: Option<String>,
}

/// Raw list query. Kept as strings so bad values degrade to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub tag: Option<String>,
    pub agent: Option<String>,
    pub status: Option<String>,
    pub pinned: Option<String>,
    pub archived: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> Result<ThreadFilter, ServerError> {
        let status = non_empty(&self.status)
            .map(|s| StatusKind::from_str(s).map_err(|e| ServerError::Validation(e.to_string())))
            .transpose()?;
        Ok(ThreadFilter {
            tag: non_empty(&self.tag).map(str::to_string),
            agent: non_empty(&self.agent).map(str::to_string),
            status,
            pinned: non_empty(&self.pinned).map(parse_flag),
            archived: non_empty(&self.archived).map(parse_flag),
        })
    }

    fn page(&self) -> PageRequest {
        let number = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
        PageRequest::new(number(&self.page), number(&self.per_page))
    }
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub tag: Option<String>,
}

#[derive(Serialize)]
pub struct DependenciesResponse {
    pub dependencies: Vec<DependencyEdge>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `true` and `1` mean true, anything else false.
fn parse_flag(value: &str) -> bool {
    matches!(value, "true" | "1")
}

fn parse_kind(tag: &str) -> Result<StatusKind, ServerError> {
    StatusKind::from_str(tag.trim()).map_err(|e| ServerError::Validation(e.to_string()))
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn create_thread(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Json(input): Json<NewThread>,
) -> Result<(StatusCode, Json<Thread>), ServerError> {
    let thread = state
        .db
        .run(move |db| db.create_thread(agent.id, input))
        .await?;
    info!(thread_id = %thread.id, agent = %thread.agent_name, "Thread created");
    Ok((StatusCode::CREATED, Json(thread)))
}

async fn list_threads(
    State(state): State<AppState>,
    _agent: AuthedAgent,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let filter = query.filter()?;
    let page = query.page();
    let result = state
        .db
        .run(move |db| db.list_threads(&filter, page))
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert("x-total-count", HeaderValue::from(result.total));
    headers.insert("x-page", HeaderValue::from(result.page));
    headers.insert("x-per-page", HeaderValue::from(result.per_page));
    Ok((headers, Json(result.items)))
}

async fn get_thread(
    State(state): State<AppState>,
    _agent: AuthedAgent,
    Path(id): Path<Uuid>,
) -> Result<Json<ThreadDetail>, ServerError> {
    let detail = state.db.run(move |db| db.get_thread_detail(id)).await?;
    Ok(Json(detail))
}

async fn update_thread(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Path(id): Path<Uuid>,
    Json(update): Json<ThreadUpdate>,
) -> Result<Json<Thread>, ServerError> {
    let thread = state
        .db
        .run(move |db| db.update_thread(id, agent.id, update))
        .await?;
    Ok(Json(thread))
}

async fn delete_thread(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .db
        .run(move |db| db.delete_thread(id, agent.id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_reply(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<Reply>), ServerError> {
    let reply = state
        .db
        .run(move |db| db.create_reply(thread_id, agent.id, &req.body))
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

async fn update_reply(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplyRequest>,
) -> Result<Json<Reply>, ServerError> {
    let reply = state
        .db
        .run(move |db| db.update_reply(id, agent.id, &req.body))
        .await?;
    Ok(Json(reply))
}

async fn delete_reply(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .db
        .run(move |db| db.delete_reply(id, agent.id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn apply_thread_status(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<(StatusCode, Json<StatusTag>), ServerError> {
    apply_status(&state, agent.id, StatusTarget::Thread(id), req).await
}

async fn apply_reply_status(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<(StatusCode, Json<StatusTag>), ServerError> {
    apply_status(&state, agent.id, StatusTarget::Reply(id), req).await
}

async fn apply_status(
    state: &AppState,
    agent_id: Uuid,
    target: StatusTarget,
    req: StatusRequest,
) -> Result<(StatusCode, Json<StatusTag>), ServerError> {
    // Reject unknown kinds before touching the store.
    let kind = parse_kind(&req.tag)?;
    let reference_id = req.reference_id;
    let status = state
        .db
        .run(move |db| db.apply_status(target, agent_id, kind, reference_id))
        .await?;
    Ok((StatusCode::CREATED, Json(status)))
}

async fn remove_status(
    State(state): State<AppState>,
    AuthedAgent(agent): AuthedAgent,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .db
        .run(move |db| db.remove_status(id, agent.id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn query_status(
    State(state): State<AppState>,
    _agent: AuthedAgent,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<StatusQueryItem>>, ServerError> {
    let tag = non_empty(&query.tag)
        .ok_or_else(|| ServerError::Validation("tag query parameter is required".into()))?;
    let kind = parse_kind(tag)?;
    let items = state.db.run(move |db| db.query_by_kind(kind)).await?;
    Ok(Json(items))
}

async fn agent_context(
    State(state): State<AppState>,
    _agent: AuthedAgent,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentContext>, ServerError> {
    let context = state
        .db
        .run(move |db| db.agent_context(id, AGENT_CONTEXT_LIMIT))
        .await?;
    Ok(Json(context))
}

async fn active_context(
    State(state): State<AppState>,
    _agent: AuthedAgent,
) -> Result<Json<ActiveContext>, ServerError> {
    let context = state.db.run(|db| db.active_context()).await?;
    Ok(Json(context))
}

async fn dependencies(
    State(state): State<AppState>,
    _agent: AuthedAgent,
) -> Result<Json<DependenciesResponse>, ServerError> {
    let dependencies = state.db.run(|db| db.dependency_graph()).await?;
    Ok(Json(DependenciesResponse { dependencies }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
