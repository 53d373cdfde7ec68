//! Axum handlers for the creative API.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::{from_fn, Next};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use adpack_core::prelude::*;
use adpack_exec::{Engine, ExportOptions, InitRequest, InitSummary, RenderRequest, RenderSummary};
use adpack_io::WorkspaceDirectory;

use crate::error::ApiError;

const REQUEST_ID: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub directory: Arc<dyn WorkspaceDirectory>,
}

impl AppState {
    pub fn new(engine: Engine, directory: Arc<dyn WorkspaceDirectory>) -> Self {
        Self { engine, directory }
    }
}

#[derive(Debug, Deserialize)]
pub struct InitBody {
    pub workspace_id: WorkspaceId,
    #[serde(flatten)]
    pub request: InitRequest,
}

#[derive(Debug, Deserialize)]
pub struct RenderBody {
    pub workspace_id: WorkspaceId,
    pub job_id: JobId,
    #[serde(flatten)]
    pub request: RenderRequest,
}

#[derive(Debug, Deserialize)]
pub struct ExportBody {
    pub workspace_id: WorkspaceId,
    pub job_id: JobId,
    #[serde(flatten)]
    pub options: ExportOptions,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub export: ExportManifest,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub workspace_id: WorkspaceId,
    #[serde(flatten)]
    pub decision: ReviewDecision,
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceQuery {
    pub workspace_id: WorkspaceId,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/creative/init", post(init_job))
        .route("/creative/render", post(render_job))
        .route("/creative/export", post(export_job))
        .route("/creative/jobs/:job_id", get(job_detail))
        .route(
            "/creative/approvals/:approval_id/decision",
            post(decide_approval),
        )
        .layer(from_fn(request_log_middleware))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "adpack api listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Pins one request id on the request and echoes it on the response.
async fn request_log_middleware(
    mut request: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    let rid = request_id(request.headers());
    let header = HeaderValue::from_str(&rid).ok();
    if let Some(value) = &header {
        request.headers_mut().insert(REQUEST_ID, value.clone());
    }
    tracing::info!(
        request_id = %rid,
        method = %request.method(),
        path = request.uri().path(),
        "api request"
    );
    let mut response = next.run(request).await;
    if let Some(value) = header {
        response.headers_mut().insert(REQUEST_ID, value);
    }
    response
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller and check they belong to `workspace`.
async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    workspace: WorkspaceId,
) -> Result<UserId, ApiError> {
    let token = bearer(headers).ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    let user = state
        .directory
        .authenticate(token)
        .await
        .ok_or_else(|| ApiError::unauthorized("unknown or revoked token"))?;
    if !state.directory.is_member(user, workspace).await {
        tracing::warn!(%user, %workspace, "membership check failed");
        return Err(ApiError::forbidden(format!(
            "not a member of workspace {workspace}"
        )));
    }
    Ok(user)
}

fn tagged<E: Into<ApiError>>(rid: &str) -> impl FnOnce(E) -> ApiError + '_ {
    move |e| e.into().with_request_id(rid)
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::bad_request(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::bad_request(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::bad_request(e.body_text())
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn init_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<InitBody>, JsonRejection>,
) -> Result<Json<InitSummary>, ApiError> {
    let rid = request_id(&headers);
    let Json(body) = payload.map_err(tagged(&rid))?;
    authorize(&state, &headers, body.workspace_id)
        .await
        .map_err(tagged(&rid))?;

    let summary = state
        .engine
        .init(body.workspace_id, body.request)
        .await
        .map_err(tagged(&rid))?;
    tracing::info!(
        request_id = %rid,
        job_id = %summary.job_id,
        status = %summary.status,
        replay = summary.idempotent_replay,
        "creative init"
    );
    Ok(Json(summary))
}

async fn render_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RenderBody>, JsonRejection>,
) -> Result<Json<RenderSummary>, ApiError> {
    let rid = request_id(&headers);
    let Json(body) = payload.map_err(tagged(&rid))?;
    authorize(&state, &headers, body.workspace_id)
        .await
        .map_err(tagged(&rid))?;

    let summary = state
        .engine
        .render(body.workspace_id, body.job_id, body.request)
        .await
        .map_err(tagged(&rid))?;
    tracing::info!(
        request_id = %rid,
        job_id = %summary.job_id,
        status = %summary.status,
        cost_cents = summary.cost_estimate_cents,
        "creative render"
    );
    Ok(Json(summary))
}

async fn export_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ExportBody>, JsonRejection>,
) -> Result<Json<ExportResponse>, ApiError> {
    let rid = request_id(&headers);
    let Json(body) = payload.map_err(tagged(&rid))?;
    let user = authorize(&state, &headers, body.workspace_id)
        .await
        .map_err(tagged(&rid))?;

    let export = state
        .engine
        .export(body.workspace_id, body.job_id, user, &body.options)
        .map_err(tagged(&rid))?;
    Ok(Json(ExportResponse { export }))
}

async fn job_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    job_id: Result<Path<JobId>, PathRejection>,
    query: Result<Query<WorkspaceQuery>, QueryRejection>,
) -> Result<Json<Job>, ApiError> {
    let rid = request_id(&headers);
    let Path(job_id) = job_id.map_err(tagged(&rid))?;
    let Query(query) = query.map_err(tagged(&rid))?;
    authorize(&state, &headers, query.workspace_id)
        .await
        .map_err(tagged(&rid))?;

    let job = state
        .engine
        .job(query.workspace_id, job_id)
        .map_err(tagged(&rid))?;
    Ok(Json(job))
}

async fn decide_approval(
    State(state): State<AppState>,
    headers: HeaderMap,
    approval_id: Result<Path<ApprovalId>, PathRejection>,
    payload: Result<Json<DecisionBody>, JsonRejection>,
) -> Result<Json<ApprovalItem>, ApiError> {
    let rid = request_id(&headers);
    let Path(approval_id) = approval_id.map_err(tagged(&rid))?;
    let Json(body) = payload.map_err(tagged(&rid))?;
    let reviewer = authorize(&state, &headers, body.workspace_id)
        .await
        .map_err(tagged(&rid))?;

    let item = state
        .engine
        .decide_approval(body.workspace_id, approval_id, reviewer, body.decision)
        .map_err(tagged(&rid))?;
    Ok(Json(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use adpack_core::config::PipelineConfig;
    use adpack_io::{
        DirectoryEntry, GenerationError, GenerationPurpose, GenerationRequest, GenerationService,
        RenderError, RenderPoll, RenderService, RenderStatus, SceneDescription, StaticDirectory,
    };

    struct CannedGeneration;

    #[async_trait]
    impl GenerationService for CannedGeneration {
        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            let out = match request.purpose {
                GenerationPurpose::Copy => json!({
                    "hooks": ["Stop scrolling", "Summer is here"],
                    "scripts": [{"duration_s": 15, "text": "Everything on sale."}],
                    "ctas": ["Shop now"],
                    "headlines": ["Summer Sale"],
                    "primary_texts": ["Shop the summer collection."]
                }),
                GenerationPurpose::Blueprint { .. } => json!({
                    "scenes": [{"start_s": 0, "end_s": 15,
                        "text_overlay": {"text": "Summer Sale", "position": "center", "inside_safe_zone": true}}],
                    "subtitles": [{"start_s": 0, "end_s": 3, "text": "Summer Sale"}]
                }),
                GenerationPurpose::Compliance => json!({"approved": true, "issues": []}),
            };
            Ok(out.to_string())
        }
    }

    struct InstantRender;

    #[async_trait]
    impl RenderService for InstantRender {
        async fn submit(&self, scene: &SceneDescription) -> Result<String, RenderError> {
            Ok(format!("r-{}x{}", scene.width, scene.height))
        }

        async fn poll(&self, render_id: &str) -> Result<RenderPoll, RenderError> {
            Ok(RenderPoll {
                status: RenderStatus::Done,
                url: Some(format!("https://cdn.test/{render_id}.mp4")),
                thumbnail_url: None,
                error: None,
            })
        }
    }

    struct Fixture {
        router: Router,
        workspace: WorkspaceId,
        other_workspace: WorkspaceId,
    }

    fn fixture() -> Fixture {
        let workspace = WorkspaceId::new();
        let other_workspace = WorkspaceId::new();
        let cfg = PipelineConfig {
            render_poll_interval_ms: 1,
            ..PipelineConfig::default()
        };
        let engine =
            Engine::in_memory(cfg, Arc::new(CannedGeneration), Arc::new(InstantRender)).unwrap();
        let directory = StaticDirectory::from_entries([DirectoryEntry {
            token: "tok-alice".into(),
            user_id: UserId::new(),
            workspaces: vec![workspace],
        }]);
        Fixture {
            router: build_router(AppState::new(engine, Arc::new(directory))),
            workspace,
            other_workspace,
        }
    }

    fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn init_payload(workspace: WorkspaceId) -> Value {
        json!({
            "workspace_id": workspace,
            "objective": "sale",
            "offer": "Summer Sale",
            "duration_s": 15,
            "site_url": "https://shop.test/summer"
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let f = fixture();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = f.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let f = fixture();
        let req = post("/creative/init", None, init_payload(f.workspace));
        let resp = f.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["code"], "unauthorized");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn foreign_workspace_is_forbidden() {
        let f = fixture();
        let req = post(
            "/creative/init",
            Some("tok-alice"),
            init_payload(f.other_workspace),
        );
        let resp = f.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let f = fixture();
        let req = post(
            "/creative/init",
            Some("tok-alice"),
            json!({"workspace_id": f.workspace}),
        );
        let resp = f.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn init_render_export_round() {
        let f = fixture();

        let resp = f
            .router
            .clone()
            .oneshot(post(
                "/creative/init",
                Some("tok-alice"),
                init_payload(f.workspace),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(REQUEST_ID));
        let init = json_body(resp).await;
        assert_eq!(init["status"], "done");
        assert_eq!(init["blueprint_count"], 6);
        assert_eq!(init["idempotent_replay"], false);
        assert!(init["approval_id"].is_string());
        let job_id = init["job_id"].clone();

        let resp = f
            .router
            .clone()
            .oneshot(post(
                "/creative/render",
                Some("tok-alice"),
                json!({"workspace_id": f.workspace, "job_id": job_id}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let render = json_body(resp).await;
        assert_eq!(render["status"], "done");
        assert_eq!(render["renders"].as_array().map(Vec::len), Some(3));

        let resp = f
            .router
            .clone()
            .oneshot(post(
                "/creative/export",
                Some("tok-alice"),
                json!({"workspace_id": f.workspace, "job_id": job_id}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let export = json_body(resp).await;
        assert_eq!(export["export"]["videos"].as_array().map(Vec::len), Some(3));
        assert_eq!(export["export"]["utm_links"].as_array().map(Vec::len), Some(4));

        let detail = Request::builder()
            .uri(format!(
                "/creative/jobs/{}?workspace_id={}",
                job_id.as_str().unwrap(),
                f.workspace
            ))
            .header("authorization", "Bearer tok-alice")
            .body(Body::empty())
            .unwrap();
        let resp = f.router.oneshot(detail).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "done");
    }

    #[tokio::test]
    async fn export_without_assets_is_not_found() {
        let f = fixture();
        let resp = f
            .router
            .oneshot(post(
                "/creative/export",
                Some("tok-alice"),
                json!({"workspace_id": f.workspace, "job_id": JobId::new()}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn second_decision_conflicts() {
        let f = fixture();
        let resp = f
            .router
            .clone()
            .oneshot(post(
                "/creative/init",
                Some("tok-alice"),
                init_payload(f.workspace),
            ))
            .await
            .unwrap();
        let init = json_body(resp).await;
        let approval = init["approval_id"].as_str().unwrap().to_string();
        let uri = format!("/creative/approvals/{approval}/decision");
        let body = json!({"workspace_id": f.workspace, "decision": "approve"});

        let first = f
            .router
            .clone()
            .oneshot(post(&uri, Some("tok-alice"), body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(json_body(first).await["state"], "approved");

        let second = f
            .router
            .oneshot(post(&uri, Some("tok-alice"), body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(second).await["error"]["code"], "conflict");
    }
}
