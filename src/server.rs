//! JSON HTTP API.
//!
//! Exposes the three pipeline functions plus the read/edit views that a
//! front end needs. Request and response bodies use camelCase keys.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/functions/process-document` | Extract action items from pre-chunked text |
//! | `POST` | `/functions/summarize-action-items` | Merge action items into tasks |
//! | `POST` | `/functions/update-business-requirements` | Regenerate the meeting BRD |
//! | `GET`/`POST` | `/projects` | List / create projects |
//! | `GET`/`POST` | `/meetings` | List / create meetings |
//! | `GET`  | `/meetings/{id}` | One meeting |
//! | `GET`/`POST` | `/meetings/{id}/documents` | Uploaded documents / upload (raw body, `?filename=`) |
//! | `GET`  | `/meetings/{id}/chunks` | Stored chunks |
//! | `GET`/`POST` | `/meetings/{id}/action-items` | List (`?sort=&direction=`) / add manually |
//! | `PATCH`| `/action-items/{id}` | Edit an action item |
//! | `GET`  | `/meetings/{id}/tasks` | List tasks |
//! | `PATCH`| `/tasks/{id}` | Edit a task |
//! | `GET`/`POST` | `/meetings/{id}/requirements` | Latest BRD (or template) / save a version |
//! | `GET`  | `/meetings/{id}/requirements/versions` | Version history |
//! | `GET`  | `/meetings/{id}/requirements/versions/{version}` | One version |
//!
//! # Error Contract
//!
//! ```json
//! { "success": false, "error": "meeting 42 not found", "code": "not_found" }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `unsupported_format` (415),
//! `no_action_items` (422), `upstream` (502), `malformed_model_output` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::context::AppContext;
use crate::edit::edit_item;
use crate::error::Error;
use crate::ingest::{self, IngestRequest, IngestResponse, UploadOutcome};
use crate::meetings::{self, NewMeeting, NewProject};
use crate::migrate;
use crate::models::{
    BusinessRequirement, Document, ItemRecord, Meeting, Project, StoredChunk, VersionSummary,
    DEFAULT_USER,
};
use crate::records::{self, ItemDraft, ItemPatch, ItemTable, Sort};
use crate::requirements::{self, CurrentRequirements, RegenerateResponse};
use crate::summarize::{self, SummarizeRequest, SummarizeResponse};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the API router over a ready context.
pub fn router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/functions/process-document", post(handle_process_document))
        .route("/functions/summarize-action-items", post(handle_summarize))
        .route(
            "/functions/update-business-requirements",
            post(handle_update_requirements),
        )
        .route("/projects", get(handle_list_projects).post(handle_create_project))
        .route("/meetings", get(handle_list_meetings).post(handle_create_meeting))
        .route("/meetings/{id}", get(handle_get_meeting))
        .route(
            "/meetings/{id}/documents",
            get(handle_list_documents)
                .post(handle_upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/meetings/{id}/chunks", get(handle_list_chunks))
        .route(
            "/meetings/{id}/action-items",
            get(handle_list_action_items).post(handle_create_action_item),
        )
        .route("/action-items/{id}", patch(handle_patch_action_item))
        .route("/meetings/{id}/tasks", get(handle_list_tasks))
        .route("/tasks/{id}", patch(handle_patch_task))
        .route(
            "/meetings/{id}/requirements",
            get(handle_get_requirements).post(handle_save_requirements),
        )
        .route(
            "/meetings/{id}/requirements/versions",
            get(handle_list_versions),
        )
        .route(
            "/meetings/{id}/requirements/versions/{version}",
            get(handle_get_version),
        )
        .layer(cors)
        .with_state(ctx)
}

/// Start the HTTP server on `[server].bind`.
///
/// Applies migrations first, so a fresh database works without `mact init`.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = AppContext::from_config(config).await?;
    migrate::apply(&ctx.pool).await?;

    let bind_addr = config.server.bind.clone();
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    println!("mact server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: &'static str,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::UnsupportedFileFormat(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format"),
            Error::Extraction(_) | Error::InvalidRequest(_) | Error::InvalidState(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::NoActionItems => (StatusCode::UNPROCESSABLE_ENTITY, "no_action_items"),
            Error::UpstreamHttp { .. } | Error::Transport(_) => (StatusCode::BAD_GATEWAY, "upstream"),
            Error::MalformedModelOutput(_) => (StatusCode::BAD_GATEWAY, "malformed_model_output"),
            Error::Database(_) | Error::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        if status.is_server_error() {
            tracing::error!("request failed: {}", err);
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

/// Unwrap a JSON body, reporting malformed input in the error contract.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Pipeline functions ============

async fn handle_process_document(
    State(ctx): State<AppContext>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> ApiResult<IngestResponse> {
    let request = json_body(payload)?;
    Ok(Json(ingest::process_document(&ctx, &request).await?))
}

async fn handle_summarize(
    State(ctx): State<AppContext>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<SummarizeResponse> {
    let request = json_body(payload)?;
    Ok(Json(summarize::summarize(&ctx, &request).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegenerateRequest {
    #[serde(default)]
    meeting_id: String,
}

async fn handle_update_requirements(
    State(ctx): State<AppContext>,
    payload: Result<Json<RegenerateRequest>, JsonRejection>,
) -> ApiResult<RegenerateResponse> {
    let request = json_body(payload)?;
    Ok(Json(requirements::regenerate(&ctx, &request.meeting_id).await?))
}

// ============ Projects & meetings ============

async fn handle_list_projects(State(ctx): State<AppContext>) -> ApiResult<Vec<Project>> {
    Ok(Json(meetings::list_projects(&ctx.pool).await?))
}

async fn handle_create_project(
    State(ctx): State<AppContext>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let new = json_body(payload)?;
    let project = meetings::create_project(&ctx.pool, &new).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingsQuery {
    project_id: Option<String>,
}

async fn handle_list_meetings(
    State(ctx): State<AppContext>,
    Query(query): Query<MeetingsQuery>,
) -> ApiResult<Vec<Meeting>> {
    Ok(Json(
        meetings::list_meetings(&ctx.pool, query.project_id.as_deref()).await?,
    ))
}

async fn handle_create_meeting(
    State(ctx): State<AppContext>,
    payload: Result<Json<NewMeeting>, JsonRejection>,
) -> Result<(StatusCode, Json<Meeting>), AppError> {
    let new = json_body(payload)?;
    let meeting = meetings::create_meeting(&ctx.pool, &new).await?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

async fn handle_get_meeting(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Meeting> {
    Ok(Json(meetings::get_meeting(&ctx.pool, &id).await?))
}

// ============ Documents & chunks ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadQuery {
    filename: Option<String>,
    user_id: Option<String>,
}

async fn handle_upload(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadOutcome>), AppError> {
    let filename = query
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| bad_request("filename query parameter is required"))?;
    if body.is_empty() {
        return Err(bad_request("request body is empty"));
    }
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| *v != "application/octet-stream");

    let outcome = ingest::upload_document(
        &ctx,
        &id,
        Some(query.user_id.as_deref().unwrap_or(DEFAULT_USER)),
        &filename,
        media_type,
        body.to_vec(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn handle_list_documents(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Document>> {
    meetings::get_meeting(&ctx.pool, &id).await?;
    Ok(Json(records::list_documents(&ctx.pool, &id).await?))
}

async fn handle_list_chunks(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Vec<StoredChunk>> {
    meetings::get_meeting(&ctx.pool, &id).await?;
    Ok(Json(records::list_chunks(&ctx.pool, &id).await?))
}

// ============ Action items & tasks ============

#[derive(Deserialize)]
struct ListQuery {
    sort: Option<String>,
    direction: Option<String>,
}

async fn list_table(
    ctx: &AppContext,
    table: ItemTable,
    meeting_id: &str,
    query: &ListQuery,
) -> ApiResult<Vec<ItemRecord>> {
    let sort = Sort::parse(query.sort.as_deref(), query.direction.as_deref())?;
    meetings::get_meeting(&ctx.pool, meeting_id).await?;
    Ok(Json(
        records::list_items(&ctx.pool, table, meeting_id, sort).await?,
    ))
}

async fn handle_list_action_items(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<ItemRecord>> {
    list_table(&ctx, ItemTable::ActionItems, &id, &query).await
}

async fn handle_list_tasks(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<ItemRecord>> {
    list_table(&ctx, ItemTable::Tasks, &id, &query).await
}

async fn handle_create_action_item(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: Result<Json<ItemDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<ItemRecord>), AppError> {
    let draft = json_body(payload)?;
    let user_id = draft.user_id.clone().unwrap_or_else(|| DEFAULT_USER.to_string());
    let record = records::create_item(
        &ctx.pool,
        ItemTable::ActionItems,
        &id,
        &user_id,
        &draft.to_new_item()?,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn handle_patch_action_item(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: Result<Json<ItemPatch>, JsonRejection>,
) -> ApiResult<ItemRecord> {
    let patch = json_body(payload)?;
    Ok(Json(edit_item(&ctx.pool, ItemTable::ActionItems, &id, &patch).await?))
}

async fn handle_patch_task(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: Result<Json<ItemPatch>, JsonRejection>,
) -> ApiResult<ItemRecord> {
    let patch = json_body(payload)?;
    Ok(Json(edit_item(&ctx.pool, ItemTable::Tasks, &id, &patch).await?))
}

// ============ Business requirements ============

async fn handle_get_requirements(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<CurrentRequirements> {
    meetings::get_meeting(&ctx.pool, &id).await?;
    Ok(Json(requirements::current_or_template(&ctx.pool, &id).await))
}

#[derive(Deserialize)]
struct SaveRequirementsRequest {
    content: String,
}

async fn handle_save_requirements(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: Result<Json<SaveRequirementsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BusinessRequirement>), AppError> {
    let request = json_body(payload)?;
    let saved = requirements::save(&ctx, &id, &request.content).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn handle_list_versions(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Vec<VersionSummary>> {
    meetings::get_meeting(&ctx.pool, &id).await?;
    Ok(Json(requirements::list_versions(&ctx.pool, &id).await?))
}

async fn handle_get_version(
    State(ctx): State<AppContext>,
    Path((id, version)): Path<(String, i64)>,
) -> ApiResult<BusinessRequirement> {
    Ok(Json(requirements::get_version(&ctx.pool, &id, version).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_contract_codes() {
        let cases = [
            (Error::NotFound("meeting x".into()), 404, "not_found"),
            (Error::NoActionItems, 422, "no_action_items"),
            (Error::UnsupportedFileFormat("a.txt".into()), 415, "unsupported_format"),
            (Error::Transport("timeout".into()), 502, "upstream"),
            (Error::MalformedModelOutput("x".into()), 502, "malformed_model_output"),
            (Error::InvalidState("x".into()), 400, "bad_request"),
            (Error::Storage("disk".into()), 500, "internal"),
        ];
        for (err, status, code) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status.as_u16(), status);
            assert_eq!(app.code, code);
        }
    }
}
