use crate::{
    annotations::{Annotation, AnnotationView, CreateAnnotationParams, TagDiff},
    app::{App, IndexOpts, IndexOutcome},
    config::Config,
    errors::StoreError,
    pages::{ContentFingerprint, Locator, PageData, ResolvedIdentity},
    search::{AnnotationsSearchResult, PageSearchResult, SearchRequest},
};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    app: Arc<App>,
}

pub fn router(app: Arc<App>) -> Router {
    let shared_state = Arc::new(SharedState { app });

    Router::new()
        .route("/api/search/pages", post(search_pages))
        .route("/api/search/annotations", post(search_annotations))
        .route("/api/annotations/by_url", post(annotations_by_url))
        .route("/api/annotations/create", post(create_annotation))
        .route("/api/annotations/edit", post(edit_annotation))
        .route("/api/annotations/delete", post(delete_annotation))
        .route("/api/annotations/tags", post(annotation_tags))
        .route("/api/annotations/bookmark", post(annotation_bookmark))
        .route("/api/pages/index", post(index_page))
        .route("/api/pages/identity", post(resolve_identity))
        .route("/api/pages/locators", post(store_locators))
        .route("/api/bookmarks/add", post(add_bookmark))
        .route("/api/bookmarks/delete", post(delete_bookmark))
        .route("/api/lists/create", post(create_list))
        .route("/api/lists/add_page", post(add_page_to_list))
        .route("/api/tags", get(tags))
        .route("/api/config", get(get_config))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(app: Arc<App>, listen_addr: String) -> anyhow::Result<()> {
    let signal = shutdown_signal(app.clone());

    async fn shutdown_signal(app: Arc<App>) {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("failed to install Ctrl+C handler: {err}");
            }
        };

        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(err) => log::error!("failed to install signal handler: {err}"),
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        log::warn!("shutting down, flushing collections");
        if let Err(err) = app.flush() {
            log::error!("flush failed: {err}");
        }
    }

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    log::info!("listening on {listen_addr}");
    axum::serve(listener, router(app))
        .with_graceful_shutdown(signal)
        .await?;

    Ok(())
}

pub fn start_daemon(app: Arc<App>, listen_addr: String) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(app, listen_addr).await })
}

#[derive(Debug)]
struct HttpError(StoreError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            StoreError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            StoreError::Validation(_) => axum::http::StatusCode::BAD_REQUEST,
            StoreError::Storage(_) | StoreError::IO(_) | StoreError::Serde(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl From<StoreError> for HttpError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

type ApiResult<T> = Result<Json<T>, HttpError>;

/// Runs a blocking core call on the worker thread.
fn blocking<T, F>(state: &SharedState, f: F) -> ApiResult<T>
where
    F: FnOnce(&App) -> Result<T, StoreError>,
{
    let app = state.app.clone();
    tokio::task::block_in_place(move || f(&app).map(Json).map_err(Into::into))
}

async fn search_pages(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> ApiResult<PageSearchResult> {
    log::debug!("payload: {payload:?}");

    blocking(&state, |app| {
        let params = app.search_params(payload)?;
        app.search_pages(&params)
    })
}

async fn search_annotations(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> ApiResult<AnnotationsSearchResult> {
    log::debug!("payload: {payload:?}");

    blocking(&state, |app| {
        let params = app.search_params(payload)?;
        app.search_annotations(&params)
    })
}

#[derive(Debug, Deserialize)]
pub struct AnnotationsByUrlRequest {
    pub url: String,
    #[serde(flatten)]
    pub filters: SearchRequest,
}

async fn annotations_by_url(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<AnnotationsByUrlRequest>,
) -> ApiResult<Vec<AnnotationView>> {
    blocking(&state, |app| {
        app.get_all_annotations_by_url(&payload.url, payload.filters)
    })
}

async fn create_annotation(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<CreateAnnotationParams>,
) -> ApiResult<Annotation> {
    log::debug!("payload: {payload:?}");

    blocking(&state, |app| app.create_annotation(payload))
}

#[derive(Debug, Deserialize)]
pub struct EditAnnotationRequest {
    pub url: String,
    pub comment: String,
}

async fn edit_annotation(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<EditAnnotationRequest>,
) -> ApiResult<serde_json::Value> {
    blocking(&state, |app| {
        app.edit_annotation(&payload.url, &payload.comment)?;
        Ok(json!({}))
    })
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

async fn delete_annotation(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<UrlRequest>,
) -> ApiResult<serde_json::Value> {
    blocking(&state, |app| {
        app.delete_annotation(&payload.url)?;
        Ok(json!({}))
    })
}

#[derive(Debug, Deserialize)]
pub struct AnnotationTagsRequest {
    pub url: String,
    pub tags: Vec<String>,
}

async fn annotation_tags(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<AnnotationTagsRequest>,
) -> ApiResult<TagDiff> {
    blocking(&state, |app| {
        app.update_annotation_tags(&payload.url, &payload.tags)
    })
}

#[derive(Debug, Deserialize)]
pub struct AnnotationBookmarkRequest {
    pub url: String,
    pub is_bookmarked: bool,
}

async fn annotation_bookmark(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<AnnotationBookmarkRequest>,
) -> ApiResult<serde_json::Value> {
    blocking(&state, |app| {
        app.set_annotation_bookmark(&payload.url, payload.is_bookmarked)?;
        Ok(json!({}))
    })
}

#[derive(Debug, Deserialize)]
pub struct IndexPageRequest {
    pub page: PageData,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub visit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub opts: IndexOpts,
}

async fn index_page(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<IndexPageRequest>,
) -> ApiResult<IndexOutcome> {
    log::debug!("indexing {}", payload.page.full_url);

    blocking(&state, |app| {
        app.index_page(payload.page, payload.visit_time, payload.opts)
    })
}

#[derive(Debug, Deserialize)]
pub struct ResolveIdentityRequest {
    pub fingerprints: Vec<ContentFingerprint>,
}

async fn resolve_identity(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ResolveIdentityRequest>,
) -> ApiResult<Option<ResolvedIdentity>> {
    blocking(&state, |app| app.resolve_content_identity(&payload.fingerprints))
}

#[derive(Debug, Deserialize)]
pub struct StoreLocatorsRequest {
    pub full_url: String,
    pub locators: Vec<Locator>,
}

#[derive(Debug, Serialize)]
pub struct StoreLocatorsResponse {
    pub stored: usize,
}

async fn store_locators(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<StoreLocatorsRequest>,
) -> ApiResult<StoreLocatorsResponse> {
    blocking(&state, |app| {
        let stored = app.store_locators(&payload.full_url, &payload.locators)?;
        Ok(StoreLocatorsResponse { stored })
    })
}

#[derive(Debug, Deserialize)]
pub struct AddBookmarkRequest {
    pub url: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub time: Option<DateTime<Utc>>,
}

async fn add_bookmark(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<AddBookmarkRequest>,
) -> ApiResult<serde_json::Value> {
    blocking(&state, |app| {
        app.add_page_bookmark(&payload.url, payload.time)?;
        Ok(json!({}))
    })
}

#[derive(Debug, Serialize)]
pub struct DeleteBookmarkResponse {
    pub page_deleted: bool,
}

async fn delete_bookmark(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<UrlRequest>,
) -> ApiResult<DeleteBookmarkResponse> {
    blocking(&state, |app| {
        let page_deleted = app.del_page_bookmark(&payload.url)?;
        Ok(DeleteBookmarkResponse { page_deleted })
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateListRequest {
    pub name: String,
}

async fn create_list(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<CreateListRequest>,
) -> ApiResult<serde_json::Value> {
    blocking(&state, |app| {
        let id = app.create_list(&payload.name)?;
        Ok(json!({ "id": id }))
    })
}

#[derive(Debug, Deserialize)]
pub struct AddPageToListRequest {
    pub list_id: i64,
    pub url: String,
}

async fn add_page_to_list(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<AddPageToListRequest>,
) -> ApiResult<serde_json::Value> {
    blocking(&state, |app| {
        let added = app.add_page_to_list(payload.list_id, &payload.url)?;
        Ok(json!({ "added": added }))
    })
}

async fn tags(State(state): State<Arc<SharedState>>) -> ApiResult<Vec<String>> {
    blocking(&state, |app| app.tags())
}

async fn get_config(State(state): State<Arc<SharedState>>) -> ApiResult<Config> {
    blocking(&state, |app| app.get_config())
}
