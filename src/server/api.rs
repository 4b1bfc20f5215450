use crate::cli::Args;
use crate::error::{ BoxError, ShellError };
use crate::server::{ is_authorized, provided_api_key, tls };
use crate::shell::Shell;
use crate::models::Status;
use std::net::SocketAddr;
use axum::{
    body::{ Body, Bytes },
    extract::{ DefaultBodyLimit, Path, Request, State },
    http::{ header, HeaderMap, StatusCode },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    routing::{ delete, get },
    Json,
    Router,
};
use futures::StreamExt;
use serde::{ Deserialize, Serialize };
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error, warn };

#[derive(Clone)]
pub struct AppState {
    shell: Shell,
    api_key: Option<String>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(shell: Shell, api_key: Option<String>, max_upload_bytes: usize) -> Self {
        Self { shell, api_key, max_upload_bytes }
    }
}

#[derive(Deserialize)]
pub struct SendRequest {
    pub message: String,
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    status: Status,
    notice: Option<String>,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ShellError> for ApiError {
    fn from(err: ShellError) -> Self {
        let status = match &err {
            ShellError::Busy(_) => StatusCode::CONFLICT,
            ShellError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ShellError::FileRead(_) => StatusCode::BAD_REQUEST,
            ShellError::Service(_) => StatusCode::BAD_GATEWAY,
        };
        ApiError::new(status, err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
enum UploadReadError {
    #[error("image exceeds the upload limit of {0} bytes")]
    TooLarge(usize),
    #[error(transparent)]
    Body(#[from] axum::Error),
}

/// Buffers an upload body, stopping as soon as it grows past `limit`.
async fn read_upload(body: Body, limit: usize) -> Result<Vec<u8>, UploadReadError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > limit {
            return Err(UploadReadError::TooLarge(limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Uploads are bounded by `max_upload_bytes` in the handler.
        .route(
            "/api/timeline",
            get(feed_handler).post(upload_handler).layer(DefaultBodyLimit::disable())
        )
        .route("/api/images/{id}", get(image_handler))
        .route("/api/chat", get(chat_handler).post(send_handler))
        .route("/api/status", get(status_handler))
        .route("/api/notice", delete(dismiss_handler))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: &str,
    state: AppState,
    args: &Args,
) -> Result<(), BoxError> {
    let addr = addr.parse::<SocketAddr>()?;
    let app = router(state);

    if let Some((cert_path, key_path)) = tls::tls_paths(args)? {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_config(
            tls::load_tls_config(cert_path, key_path)?
        );

        tokio::spawn(async move {
            let result = axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });

        info!("HTTPS API listening on: https://{}", addr);
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
            format!("Failed to bind HTTP server to {}: {}", addr, e)
        )?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP server error: {}", e);
            }
        });

        info!("HTTP API listening on: http://{}", addr);
    }

    Ok(())
}

async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let header = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok());
    let provided = provided_api_key(header, req.uri().query());

    if !is_authorized(state.api_key.as_deref(), provided.as_deref()) {
        warn!("Rejected {} {}: bad or missing API key", req.method(), req.uri().path());
        return ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}

async fn feed_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.shell.feed().await)
}

async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > state.max_upload_bytes) {
        return Err(ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "image exceeds the upload limit"));
    }

    let read = match read_upload(body, state.max_upload_bytes).await {
        Err(e @ UploadReadError::TooLarge(_)) => {
            warn!("Rejected upload: {}", e);
            return Err(ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()));
        }
        other => other,
    };
    let entry = state.shell.upload_image_from(async move { read }, content_type).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn image_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let image = state.shell
        .image(id).await
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("no image with id {}", id)))?;
    Ok((
        [(header::CONTENT_TYPE, image.media_type.as_mime())],
        Bytes::copy_from_slice(&image.bytes),
    ))
}

async fn chat_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.shell.chat_history().await)
}

async fn send_handler(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Response, ApiError> {
    match state.shell.send_message(&req.message).await? {
        Some(exchange) => Ok(Json(exchange).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        status: state.shell.status(),
        notice: state.shell.notice().await,
    })
}

async fn dismiss_handler(State(state): State<AppState>) -> StatusCode {
    state.shell.dismiss_notice().await;
    StatusCode::NO_CONTENT
}
