use crate::config::AppConfig;
use crate::export::{self, PNG_MIME};
use crate::form;
use crate::session::{Session, SessionStore};
use crate::types::{RegionSet, RenderRequest, SavedEntry};
use anyhow::Result;
use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

const SESSION_COOKIE: &str = "map_session";

pub struct AppState {
    pub regions: Arc<RegionSet>,
    pub sessions: SessionStore,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, regions: Arc<RegionSet>) -> Self {
        let sessions = SessionStore::new(Duration::from_secs(config.server.session_ttl_secs));
        Self {
            regions,
            sessions,
            config,
        }
    }

    fn with_session<R>(&self, headers: &HeaderMap, f: impl FnOnce(&mut Session) -> R) -> (Uuid, R) {
        self.sessions.with_session(
            session_cookie(headers),
            || Session::new(&self.regions, &self.config.defaults),
            f,
        )
    }

    /// Like `with_session`, but a request that fails before any session exists
    /// does not start one.
    fn try_with_session<R>(
        &self,
        headers: &HeaderMap,
        f: impl FnOnce(&mut Session) -> Result<R>,
    ) -> (Uuid, Result<R>) {
        self.sessions.try_with_session(
            session_cookie(headers),
            || Session::new(&self.regions, &self.config.defaults),
            f,
        )
    }
}

/// Error returned by handlers: a status code plus the underlying cause.
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn bad_request(error: anyhow::Error) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(error: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(error = %format!("{:#}", self.error), "Request failed");
        }
        (self.status, format!("{:#}", self.error)).into_response()
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, id)| Uuid::parse_str(id).ok())
}

fn set_cookie(id: Uuid) -> AppendHeaders<[(header::HeaderName, String); 1]> {
    AppendHeaders([(
        header::SET_COOKIE,
        format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id),
    )])
}

/// `Content-Disposition` value carrying both an ASCII fallback and the exact
/// UTF-8 name.
fn attachment(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' { c } else { '_' })
        .collect();
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect();
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/update", post(update_handler))
        .route("/save", post(save_handler))
        .route("/map.png", get(preview_handler))
        .route("/download", get(download_handler))
        .route("/api/saved", get(saved_handler))
        .route("/session/end", post(end_session_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, regions: Arc<RegionSet>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = Arc::new(AppState::new(config, regions));

    let app = router(state);

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
pub struct IndexParams {
    saved: Option<String>,
}

async fn index_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<IndexParams>,
) -> Response {
    let (id, page) = state.with_session(&headers, |session| {
        form::render_page(
            &state.regions,
            session.current(),
            session.saved(),
            params.saved.is_some(),
        )
    });
    (set_cookie(id), Html(page)).into_response()
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let (id, result) = state.try_with_session(&headers, |session| {
        let request = form::parse_form(&state.regions, &fields, session.current())?;
        session.update(request);
        anyhow::Ok(())
    });
    result.map_err(AppError::bad_request)?;
    Ok((set_cookie(id), Redirect::to("/")).into_response())
}

async fn save_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let (id, result) = state.try_with_session(&headers, |session| {
        let request = form::parse_form(&state.regions, &fields, session.current())?;
        session.update(request);
        anyhow::Ok(session.save().position())
    });
    let position = result.map_err(AppError::bad_request)?;
    info!(session = %id, position, "Map saved");
    Ok((set_cookie(id), Redirect::to("/?saved=1")).into_response())
}

/// Renders the session's current request off the async runtime.
async fn current_png(state: &Arc<AppState>, headers: &HeaderMap) -> Result<(Uuid, RenderRequest, Vec<u8>), AppError> {
    let (id, request) = state.with_session(headers, |session| session.current().clone());

    let regions = Arc::clone(&state.regions);
    let (width, height) = (state.config.render.width, state.config.render.height);
    let for_render = request.clone();
    let png = tokio::task::spawn_blocking(move || {
        export::render_png(&regions, &for_render, width, height)
    })
    .await??;

    Ok((id, request, png))
}

async fn preview_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, AppError> {
    let (id, _, png) = current_png(&state, &headers).await?;
    Ok((
        set_cookie(id),
        [
            (header::CONTENT_TYPE, PNG_MIME.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        png,
    )
        .into_response())
}

async fn download_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, AppError> {
    let (id, request, png) = current_png(&state, &headers).await?;
    let filename = export::export_filename(&request.title);
    info!(session = %id, %filename, bytes = png.len(), "Map downloaded");
    Ok((
        set_cookie(id),
        [
            (header::CONTENT_TYPE, PNG_MIME.to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        png,
    )
        .into_response())
}

async fn saved_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, saved) = state.with_session(&headers, |session| session.saved().to_vec());
    (set_cookie(id), Json::<Vec<SavedEntry>>(saved)).into_response()
}

async fn end_session_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(id) = session_cookie(&headers) {
        state.sessions.end(id);
    }
    let clear = format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE);
    (AppendHeaders([(header::SET_COOKIE, clear)]), Redirect::to("/")).into_response()
}
