//! HTTP routes
//!
//! - `GET /health`
//! - `POST /api/documents/generate`: authenticates an admin, prepares the run,
//!   then streams its progress as server-sent events. Failures before the
//!   stream starts are answered with `{"error": ...}` and a 4xx/5xx status.

use crate::auth::{bearer_token, Authenticator};
use futures::StreamExt;
use rollcall_core::GenerationRequest;
use rollcall_pipeline::{channel, RunCoordinator};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::sse::Event;
use warp::{Filter, Rejection, Reply};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<RunCoordinator>,
    auth: Arc<dyn Authenticator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create state
    #[must_use]
    pub fn new(coordinator: Arc<RunCoordinator>, auth: Arc<dyn Authenticator>) -> Self {
        Self { coordinator, auth }
    }
}

/// Every route of the service
pub fn routes(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    health().or(generate(state)).unify()
}

fn health() -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&json!({"status": "ok"})).into_response())
}

fn generate(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("api" / "documents" / "generate")
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::body::bytes())
        .and(warp::any().map(move || state.clone()))
        .and_then(handle_generate)
}

fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    warp::reply::with_status(
        warp::reply::json(&json!({"error": message.into()})),
        status,
    )
    .into_response()
}

async fn handle_generate(
    authorization: Option<String>,
    body: Bytes,
    state: AppState,
) -> Result<Response, Infallible> {
    let Some(token) = authorization.as_deref().and_then(bearer_token) else {
        return Ok(error_reply(StatusCode::UNAUTHORIZED, "missing bearer token"));
    };
    let Some(principal) = state.auth.authenticate(token).await else {
        return Ok(error_reply(StatusCode::UNAUTHORIZED, "invalid token"));
    };
    if !principal.is_admin {
        warn!(subject = %principal.subject, "non-admin attempted document generation");
        return Ok(error_reply(StatusCode::FORBIDDEN, "administrator access required"));
    }

    let request: GenerationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return Ok(error_reply(
                StatusCode::BAD_REQUEST,
                format!("invalid request body: {e}"),
            ))
        }
    };
    if request.event_id.as_str().trim().is_empty() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "eventId is required"));
    }

    let run = match state.coordinator.prepare(&request).await {
        Ok(run) => run,
        Err(e) => {
            if e.is_not_found() {
                info!(event_id = %request.event_id, error = %e, "nothing to generate");
            } else {
                error!(event_id = %request.event_id, error = %e, "run preparation failed");
            }
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Ok(error_reply(status, e.to_string()));
        }
    };

    info!(
        subject = %principal.subject,
        run_id = %run.run_id(),
        event_id = %request.event_id,
        category = %request.document_category,
        total = run.total(),
        "starting generation run"
    );

    let (progress, events) = channel();
    tokio::spawn(async move {
        // Outcome is already logged and sent on the stream
        let _ = run.execute(progress).await;
    });

    let frames = events.map(|event| Event::default().json_data(&event));
    Ok(warp::sse::reply(warp::sse::keep_alive().stream(frames)).into_response())
}
