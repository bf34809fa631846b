//! Axum REST API handlers.
//!
//! Mutating handlers lock the ledger, apply the operation and persist the
//! events it produced before the lock is released. Callers identify
//! themselves with the `x-actor` header.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use qf_settlement::{
    ActorId, Ciphertext, Contribution, Page, Plaintext, Project, ProjectId, RequestId,
    RevealState, RevealedProject,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::callback::CallbackEnvelope;
use crate::db;
use crate::errors::{Result, ServiceError};
use crate::events::EventView;
use crate::state::AppState;

pub type ApiState = Arc<AppState>;

const ACTOR_HEADER: &str = "x-actor";

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Deserialize)]
pub struct SubmitProjectRequest {
    pub title: Ciphertext,
    pub description: Ciphertext,
    pub location: Ciphertext,
    pub budget: Ciphertext,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub project: Project,
    pub reveal: RevealState,
}

#[derive(Deserialize)]
pub struct ContributeRequest {
    pub amount: Ciphertext,
}

#[derive(Serialize)]
pub struct ContributeResponse {
    pub project_id: ProjectId,
    pub index: u32,
}

#[derive(Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: u32,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct RevealResponse {
    pub project_id: ProjectId,
    pub request_id: RequestId,
}

#[derive(Serialize)]
pub struct MatchingResponse {
    pub project_id: ProjectId,
    pub matching: Ciphertext,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub count: usize,
    pub events: Vec<EventView>,
}

#[derive(Deserialize)]
pub struct CallbackRequest {
    pub request_id: RequestId,
    pub payload: Vec<Plaintext>,
    /// Hex-encoded proof bytes.
    pub proof: String,
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

fn actor(headers: &HeaderMap) -> Result<ActorId> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ActorId::new)
        .ok_or(ServiceError::Unauthenticated)
}

fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected)
}

fn page_limit(requested: Option<u32>, max: u32) -> u32 {
    requested.unwrap_or(max).min(max)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /projects`
pub async fn submit_project(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<SubmitProjectRequest>,
) -> Result<impl IntoResponse> {
    let submitter = actor(&headers)?;
    let mut guard = state.ledger().await;
    let project = guard.ledger.submit_project(
        submitter,
        body.title,
        body.description,
        body.location,
        body.budget,
    )?;
    guard.persist(&state.pool).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            project,
            reveal: RevealState::Hidden,
        }),
    ))
}

/// `GET /projects/:id`
pub async fn get_project(
    State(state): State<ApiState>,
    Path(project_id): Path<u64>,
) -> Result<Json<ProjectResponse>> {
    let guard = state.ledger().await;
    let id = ProjectId(project_id);
    Ok(Json(ProjectResponse {
        project: guard.ledger.get_project(id)?,
        reveal: guard.ledger.reveal_state(id)?,
    }))
}

/// `POST /projects/:id/contributions`
pub async fn contribute(
    State(state): State<ApiState>,
    Path(project_id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<ContributeRequest>,
) -> Result<impl IntoResponse> {
    let contributor = actor(&headers)?;
    let id = ProjectId(project_id);
    let mut guard = state.ledger().await;
    let index = guard.ledger.contribute(contributor, id, body.amount)?;
    guard.persist(&state.pool).await?;
    Ok((
        StatusCode::CREATED,
        Json(ContributeResponse {
            project_id: id,
            index,
        }),
    ))
}

/// `GET /projects/:id/contributions?offset=&limit=`
pub async fn get_contributions(
    State(state): State<ApiState>,
    Path(project_id): Path<u64>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Contribution>>> {
    let limit = page_limit(params.limit, state.config.max_page_size);
    let page = state
        .ledger()
        .await
        .ledger
        .contributions(ProjectId(project_id), params.offset, limit)?;
    debug!(project_id, offset = params.offset, limit, returned = page.items.len(), "contributions page");
    Ok(Json(page))
}

/// `POST /projects/:id/close`
pub async fn close_project(
    State(state): State<ApiState>,
    Path(project_id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<ProjectResponse>> {
    let caller = actor(&headers)?;
    let id = ProjectId(project_id);
    let mut guard = state.ledger().await;
    guard.ledger.close_project(&caller, id)?;
    guard.persist(&state.pool).await?;
    Ok(Json(ProjectResponse {
        project: guard.ledger.get_project(id)?,
        reveal: guard.ledger.reveal_state(id)?,
    }))
}

/// `POST /projects/:id/reveal`
///
/// Answers `202 Accepted`; the reveal lands once the oracle calls back.
pub async fn request_reveal(
    State(state): State<ApiState>,
    Path(project_id): Path<u64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let caller = actor(&headers)?;
    let id = ProjectId(project_id);
    let request_id = state.ledger().await.ledger.request_reveal(&caller, id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RevealResponse {
            project_id: id,
            request_id,
        }),
    ))
}

/// `GET /projects/:id/revealed`
pub async fn get_revealed(
    State(state): State<ApiState>,
    Path(project_id): Path<u64>,
) -> Result<Json<RevealedProject>> {
    let revealed = state
        .ledger()
        .await
        .ledger
        .get_revealed(ProjectId(project_id))?;
    Ok(Json(revealed))
}

/// `GET /projects/:id/matching`
pub async fn get_matching(
    State(state): State<ApiState>,
    Path(project_id): Path<u64>,
) -> Result<Json<MatchingResponse>> {
    let id = ProjectId(project_id);
    let matching = state.ledger().await.ledger.get_matching(id)?;
    Ok(Json(MatchingResponse {
        project_id: id,
        matching,
    }))
}

/// `GET /projects/:id/events`
///
/// Returns all persisted events for the given project.
pub async fn get_project_events(
    State(state): State<ApiState>,
    Path(project_id): Path<u64>,
) -> Result<Json<EventsResponse>> {
    let events = db::get_events_for_project(&state.pool, project_id)
        .await?
        .into_iter()
        .map(EventView::try_from)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(EventsResponse {
        count: events.len(),
        events,
    }))
}

/// `GET /events?offset=&limit=`
pub async fn get_all_events(
    State(state): State<ApiState>,
    Query(params): Query<PageParams>,
) -> Result<Json<EventsResponse>> {
    let limit = page_limit(params.limit, state.config.max_page_size);
    let events = db::get_events_page(&state.pool, params.offset, limit)
        .await?
        .into_iter()
        .map(EventView::try_from)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(EventsResponse {
        count: events.len(),
        events,
    }))
}

/// `POST /oracle/callback`
///
/// Delivery point for an external gateway. The callback is queued for the
/// commit handler and this request waits for its outcome.
pub async fn oracle_callback(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CallbackRequest>,
) -> Result<Json<RevealedProject>> {
    if let Some(token) = &state.config.callback_token {
        if !bearer_matches(&headers, token) {
            return Err(ServiceError::Unauthenticated);
        }
    }
    let proof = hex::decode(body.proof.trim())
        .map_err(|_| ServiceError::BadRequest("proof must be hex".to_string()))?;

    let (reply, outcome) = oneshot::channel();
    state
        .callbacks
        .send(CallbackEnvelope {
            request_id: body.request_id,
            payload: body.payload,
            proof,
            reply: Some(reply),
        })
        .await
        .map_err(|_| ServiceError::Unavailable)?;

    let revealed = outcome.await.map_err(|_| ServiceError::Unavailable)??;
    Ok(Json(revealed))
}
