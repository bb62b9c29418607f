use axum::Json;
use axum::extract::{Path, Query};
use axum::response::{IntoResponse, Response};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;

use crate::db;
use crate::error::AppError;
use crate::models::*;
use crate::services::{
    AutomationService, ConversionReport, ConversionService, PublishReport, QuotaTracker, SessionService,
    SlotAdvice, SlotAdvisor, SuggestSlotQuery,
};
use crate::state::AppState;
use crate::timeslot::TimeWindow;

#[derive(Deserialize)]
struct RunsQueryParams {
    #[serde(default = "default_runs_limit")]
    limit: i64,
}

fn default_runs_limit() -> i64 {
    20
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/availabilities", post(submit_availability))
        .route("/availabilities/convert", post(convert_pending))
        .route("/availabilities/{id}/convert", post(convert_one))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/{id}", patch(update_session).delete(delete_session))
        .route("/sessions/{id}/validate", post(validate_session))
        .route("/automation/publish", post(publish_validated))
        .route("/automation/runs", get(list_runs))
        .route("/slots/suggest", get(suggest_slot))
        .route("/quotas/{subject_id}/{teacher_id}", get(quota_status))
        .route("/quotas/{subject_id}/{teacher_id}/recompute", post(recompute_quota))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn submit_availability(
    State(state): State<AppState>,
    Json(req): Json<NewAvailabilityRequest>,
) -> Result<(StatusCode, Json<Availability>), AppError> {
    let window = TimeWindow::parse_strict(&req.start_time, &req.end_time)?;
    let mut conn = state.db.acquire().await?;
    if db::subjects::find_subject(&mut conn, req.subject_id).await?.is_none() {
        return Err(AppError::BadRequest(format!("unknown subject {}", req.subject_id)));
    }

    let req = NewAvailabilityRequest {
        start_time: window.start_str(),
        end_time: window.end_str(),
        ..req
    };
    let availability = db::availabilities::insert_availability(&mut conn, &req, state.clock.now()).await?;
    Ok((StatusCode::CREATED, Json(availability)))
}

async fn convert_pending(State(state): State<AppState>) -> Result<Json<ConversionReport>, AppError> {
    let report = ConversionService::new(&state).convert_pending().await?;
    Ok(Json(report))
}

async fn convert_one(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, AppError> {
    match ConversionService::new(&state).convert_one(id).await? {
        Some(session) => Ok((StatusCode::CREATED, Json(session)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<Session>>, AppError> {
    let sessions = SessionService::new(&state).list().await?;
    Ok(Json(sessions))
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<NewSessionRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let session = SessionService::new(&state).create_draft(req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<Session>, AppError> {
    let session = SessionService::new(&state).update(id, req).await?;
    Ok(Json(session))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, AppError> {
    SessionService::new(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn validate_session(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Session>, AppError> {
    let session = SessionService::new(&state).validate(id).await?;
    Ok(Json(session))
}

async fn publish_validated(State(state): State<AppState>) -> Result<Json<PublishReport>, AppError> {
    let report = AutomationService::new(&state).publish_validated().await?;
    Ok(Json(report))
}

async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<RunsQueryParams>,
) -> Result<Json<Vec<AutomationRun>>, AppError> {
    let mut conn = state.db.acquire().await?;
    let runs = db::runs::fetch_runs(&mut conn, params.limit.clamp(1, 200)).await?;
    Ok(Json(runs))
}

async fn suggest_slot(
    State(state): State<AppState>,
    Query(query): Query<SuggestSlotQuery>,
) -> Result<Json<SlotAdvice>, AppError> {
    let advice = SlotAdvisor::new(&state).suggest(&query).await?;
    Ok(Json(advice))
}

async fn quota_status(
    State(state): State<AppState>,
    Path((subject_id, teacher_id)): Path<(i64, i64)>,
) -> Result<Json<QuotaReport>, AppError> {
    let mut conn = state.db.acquire().await?;
    let subject = db::subjects::find_subject(&mut conn, subject_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let report = QuotaTracker::new(state.clock.clone())
        .report(&mut conn, &subject, teacher_id)
        .await?;
    Ok(Json(report))
}

async fn recompute_quota(
    State(state): State<AppState>,
    Path((subject_id, teacher_id)): Path<(i64, i64)>,
) -> Result<Json<Quota>, AppError> {
    let mut conn = state.db.acquire().await?;
    let subject = db::subjects::find_subject(&mut conn, subject_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let quota = QuotaTracker::new(state.clock.clone())
        .recompute(&mut conn, &subject, teacher_id)
        .await?;
    Ok(Json(quota))
}
