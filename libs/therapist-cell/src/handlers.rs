use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use schedule_cell::{ScheduleError, SystemClock};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_self_or_admin;

use crate::models::{
    SlotQuery, SubmitTherapistRequest, TherapistError, TherapistListQuery, TherapistProfile,
};
use crate::services::TherapistService;

fn to_app_error(error: TherapistError) -> AppError {
    match error {
        TherapistError::NotFound => AppError::NotFound("Therapist not found".to_string()),
        TherapistError::Schedule(ScheduleError::InvalidTimezone(tz)) => {
            AppError::ValidationError(format!("Unknown timezone: {}", tz))
        }
        TherapistError::Schedule(e) => AppError::ValidationError(e.to_string()),
        TherapistError::ValidationError(msg) => AppError::ValidationError(msg),
        TherapistError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn parse_therapist_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid therapist id".to_string()))
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_therapists(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<TherapistListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = TherapistService::new(&state, SystemClock::shared());

    let page = service.list_therapists(&query).await.map_err(to_app_error)?;

    Ok(Json(json!({
        "status": true,
        "data": page
    })))
}

#[axum::debug_handler]
pub async fn get_therapist(
    State(state): State<Arc<AppConfig>>,
    Path(therapist_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = parse_therapist_id(&therapist_id)?;
    let service = TherapistService::new(&state, SystemClock::shared());

    let therapist = service.get_therapist(therapist_id, None).await.map_err(to_app_error)?;
    if therapist.is_blocked {
        return Err(AppError::NotFound("Therapist not found".to_string()));
    }

    Ok(Json(json!({
        "status": true,
        "data": TherapistProfile::from(therapist)
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(therapist_id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = parse_therapist_id(&therapist_id)?;
    if query.weeks == Some(0) {
        return Err(AppError::BadRequest("weeks must be at least 1".to_string()));
    }

    let service = TherapistService::new(&state, SystemClock::shared());
    let available = service
        .available_slots(therapist_id, query.weeks, None)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "status": true,
        "data": available
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_details(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(therapist_id): Path<String>,
    Json(request): Json<SubmitTherapistRequest>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = parse_therapist_id(&therapist_id)?;
    require_self_or_admin(&user, &therapist_id.to_string())?;

    let service = TherapistService::new(&state, SystemClock::shared());
    let therapist = service
        .submit_details(therapist_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "status": true,
        "message": "Therapist details saved",
        "data": therapist
    })))
}
