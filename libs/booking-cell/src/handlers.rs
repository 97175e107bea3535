use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use schedule_cell::SystemClock;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use therapist_cell::{TherapistError, TherapistService};

use crate::models::{BookSlotRequest, BookingError};
use crate::services::BookingService;

fn to_app_error(error: BookingError) -> AppError {
    match error {
        BookingError::SlotNotAvailable => AppError::Conflict("Slot is no longer available".to_string()),
        BookingError::SlotNotFound => AppError::NotFound("Slot not found".to_string()),
        BookingError::Timeout { timeout_seconds } => {
            AppError::Timeout(format!("Reservation did not complete within {} seconds", timeout_seconds))
        }
        BookingError::Schedule(e) => AppError::BadRequest(e.to_string()),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        BookingError::Unauthorized => AppError::Forbidden("Not authorized to manage this booking".to_string()),
    }
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {}", what)))
}

/// Books the requested slot for the caller. Admins may name another client.
#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let caller_id = parse_uuid(&user.id, "user id")?;

    let client_id = match request.client_id {
        Some(client_id) if client_id != caller_id && !user.is_admin() => {
            return Err(AppError::Forbidden("Cannot book on behalf of another client".to_string()));
        }
        Some(client_id) => client_id,
        None => caller_id,
    };

    let therapist_service = TherapistService::new(&state, SystemClock::shared());
    let therapist = therapist_service
        .get_therapist(request.therapist_id, Some(token))
        .await
        .map_err(|e| match e {
            TherapistError::NotFound => AppError::NotFound("Therapist not found".to_string()),
            other => AppError::Database(other.to_string()),
        })?;

    if therapist.is_blocked {
        return Err(AppError::NotFound("Therapist not found".to_string()));
    }

    let schedule = therapist_service
        .compile_schedule(&therapist)
        .map_err(|e| AppError::Internal(format!("Stored schedule is invalid: {}", e)))?;

    debug!("Booking request from {} for therapist {}", user.id, therapist.id);

    let booking_service = BookingService::from_config(&state, Some(token.to_string()));
    let booked = booking_service
        .book_slot(&schedule, client_id, request.start_date_time)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "status": true,
        "message": "Slot booked",
        "data": booked
    })))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let booking_id = parse_uuid(&booking_id, "booking id")?;

    let booking_service = BookingService::from_config(&state, Some(auth.token().to_string()));
    let cancelled = booking_service
        .cancel_booking(booking_id, &user)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "status": true,
        "message": "Booking cancelled",
        "data": cancelled
    })))
}
