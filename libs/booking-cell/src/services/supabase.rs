use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{prefer_representation, SupabaseClient, SupabaseResponse};

use crate::models::{Booking, BookingError, BookingStatus, ReservationRequest, ReservationResult};
use crate::services::checker::ConflictChecker;

const UNIQUE_VIOLATION: &str = "23505";
const EXCLUSION_VIOLATION: &str = "23P01";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Reserves through a single insert into `bookings`, so the database decides
/// who wins a race. For rows whose status is not `cancelled` the table carries
///
/// - a unique index on `(therapist_id, start_date_time)` (`23505`), and
/// - an exclusion constraint on `therapist_id WITH =` and
///   `tstzrange(start_date_time, end_date_time) WITH &&` (`23P01`),
///
/// which together reject any overlap, matching the in-memory checker.
pub struct SupabaseConflictChecker {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseConflictChecker {
    pub fn new(config: &AppConfig, auth_token: Option<String>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token,
        }
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

/// Classify a PostgREST insert reply.
pub fn classify_insert(response: &SupabaseResponse) -> Result<ReservationResult, BookingError> {
    if response.status.is_success() {
        let row = match &response.body {
            Value::Array(rows) => rows.first(),
            other => Some(other),
        };
        let booking_id = row
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| BookingError::DatabaseError("Insert did not return a booking id".to_string()))?;
        return Ok(ReservationResult::Success { booking_id });
    }

    match response.pg_error_code() {
        Some(UNIQUE_VIOLATION) | Some(EXCLUSION_VIOLATION) => Ok(ReservationResult::Conflict),
        Some(FOREIGN_KEY_VIOLATION) => Ok(ReservationResult::NotFound),
        _ if response.status == StatusCode::CONFLICT => Ok(ReservationResult::Conflict),
        _ => {
            error!("Booking insert failed with {}: {}", response.status, response.body);
            Err(BookingError::DatabaseError(format!("Booking insert failed with status {}", response.status)))
        }
    }
}

#[async_trait]
impl ConflictChecker for SupabaseConflictChecker {
    async fn reserve(&self, request: &ReservationRequest) -> Result<ReservationResult, BookingError> {
        debug!(
            "Reserving slot {} for therapist {}",
            request.start_date_time.to_rfc3339(),
            request.therapist_id
        );

        let booking_data = json!({
            "therapist_id": request.therapist_id,
            "client_id": request.client_id,
            "start_date_time": request.start_date_time.to_rfc3339(),
            "end_date_time": request.end_date_time.to_rfc3339(),
            "status": BookingStatus::Confirmed.to_string()
        });

        let response = self.supabase.request_with_status(
            Method::POST,
            "/rest/v1/bookings",
            self.token(),
            Some(booking_data),
            Some(prefer_representation()),
        ).await.map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let result = classify_insert(&response)?;
        if result == ReservationResult::Conflict {
            warn!(
                "Slot {} for therapist {} already reserved",
                request.start_date_time.to_rfc3339(),
                request.therapist_id
            );
        }
        Ok(result)
    }

    async fn release(&self, booking_id: Uuid) -> Result<bool, BookingError> {
        debug!("Releasing booking {}", booking_id);

        let path = format!("/rest/v1/bookings?id=eq.{}&status=eq.confirmed", booking_id);
        let updated: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            self.token(),
            Some(json!({ "status": BookingStatus::Cancelled.to_string() })),
            Some(prefer_representation()),
        ).await.map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        Ok(!updated.is_empty())
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BookingError> {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            self.token(),
            None,
        ).await.map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse booking: {}", e)))
    }
}
