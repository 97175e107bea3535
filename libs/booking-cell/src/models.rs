use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use schedule_cell::{ScheduleError, Slot};

// ==============================================================================
// RESERVATION MODELS
// ==============================================================================

/// One attempt to claim a materialized slot for a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub therapist_id: Uuid,
    pub client_id: Uuid,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
}

impl ReservationRequest {
    pub fn for_slot(slot: &Slot, client_id: Uuid) -> Self {
        Self {
            therapist_id: slot.therapist_id,
            client_id,
            start_date_time: slot.start_date_time,
            end_date_time: slot.end_date_time,
        }
    }
}

/// Outcome of a single `reserve` call. `Conflict` is final for that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReservationResult {
    Success { booking_id: Uuid },
    Conflict,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub client_id: Uuid,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date_time < end && start < self.end_date_time
    }
}

/// A reserved slot together with the booking that holds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookedSlot {
    pub booking_id: Uuid,
    pub slot: Slot,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookSlotRequest {
    pub therapist_id: Uuid,
    pub start_date_time: DateTime<Utc>,
    /// Only admins may book on behalf of someone else; defaults to the caller.
    pub client_id: Option<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Slot is no longer available")]
    SlotNotAvailable,

    #[error("Slot not found in the therapist's schedule")]
    SlotNotFound,

    #[error("Reservation timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not authorized to manage this booking")]
    Unauthorized,
}
