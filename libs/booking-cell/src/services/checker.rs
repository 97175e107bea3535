use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Booking, BookingError, ReservationRequest, ReservationResult};

/// The single authority on whether a slot is still free.
///
/// `reserve` must be atomic per therapist among bookings that are not
/// cancelled: a request whose `[start_date_time, end_date_time)` overlaps a
/// live booking is a `Conflict`. Same-slot races are the common case; when
/// callers race, exactly one sees `Success` and every other sees `Conflict`.
#[async_trait]
pub trait ConflictChecker: Send + Sync {
    async fn reserve(&self, request: &ReservationRequest) -> Result<ReservationResult, BookingError>;

    /// Cancels the booking. `false` when no active booking had that id.
    async fn release(&self, booking_id: Uuid) -> Result<bool, BookingError>;

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BookingError>;
}
