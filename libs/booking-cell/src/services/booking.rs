use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::{Clock, CompiledSchedule, Horizon, Slot, SlotMaterializer, SlotStatus, SystemClock};
use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{BookedSlot, Booking, BookingError, BookingStatus, ReservationRequest, ReservationResult};
use crate::services::checker::ConflictChecker;
use crate::services::supabase::SupabaseConflictChecker;

pub struct BookingService {
    checker: Arc<dyn ConflictChecker>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl BookingService {
    pub fn new(checker: Arc<dyn ConflictChecker>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self { checker, clock, timeout }
    }

    /// Supabase-backed service acting with the caller's token.
    pub fn from_config(config: &AppConfig, auth_token: Option<String>) -> Self {
        Self::new(
            Arc::new(SupabaseConflictChecker::new(config, auth_token)),
            SystemClock::shared(),
            Duration::from_secs(config.reservation_timeout_secs),
        )
    }

    /// Book the slot of `schedule` that starts at `start_date_time`.
    ///
    /// The slot must be one the schedule actually produces from now on. The
    /// checker is asked exactly once: a `Conflict` is final and a timeout is
    /// reported as such, neither is retried.
    pub async fn book_slot(
        &self,
        schedule: &CompiledSchedule,
        client_id: Uuid,
        start_date_time: DateTime<Utc>,
    ) -> Result<BookedSlot, BookingError> {
        let now = self.clock.now();
        debug!(
            "Booking slot {} with therapist {} for client {}",
            start_date_time.to_rfc3339(),
            schedule.therapist_id(),
            client_id
        );

        if start_date_time <= now {
            return Err(BookingError::ValidationError("Cannot book a slot in the past".to_string()));
        }

        let slot = self.find_slot(schedule, now, start_date_time)?;
        let request = ReservationRequest::for_slot(&slot, client_id);

        match self.with_timeout(self.checker.reserve(&request)).await?? {
            ReservationResult::Success { booking_id } => {
                let slot = slot.transition(SlotStatus::Booked)?;
                info!(
                    "Booking {} confirmed: therapist {} at {}",
                    booking_id,
                    slot.therapist_id,
                    slot.start_date_time.to_rfc3339()
                );
                Ok(BookedSlot { booking_id, slot })
            }
            ReservationResult::Conflict => Err(BookingError::SlotNotAvailable),
            ReservationResult::NotFound => Err(BookingError::SlotNotFound),
        }
    }

    /// Cancel a booking on behalf of its client, its therapist, or an admin.
    pub async fn cancel_booking(&self, booking_id: Uuid, requested_by: &User) -> Result<BookedSlot, BookingError> {
        debug!("Cancelling booking {} for user {}", booking_id, requested_by.id);

        let booking = self
            .with_timeout(self.checker.find_booking(booking_id))
            .await??
            .ok_or(BookingError::SlotNotFound)?;

        if !may_manage(&booking, requested_by) {
            return Err(BookingError::Unauthorized);
        }

        let slot = booked_slot_of(&booking).transition(SlotStatus::Cancelled)?;

        if !self.with_timeout(self.checker.release(booking_id)).await?? {
            return Err(BookingError::SlotNotFound);
        }

        info!("Booking {} cancelled by {}", booking_id, requested_by.id);
        Ok(BookedSlot { booking_id, slot })
    }

    /// Re-materialize from now to the end of the schedule and look for an
    /// exact start match. Overlap resolution depends on earlier slots, so the
    /// horizon always starts at `now`.
    fn find_slot(
        &self,
        schedule: &CompiledSchedule,
        now: DateTime<Utc>,
        start_date_time: DateTime<Utc>,
    ) -> Result<Slot, BookingError> {
        let coverage_end = match schedule.coverage_end() {
            Some(end) if start_date_time < end => end,
            _ => return Err(BookingError::SlotNotFound),
        };

        SlotMaterializer::materialize(schedule, Horizon::new(now, coverage_end)?)
            .take_while(|slot| slot.start_date_time <= start_date_time)
            .find(|slot| slot.start_date_time == start_date_time)
            .ok_or(BookingError::SlotNotFound)
    }

    async fn with_timeout<T>(&self, operation: impl std::future::Future<Output = T>) -> Result<T, BookingError> {
        timeout(self.timeout, operation).await.map_err(|_| {
            warn!("Conflict checker did not answer within {:?}", self.timeout);
            BookingError::Timeout { timeout_seconds: self.timeout.as_secs() }
        })
    }
}

fn may_manage(booking: &Booking, user: &User) -> bool {
    user.is_admin()
        || user.id == booking.client_id.to_string()
        || user.id == booking.therapist_id.to_string()
}

fn booked_slot_of(booking: &Booking) -> Slot {
    let status = match booking.status {
        BookingStatus::Confirmed => SlotStatus::Booked,
        BookingStatus::Cancelled => SlotStatus::Cancelled,
    };
    Slot {
        therapist_id: booking.therapist_id,
        start_date_time: booking.start_date_time,
        end_date_time: booking.end_date_time,
        status,
    }
}
