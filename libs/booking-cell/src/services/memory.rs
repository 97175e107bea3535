use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Booking, BookingError, BookingStatus, ReservationRequest, ReservationResult};
use crate::services::checker::ConflictChecker;

#[derive(Default)]
struct Ledger {
    therapists: HashSet<Uuid>,
    bookings: HashMap<Uuid, Booking>,
}

/// Process-local checker. The whole check-and-insert runs under one lock,
/// which is what makes `reserve` atomic. Used for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryConflictChecker {
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryConflictChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_therapists(therapist_ids: impl IntoIterator<Item = Uuid>) -> Self {
        let ledger = Ledger {
            therapists: therapist_ids.into_iter().collect(),
            bookings: HashMap::new(),
        };
        Self { ledger: Arc::new(Mutex::new(ledger)) }
    }

    pub async fn register_therapist(&self, therapist_id: Uuid) {
        self.ledger.lock().await.therapists.insert(therapist_id);
    }

    pub async fn confirmed_bookings(&self, therapist_id: Uuid) -> Vec<Booking> {
        let ledger = self.ledger.lock().await;
        let mut bookings: Vec<Booking> = ledger
            .bookings
            .values()
            .filter(|b| b.therapist_id == therapist_id && b.status == BookingStatus::Confirmed)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_date_time);
        bookings
    }
}

#[async_trait]
impl ConflictChecker for InMemoryConflictChecker {
    async fn reserve(&self, request: &ReservationRequest) -> Result<ReservationResult, BookingError> {
        let mut ledger = self.ledger.lock().await;

        if !ledger.therapists.contains(&request.therapist_id) {
            return Ok(ReservationResult::NotFound);
        }

        let taken = ledger.bookings.values().any(|b| {
            b.therapist_id == request.therapist_id
                && b.status == BookingStatus::Confirmed
                && b.overlaps(request.start_date_time, request.end_date_time)
        });

        if taken {
            warn!(
                "Slot {} for therapist {} already reserved",
                request.start_date_time.to_rfc3339(),
                request.therapist_id
            );
            return Ok(ReservationResult::Conflict);
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            therapist_id: request.therapist_id,
            client_id: request.client_id,
            start_date_time: request.start_date_time,
            end_date_time: request.end_date_time,
            status: BookingStatus::Confirmed,
            created_at: Some(Utc::now()),
        };
        let booking_id = booking.id;
        ledger.bookings.insert(booking_id, booking);

        debug!("Reserved booking {} for therapist {}", booking_id, request.therapist_id);
        Ok(ReservationResult::Success { booking_id })
    }

    async fn release(&self, booking_id: Uuid) -> Result<bool, BookingError> {
        let mut ledger = self.ledger.lock().await;
        match ledger.bookings.get_mut(&booking_id) {
            Some(booking) if booking.status == BookingStatus::Confirmed => {
                booking.status = BookingStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BookingError> {
        Ok(self.ledger.lock().await.bookings.get(&booking_id).cloned())
    }
}
