// libs/booking-cell/tests/reservation_test.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use uuid::Uuid;

use booking_cell::models::{Booking, BookingError, ReservationRequest, ReservationResult};
use booking_cell::services::{BookingService, ConflictChecker, InMemoryConflictChecker};
use schedule_cell::{CompiledSchedule, FixedClock, RecurringRuleCompiler, TimingRule};

// 2024-05-08 is a Wednesday.
fn wednesday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 8, 8, 0, 0).unwrap()
}

fn monday_nine() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 13, 9, 0, 0).unwrap()
}

fn schedule_for(therapist_id: Uuid) -> CompiledSchedule {
    RecurringRuleCompiler::new(FixedClock::shared(wednesday_morning()))
        .compile_in(therapist_id, &[TimingRule::new(vec![1, 3], "09:00", "10:00")], "UTC")
        .unwrap()
}

/// Never answers in time and counts how often it was asked.
struct StalledChecker {
    calls: AtomicUsize,
}

#[async_trait]
impl ConflictChecker for StalledChecker {
    async fn reserve(&self, _request: &ReservationRequest) -> Result<ReservationResult, BookingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ReservationResult::Success { booking_id: Uuid::new_v4() })
    }

    async fn release(&self, _booking_id: Uuid) -> Result<bool, BookingError> {
        Ok(false)
    }

    async fn find_booking(&self, _booking_id: Uuid) -> Result<Option<Booking>, BookingError> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_concurrent_reservations_have_exactly_one_winner() {
    let therapist_id = Uuid::new_v4();
    let checker = Arc::new(InMemoryConflictChecker::with_therapists([therapist_id]));

    let requests: Vec<ReservationRequest> = (0..16)
        .map(|_| ReservationRequest {
            therapist_id,
            client_id: Uuid::new_v4(),
            start_date_time: monday_nine(),
            end_date_time: monday_nine() + chrono::Duration::hours(1),
        })
        .collect();

    let handles = requests.into_iter().map(|request| {
        let checker = checker.clone();
        tokio::spawn(async move { checker.reserve(&request).await })
    });

    let results: Vec<ReservationResult> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let winners = results.iter().filter(|r| matches!(r, ReservationResult::Success { .. })).count();
    let conflicts = results.iter().filter(|r| **r == ReservationResult::Conflict).count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(checker.confirmed_bookings(therapist_id).await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_bookings_through_the_service() {
    let therapist_id = Uuid::new_v4();
    let schedule = schedule_for(therapist_id);
    let checker = Arc::new(InMemoryConflictChecker::with_therapists([therapist_id]));
    let service = BookingService::new(checker, FixedClock::shared(wednesday_morning()), Duration::from_secs(5));

    let attempts = (0..8).map(|_| service.book_slot(&schedule, Uuid::new_v4(), monday_nine()));
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, BookingError::SlotNotAvailable)));
}

#[tokio::test]
async fn test_unregistered_therapist_is_slot_not_found() {
    let schedule = schedule_for(Uuid::new_v4());
    let service = BookingService::new(
        Arc::new(InMemoryConflictChecker::new()),
        FixedClock::shared(wednesday_morning()),
        Duration::from_secs(5),
    );

    let result = service.book_slot(&schedule, Uuid::new_v4(), monday_nine()).await;
    assert_matches!(result, Err(BookingError::SlotNotFound));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_reported_and_not_retried() {
    let therapist_id = Uuid::new_v4();
    let schedule = schedule_for(therapist_id);
    let checker = Arc::new(StalledChecker { calls: AtomicUsize::new(0) });
    let service = BookingService::new(checker.clone(), FixedClock::shared(wednesday_morning()), Duration::from_secs(2));

    let result = service.book_slot(&schedule, Uuid::new_v4(), monday_nine()).await;

    assert_matches!(result, Err(BookingError::Timeout { timeout_seconds: 2 }));
    assert_eq!(checker.calls.load(Ordering::SeqCst), 1);
}
