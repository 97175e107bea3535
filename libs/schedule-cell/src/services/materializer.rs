use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Horizon, Slot};
use crate::services::compiler::CompiledSchedule;

/// Projects a compiled schedule onto a horizon. Pure: nothing is stored.
pub struct SlotMaterializer;

impl SlotMaterializer {
    /// Lazily yields open slots whose start lies in `horizon`, in ascending
    /// start order. A candidate that overlaps the previously yielded slot is
    /// dropped, so overlapping rules never produce overlapping slots; on equal
    /// starts the earlier rule wins.
    ///
    /// A horizon running past the schedule's 52-week coverage is not an error:
    /// the available subset is returned and [`Slots::truncated_at`] reports the cut.
    pub fn materialize(schedule: &CompiledSchedule, horizon: Horizon) -> Slots<'_> {
        let truncated_at = schedule
            .coverage_end()
            .filter(|coverage_end| horizon.end() > *coverage_end);

        if let Some(coverage_end) = truncated_at {
            warn!(
                "Horizon for therapist {} ends {} but the schedule only covers until {}; truncating",
                schedule.therapist_id(),
                horizon.end().to_rfc3339(),
                coverage_end.to_rfc3339()
            );
        }

        debug!(
            "Materializing slots for therapist {} from {} to {}",
            schedule.therapist_id(),
            horizon.start().to_rfc3339(),
            horizon.end().to_rfc3339()
        );

        Slots {
            schedule,
            horizon,
            cursors: vec![0; schedule.patterns().len()],
            last_end: None,
            truncated_at,
        }
    }
}

/// Finite slot sequence over one horizon. Cloning, or calling
/// [`restart`](Slots::restart), replays it from the beginning.
#[derive(Debug, Clone)]
pub struct Slots<'a> {
    schedule: &'a CompiledSchedule,
    horizon: Horizon,
    cursors: Vec<u32>,
    last_end: Option<DateTime<Utc>>,
    truncated_at: Option<DateTime<Utc>>,
}

impl<'a> Slots<'a> {
    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn truncated_at(&self) -> Option<DateTime<Utc>> {
        self.truncated_at
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated_at.is_some()
    }

    pub fn restart(&self) -> Slots<'a> {
        SlotMaterializer::materialize(self.schedule, self.horizon)
    }

    /// Next in-horizon start of pattern `index`, skipping occurrences before
    /// the horizon and local times that do not exist.
    fn peek(&mut self, index: usize) -> Option<DateTime<Utc>> {
        let schedule = self.schedule;
        let pattern = &schedule.patterns()[index];
        let timezone = schedule.timezone();

        while self.cursors[index] < pattern.count {
            match pattern.start_at(self.cursors[index], &timezone) {
                Some(start) if start < self.horizon.start() => self.cursors[index] += 1,
                Some(start) if start >= self.horizon.end() => return None,
                Some(start) => return Some(start),
                None => self.cursors[index] += 1,
            }
        }

        None
    }
}

impl Iterator for Slots<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        loop {
            let mut earliest: Option<(DateTime<Utc>, usize)> = None;
            for index in 0..self.cursors.len() {
                if let Some(start) = self.peek(index) {
                    if earliest.map_or(true, |(best, _)| start < best) {
                        earliest = Some((start, index));
                    }
                }
            }

            let (start, index) = earliest?;
            let occurrence = self.cursors[index];
            self.cursors[index] += 1;

            let pattern = &self.schedule.patterns()[index];
            let end = pattern
                .end_at(occurrence, &self.schedule.timezone())
                .filter(|end| *end > start)
                .unwrap_or_else(|| start + pattern.duration());
            if self.last_end.is_some_and(|last_end| start < last_end) {
                continue;
            }

            self.last_end = Some(end);
            return Some(Slot::open(self.schedule.therapist_id(), start, end));
        }
    }
}
