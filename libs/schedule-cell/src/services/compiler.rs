use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tracing::debug;
use uuid::Uuid;

use crate::models::{ScheduleError, TimingRule};
use crate::services::clock::Clock;

/// Every weekly pattern repeats this many times (one year).
pub const WEEKLY_OCCURRENCE_COUNT: u32 = 52;

/// Upper bound when searching past a DST gap for the next valid local time.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// What to do when a rule's weekday is today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameDayPolicy {
    /// Today counts if the window starts strictly after the current local time,
    /// otherwise the first occurrence is next week.
    #[default]
    IncludeLaterToday,
    /// Today never counts; the first occurrence is always seven days out.
    AlwaysNextWeek,
}

/// One weekday of one rule, repeating weekly from `anchor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyPattern {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub anchor: NaiveDate,
    pub count: u32,
}

impl WeeklyPattern {
    /// Wall-clock length of the window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn local_start(&self, index: u32) -> Option<NaiveDateTime> {
        if index >= self.count {
            return None;
        }
        let date = self.anchor.checked_add_days(Days::new(7 * u64::from(index)))?;
        Some(date.and_time(self.start))
    }

    /// UTC instant of the `index`-th occurrence. An ambiguous local time (DST
    /// fall-back) resolves to the earlier instant; a local time inside a DST
    /// gap does not exist and yields `None`.
    pub fn start_at(&self, index: u32, timezone: &Tz) -> Option<DateTime<Utc>> {
        let local = self.local_start(index)?;
        timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|instant| instant.with_timezone(&Utc))
    }

    /// UTC instant the `index`-th occurrence ends, read from the local end
    /// time so it matches the rule on DST transition days. An ambiguous end
    /// resolves to the earlier instant; an end inside a gap moves to the first
    /// instant after the gap.
    pub fn end_at(&self, index: u32, timezone: &Tz) -> Option<DateTime<Utc>> {
        let local_end = self.local_start(index)?.date().and_time(self.end);
        (0..=MAX_GAP_MINUTES)
            .find_map(|minute| {
                timezone
                    .from_local_datetime(&(local_end + Duration::minutes(minute)))
                    .earliest()
            })
            .map(|instant| instant.with_timezone(&Utc))
    }
}

/// Immutable recurrence derived from all of one therapist's timing rules.
#[derive(Debug, Clone)]
pub struct CompiledSchedule {
    therapist_id: Uuid,
    timezone: Tz,
    patterns: Vec<WeeklyPattern>,
    compiled_at: DateTime<Utc>,
}

impl CompiledSchedule {
    pub fn therapist_id(&self) -> Uuid {
        self.therapist_id
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn patterns(&self) -> &[WeeklyPattern] {
        &self.patterns
    }

    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Ascending, de-duplicated occurrence starts in `[from, to)`.
    pub fn occurrences_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut starts: Vec<DateTime<Utc>> = self
            .patterns
            .iter()
            .flat_map(|pattern| {
                (0..pattern.count).filter_map(move |index| pattern.start_at(index, &self.timezone))
            })
            .filter(|start| from <= *start && *start < to)
            .collect();

        starts.sort();
        starts.dedup();
        starts
    }

    /// End of the latest occurrence of any pattern, or `None` for an empty schedule.
    pub fn coverage_end(&self) -> Option<DateTime<Utc>> {
        self.patterns
            .iter()
            .filter_map(|pattern| {
                (0..pattern.count)
                    .rev()
                    .find(|index| pattern.start_at(*index, &self.timezone).is_some())
                    .and_then(|index| pattern.end_at(index, &self.timezone))
            })
            .max()
    }
}

pub struct RecurringRuleCompiler {
    clock: Arc<dyn Clock>,
    policy: SameDayPolicy,
}

impl RecurringRuleCompiler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            policy: SameDayPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SameDayPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SameDayPolicy {
        self.policy
    }

    /// Compile `rules` for a therapist whose wall clock is `timezone`.
    ///
    /// Every rule is validated before anything is compiled, so one bad rule
    /// rejects the whole set. Anchors are computed against the therapist's
    /// local date, not the server's.
    pub fn compile(
        &self,
        therapist_id: Uuid,
        rules: &[TimingRule],
        timezone: Tz,
    ) -> Result<CompiledSchedule, ScheduleError> {
        let validated = rules
            .iter()
            .map(TimingRule::validate)
            .collect::<Result<Vec<_>, _>>()?;

        let now = self.clock.now();
        let local_now = now.with_timezone(&timezone);
        let today = local_now.date_naive();

        let mut patterns = Vec::new();
        for rule in &validated {
            for &weekday in &rule.weekdays {
                let days_until = self.days_until(today.weekday(), weekday, rule.start, local_now.time());
                let anchor = today + Duration::days(days_until);

                patterns.push(WeeklyPattern {
                    weekday,
                    start: rule.start,
                    end: rule.end,
                    anchor,
                    count: WEEKLY_OCCURRENCE_COUNT,
                });
            }
        }

        debug!(
            "Compiled {} rules into {} weekly patterns for therapist {} ({})",
            rules.len(),
            patterns.len(),
            therapist_id,
            timezone
        );

        Ok(CompiledSchedule {
            therapist_id,
            timezone,
            patterns,
            compiled_at: now,
        })
    }

    /// Same as [`compile`](Self::compile) with an IANA timezone name.
    pub fn compile_in(
        &self,
        therapist_id: Uuid,
        rules: &[TimingRule],
        timezone: &str,
    ) -> Result<CompiledSchedule, ScheduleError> {
        self.compile(therapist_id, rules, parse_timezone(timezone)?)
    }

    /// `(target - current + 7) mod 7`, with the zero case decided by the policy.
    pub fn days_until(&self, current: Weekday, target: Weekday, start: NaiveTime, now_time: NaiveTime) -> i64 {
        let days = (i64::from(target.num_days_from_monday()) - i64::from(current.num_days_from_monday()) + 7) % 7;
        if days != 0 {
            return days;
        }

        match self.policy {
            SameDayPolicy::IncludeLaterToday if start > now_time => 0,
            _ => 7,
        }
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}
