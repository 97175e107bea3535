use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// TIMING RULES
// ==============================================================================

/// A therapist's declared weekly window, as submitted with the profile.
///
/// Days use ISO numbering: 1 = Monday ... 7 = Sunday. Times are local
/// wall-clock `HH:mm` in the therapist's timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingRule {
    #[serde(alias = "daysOfWeek", alias = "dayOfWeek")]
    pub days_of_week: Vec<u8>,
    #[serde(alias = "startTime")]
    pub start_time: String,
    #[serde(alias = "endTime")]
    pub end_time: String,
}

/// A `TimingRule` whose days and times have been parsed and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRule {
    pub weekdays: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ValidatedRule {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl TimingRule {
    pub fn new(days_of_week: Vec<u8>, start_time: &str, end_time: &str) -> Self {
        Self {
            days_of_week,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }

    pub fn validate(&self) -> Result<ValidatedRule, ScheduleError> {
        if self.days_of_week.is_empty() {
            return Err(ScheduleError::InvalidTimingRule(
                "days_of_week must not be empty".to_string(),
            ));
        }

        let mut weekdays = Vec::with_capacity(self.days_of_week.len());
        for &day in &self.days_of_week {
            let weekday = day_to_weekday(day)?;
            if !weekdays.contains(&weekday) {
                weekdays.push(weekday);
            }
        }

        let start = parse_hh_mm(&self.start_time)?;
        let end = parse_hh_mm(&self.end_time)?;

        if start >= end {
            return Err(ScheduleError::InvalidTimingRule(format!(
                "start_time {} must be before end_time {}",
                self.start_time, self.end_time
            )));
        }

        Ok(ValidatedRule { weekdays, start, end })
    }
}

/// Maps an ISO day number (1 = Monday ... 7 = Sunday) onto chrono's weekday.
///
/// This is the only place the offset between the two conventions is applied:
/// chrono counts from Monday = 0, so the rule day is shifted down by one.
pub fn day_to_weekday(day: u8) -> Result<Weekday, ScheduleError> {
    if !(1..=7).contains(&day) {
        return Err(ScheduleError::InvalidTimingRule(format!(
            "day of week {} is outside 1 (Monday) ..= 7 (Sunday)",
            day
        )));
    }
    Weekday::try_from(day - 1).map_err(|_| {
        ScheduleError::InvalidTimingRule(format!("day of week {} is not a weekday", day))
    })
}

/// Inverse of [`day_to_weekday`].
pub fn weekday_to_day(weekday: Weekday) -> u8 {
    weekday.number_from_monday() as u8
}

/// Strict `HH:mm` parser: two ASCII-digit fields, hour 0-23, minute 0-59.
pub fn parse_hh_mm(value: &str) -> Result<NaiveTime, ScheduleError> {
    let invalid = |reason: &str| {
        ScheduleError::InvalidTimingRule(format!("time '{}' {}", value, reason))
    };

    let (hours, minutes) = value
        .trim()
        .split_once(':')
        .ok_or_else(|| invalid("is not in HH:mm format"))?;

    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(hours) || !all_digits(minutes) || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid("is not in HH:mm format"));
    }

    let hour: u32 = hours.parse().map_err(|_| invalid("has a non-numeric hour"))?;
    let minute: u32 = minutes.parse().map_err(|_| invalid("has a non-numeric minute"))?;

    if hour > 23 {
        return Err(invalid("has an hour outside 00-23"));
    }
    if minute > 59 {
        return Err(invalid("has a minute outside 00-59"));
    }

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| invalid("is out of range"))
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Open,
    Booked,
    Cancelled,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Open => write!(f, "open"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One concrete bookable window. Instants are always UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub therapist_id: Uuid,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub status: SlotStatus,
}

impl Slot {
    pub fn open(therapist_id: Uuid, start_date_time: DateTime<Utc>, end_date_time: DateTime<Utc>) -> Self {
        Self {
            therapist_id,
            start_date_time,
            end_date_time,
            status: SlotStatus::Open,
        }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date_time < end && start < self.end_date_time
    }

    pub fn duration(&self) -> Duration {
        self.end_date_time - self.start_date_time
    }

    /// Open -> Booked, Open -> Cancelled, Booked -> Cancelled. Cancelled is terminal.
    pub fn transition(self, to: SlotStatus) -> Result<Slot, ScheduleError> {
        let allowed = matches!(
            (self.status, to),
            (SlotStatus::Open, SlotStatus::Booked)
                | (SlotStatus::Open, SlotStatus::Cancelled)
                | (SlotStatus::Booked, SlotStatus::Cancelled)
        );

        if !allowed {
            return Err(ScheduleError::InvalidStatusTransition { from: self.status, to });
        }

        Ok(Slot { status: to, ..self })
    }
}

// ==============================================================================
// HORIZON
// ==============================================================================

/// Half-open `[from, to)` window of slot start instants. Only built through
/// [`Horizon::new`] or [`Horizon::weeks_from`], so `from < to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Horizon {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl Horizon {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, ScheduleError> {
        if from >= to {
            return Err(ScheduleError::InvalidHorizon(format!(
                "horizon start {} must be before end {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }
        Ok(Self { from, to })
    }

    /// `[now, now + weeks)`, at least one week long.
    pub fn weeks_from(now: DateTime<Utc>, weeks: u32) -> Self {
        Self {
            from: now,
            to: now + Duration::weeks(i64::from(weeks.max(1))),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant < self.to
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid timing rule: {0}")]
    InvalidTimingRule(String),

    #[error("Invalid horizon: {0}")]
    InvalidHorizon(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Slot cannot move from {from} to {to}")]
    InvalidStatusTransition { from: SlotStatus, to: SlotStatus },
}
