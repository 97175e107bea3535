// libs/schedule-cell/tests/slot_generation_test.rs

use assert_matches::assert_matches;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use uuid::Uuid;

use schedule_cell::models::weekday_to_day;
use schedule_cell::{
    FixedClock, Horizon, RecurringRuleCompiler, SameDayPolicy, ScheduleError, Slot,
    SlotMaterializer, SlotStatus, TimingRule,
};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

// 2024-05-08 is a Wednesday.
fn wednesday_at(h: u32) -> DateTime<Utc> {
    at(2024, 5, 8, h, 0)
}

fn materialize_all(
    now: DateTime<Utc>,
    policy: SameDayPolicy,
    rules: &[TimingRule],
    timezone: &str,
    horizon: Horizon,
) -> Vec<Slot> {
    let schedule = RecurringRuleCompiler::new(FixedClock::shared(now))
        .with_policy(policy)
        .compile_in(Uuid::new_v4(), rules, timezone)
        .unwrap();
    SlotMaterializer::materialize(&schedule, horizon).collect()
}

fn fourteen_days_from(now: DateTime<Utc>) -> Horizon {
    Horizon::new(now, now + Duration::days(14)).unwrap()
}

#[test]
fn test_monday_wednesday_before_start_yields_four_slots() {
    let now = wednesday_at(8);
    let rules = vec![TimingRule::new(vec![1, 3], "09:00", "10:00")];

    let slots = materialize_all(now, SameDayPolicy::IncludeLaterToday, &rules, "UTC", fourteen_days_from(now));
    let starts: Vec<_> = slots.iter().map(|s| s.start_date_time).collect();

    assert_eq!(starts, vec![
        at(2024, 5, 8, 9, 0),
        at(2024, 5, 13, 9, 0),
        at(2024, 5, 15, 9, 0),
        at(2024, 5, 20, 9, 0),
    ]);
}

#[test]
fn test_monday_wednesday_after_start_rolls_today_to_next_week() {
    let now = wednesday_at(12);
    let rules = vec![TimingRule::new(vec![1, 3], "09:00", "10:00")];

    let slots = materialize_all(now, SameDayPolicy::IncludeLaterToday, &rules, "UTC", fourteen_days_from(now));
    let starts: Vec<_> = slots.iter().map(|s| s.start_date_time).collect();

    assert_eq!(starts, vec![
        at(2024, 5, 13, 9, 0),
        at(2024, 5, 15, 9, 0),
        at(2024, 5, 20, 9, 0),
    ]);
}

#[test]
fn test_always_next_week_policy_skips_today() {
    let now = wednesday_at(8);
    let rules = vec![TimingRule::new(vec![1, 3], "09:00", "10:00")];

    let slots = materialize_all(now, SameDayPolicy::AlwaysNextWeek, &rules, "UTC", fourteen_days_from(now));

    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0].start_date_time, at(2024, 5, 13, 9, 0));
    assert_eq!(slots[1].start_date_time, at(2024, 5, 15, 9, 0));
}

#[test]
fn test_slots_match_rule_days_and_local_times() {
    let now = wednesday_at(8);
    let rules = vec![
        TimingRule::new(vec![1, 7], "18:30", "19:15"),
        TimingRule::new(vec![2, 4, 6], "07:00", "08:00"),
    ];

    for timezone in ["UTC", "Asia/Kolkata", "America/New_York", "Pacific/Auckland"] {
        let tz: Tz = timezone.parse().unwrap();
        let slots = materialize_all(now, SameDayPolicy::IncludeLaterToday, &rules, timezone, Horizon::weeks_from(now, 6));
        assert!(!slots.is_empty(), "{}", timezone);

        for slot in &slots {
            let local_start = slot.start_date_time.with_timezone(&tz);
            let local_end = slot.end_date_time.with_timezone(&tz);
            let day = weekday_to_day(local_start.weekday());

            let rule = rules
                .iter()
                .find(|r| r.days_of_week.contains(&day))
                .unwrap_or_else(|| panic!("{} produced a slot on day {}", timezone, day));

            assert_eq!(local_start.time().format("%H:%M").to_string(), rule.start_time);
            assert_eq!(local_end.time().format("%H:%M").to_string(), rule.end_time);
            assert_eq!(slot.status, SlotStatus::Open);
        }
    }
}

#[test]
fn test_no_two_slots_overlap() {
    let now = wednesday_at(8);
    let rules = vec![
        TimingRule::new(vec![1, 2, 3, 4, 5], "09:00", "12:00"),
        TimingRule::new(vec![1, 3, 5], "11:00", "13:00"),
        TimingRule::new(vec![3], "09:00", "09:30"),
        TimingRule::new(vec![5], "12:00", "14:00"),
    ];

    let slots = materialize_all(now, SameDayPolicy::IncludeLaterToday, &rules, "Europe/London", Horizon::weeks_from(now, 8));

    for pair in slots.windows(2) {
        assert!(pair[0].end_date_time <= pair[1].start_date_time, "{:?} overlaps {:?}", pair[0], pair[1]);
    }
}

#[test]
fn test_materialization_is_idempotent() {
    let now = wednesday_at(8);
    let rules = vec![TimingRule::new(vec![2, 4], "14:00", "15:00")];
    let schedule = RecurringRuleCompiler::new(FixedClock::shared(now))
        .compile_in(Uuid::new_v4(), &rules, "Asia/Tokyo")
        .unwrap();
    let horizon = Horizon::weeks_from(now, 5);

    let first: Vec<Slot> = SlotMaterializer::materialize(&schedule, horizon).collect();
    let second: Vec<Slot> = SlotMaterializer::materialize(&schedule, horizon).collect();

    assert_eq!(first, second);
    assert_eq!(first.len(), 10);
}

#[test]
fn test_empty_rule_list_yields_no_slots() {
    let now = wednesday_at(8);
    let slots = materialize_all(now, SameDayPolicy::IncludeLaterToday, &[], "UTC", Horizon::weeks_from(now, 4));
    assert!(slots.is_empty());
}

#[test]
fn test_out_of_range_hour_fails_before_any_slot() {
    let compiler = RecurringRuleCompiler::new(FixedClock::shared(wednesday_at(8)));
    let rules = vec![TimingRule::new(vec![1], "25:00", "26:00")];

    assert_matches!(
        compiler.compile_in(Uuid::new_v4(), &rules, "UTC"),
        Err(ScheduleError::InvalidTimingRule(_))
    );
}

#[test]
fn test_local_time_is_stable_across_dst_change() {
    // US clocks spring forward on 2024-03-10.
    let now = at(2024, 3, 1, 12, 0);
    let rules = vec![TimingRule::new(vec![1], "09:00", "10:00")];

    let slots = materialize_all(now, SameDayPolicy::IncludeLaterToday, &rules, "America/New_York", Horizon::weeks_from(now, 3));
    let starts: Vec<_> = slots.iter().map(|s| s.start_date_time).collect();

    assert_eq!(starts, vec![
        at(2024, 3, 4, 14, 0),
        at(2024, 3, 11, 13, 0),
        at(2024, 3, 18, 13, 0),
    ]);
    assert!(slots.iter().all(|s| s.duration() == Duration::hours(1)));
}

#[test]
fn test_horizon_in_the_middle_of_the_schedule() {
    let now = wednesday_at(8);
    let rules = vec![TimingRule::new(vec![3], "09:00", "10:00")];
    let schedule = RecurringRuleCompiler::new(FixedClock::shared(now))
        .compile_in(Uuid::new_v4(), &rules, "UTC")
        .unwrap();

    let horizon = Horizon::new(at(2024, 6, 1, 0, 0), at(2024, 6, 30, 0, 0)).unwrap();
    let slots: Vec<Slot> = SlotMaterializer::materialize(&schedule, horizon).collect();

    assert_eq!(slots.len(), 4);
    assert!(slots.iter().all(|s| s.start_date_time.weekday() == Weekday::Wed));
    assert!(slots.iter().all(|s| s.start_date_time.time() == NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
}

#[test]
fn test_window_spanning_dst_change_keeps_local_end_time() {
    let berlin: Tz = "Europe/Berlin".parse().unwrap();
    let rules = vec![TimingRule::new(vec![7], "01:00", "04:00")];

    // Berlin springs forward on 2024-03-31 and falls back on 2024-10-27.
    for now in [at(2024, 3, 25, 12, 0), at(2024, 10, 21, 12, 0)] {
        let slots = materialize_all(now, SameDayPolicy::IncludeLaterToday, &rules, "Europe/Berlin", Horizon::weeks_from(now, 2));
        assert_eq!(slots.len(), 2);

        for slot in &slots {
            let local_start = slot.start_date_time.with_timezone(&berlin);
            let local_end = slot.end_date_time.with_timezone(&berlin);
            assert_eq!(local_start.time().format("%H:%M").to_string(), "01:00");
            assert_eq!(local_end.time().format("%H:%M").to_string(), "04:00");
        }
    }

    let spring = materialize_all(at(2024, 3, 25, 12, 0), SameDayPolicy::IncludeLaterToday, &rules, "Europe/Berlin", Horizon::weeks_from(at(2024, 3, 25, 12, 0), 1));
    assert_eq!(spring[0].duration(), Duration::hours(2));

    let autumn = materialize_all(at(2024, 10, 21, 12, 0), SameDayPolicy::IncludeLaterToday, &rules, "Europe/Berlin", Horizon::weeks_from(at(2024, 10, 21, 12, 0), 1));
    assert_eq!(autumn[0].duration(), Duration::hours(4));
}
