//! Weekly availability for therapists: timing rules are compiled into an
//! immutable recurrence and projected into concrete bookable slots.

pub mod models;
pub mod services;

pub use models::{
    Horizon, ScheduleError, Slot, SlotStatus, TimingRule, ValidatedRule,
};
pub use services::{
    Clock, CompiledSchedule, FixedClock, RecurringRuleCompiler, SameDayPolicy,
    SlotMaterializer, Slots, SystemClock, WeeklyPattern,
};
