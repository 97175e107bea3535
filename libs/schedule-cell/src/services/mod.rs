pub mod clock;
pub mod compiler;
pub mod materializer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use compiler::{CompiledSchedule, RecurringRuleCompiler, SameDayPolicy, WeeklyPattern, WEEKLY_OCCURRENCE_COUNT};
pub use materializer::{SlotMaterializer, Slots};
