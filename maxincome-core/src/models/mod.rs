mod bracket;
mod schedule;

pub use bracket::TaxBracket;
pub use schedule::{BracketSchedule, ScheduleError, ScheduleSet};
