pub mod loader;

pub use loader::{
    BracketScheduleRecord, PlanLoader, PlanRecord, ScheduleLoader, ScheduleLoaderError,
};
