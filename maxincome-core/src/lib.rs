pub mod decimal;
pub mod models;
pub mod planner;
pub mod program;
pub mod solution;

pub use models::{BracketSchedule, ScheduleError, ScheduleSet, TaxBracket};
pub use planner::{PlanError, PlanInput, PlanModel, PlannerOptions};
pub use program::{Program, Relation, SolveError, Solved};
pub use solution::{BracketAllocation, PlanSolution, YearAllocation};
