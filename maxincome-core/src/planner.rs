//! Model assembly.
//!
//! Turns a multi-year plan (years, revenues, interest rate, reference year)
//! plus a [`ScheduleSet`] into a complete optimization model: one income
//! variable per (year, bracket) pair bounded by the bracket width, an
//! objective that discounts after-tax income to present value, cumulative
//! per-year revenue constraints, and (when marginal rates can decrease)
//! binary fill indicators forcing brackets to fill in income order.

use good_lp::{Expression, Variable};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::decimal::decimal_to_f64;
use crate::models::{ScheduleSet, TaxBracket};
use crate::program::{Program, Relation, SolveError};
use crate::solution::PlanSolution;

/// Stand-in upper bound for an unbounded top bracket. Wide enough for any
/// realistic income, narrow enough to keep the solver numerics sane.
pub const UNBOUNDED_BRACKET_CAP: f64 = 1e9;

/// Default relative tolerance for the "previous bracket is full" check.
pub const DEFAULT_FILL_TOLERANCE: f64 = 1e-8;

/// A multi-year income plan to optimize over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanInput {
    /// Calendar years, strictly increasing.
    pub years: Vec<i32>,

    /// Revenue earned in each year, parallel to `years`.
    pub revenues: Vec<Decimal>,

    /// Annual interest rate used to discount future income.
    pub interest_rate: Decimal,

    /// Year from which discounting offsets are measured. Years at or before
    /// it are not discounted.
    pub reference_year: i32,
}

/// Assembly-time policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerOptions {
    /// Whether to add the bracket fill-order enforcement. `None` decides
    /// automatically: enforce exactly when some schedule used by the plan
    /// has non-monotonic marginal rates.
    pub enforce_bracket_ordering: Option<bool>,

    /// Relative tolerance for treating the previous bracket as fully
    /// allocated, scaled by the bracket width before use.
    pub fill_tolerance: f64,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            enforce_bracket_ordering: None,
            fill_tolerance: DEFAULT_FILL_TOLERANCE,
        }
    }
}

/// Configuration errors, rejected before any model is built.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("no plan years were provided")]
    NoYears,

    #[error("got {years} years but {revenues} revenues")]
    LengthMismatch { years: usize, revenues: usize },

    #[error("plan years must be strictly increasing")]
    YearsNotIncreasing,

    #[error("interest rate must be non-negative, got {0}")]
    NegativeInterestRate(Decimal),

    #[error("revenue for year {year} must be non-negative, got {revenue}")]
    NegativeRevenue { year: i32, revenue: Decimal },

    #[error("fill tolerance must be in [0, 1), got {0}")]
    FillToleranceOutOfRange(f64),
}

/// One bracket income variable together with the bracket it allocates to.
pub(crate) struct BracketVar {
    pub(crate) bracket: TaxBracket,
    pub(crate) variable: Variable,
}

/// The variables created for one plan year, in bracket order.
pub(crate) struct YearLayout {
    pub(crate) calendar_year: i32,
    pub(crate) allocations: Vec<BracketVar>,
}

/// A fully assembled optimization model for one plan, ready to solve.
pub struct PlanModel {
    program: Program,
    years: Vec<YearLayout>,
    ordering_enforced: bool,
}

impl PlanModel {
    /// Assemble the model.
    ///
    /// Builds, for each year in order: the year's bracket income variables
    /// (bounded by bracket width, contributing discounted after-tax income
    /// to the objective), optional fill-order enforcement between adjacent
    /// brackets, and the cumulative revenue constraint. Only the final
    /// year's constraint is an equality, forcing all earned revenue to be
    /// allocated; earlier years may defer revenue forward.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] for mismatched or empty inputs, non-increasing
    /// years, or negative rates/revenues.
    pub fn build(
        schedules: &ScheduleSet,
        input: &PlanInput,
        options: &PlannerOptions,
    ) -> Result<Self, PlanError> {
        validate_input(input, options)?;

        let year_schedules: Vec<_> = input
            .years
            .iter()
            .map(|&year| schedules.schedule_for(year))
            .collect();
        let enforce = options.enforce_bracket_ordering.unwrap_or_else(|| {
            year_schedules.iter().any(|s| !s.is_rate_monotonic())
        });

        let interest_rate = decimal_to_f64(input.interest_rate);
        let last_index = input.years.len() - 1;

        let mut program = Program::new();
        let mut years = Vec::with_capacity(input.years.len());

        // Explicit fold: one cumulative wage expression and one cumulative
        // revenue per year, compared in that year's constraint.
        let mut cumulative_wages = Expression::from(0);
        let mut cumulative_revenue = Decimal::ZERO;

        for (index, (&year, &revenue)) in
            input.years.iter().zip(&input.revenues).enumerate()
        {
            let schedule = year_schedules[index];
            let offset = i64::from(year) - i64::from(input.reference_year);
            let factor = discount_factor(interest_rate, offset);
            debug!(year, offset, factor, brackets = schedule.len(), "adding plan year");

            let mut allocations = Vec::with_capacity(schedule.len());
            let mut previous: Option<(Variable, f64)> = None;
            for bracket in schedule.brackets() {
                let width = bracket
                    .width()
                    .map(decimal_to_f64)
                    .unwrap_or(UNBOUNDED_BRACKET_CAP);
                let variable = add_bracket_variable(&mut program, bracket, width, factor);

                if enforce {
                    if let Some((previous_var, previous_width)) = previous {
                        enforce_fill_order(
                            &mut program,
                            variable,
                            width,
                            previous_var,
                            previous_width,
                            options.fill_tolerance,
                        );
                    }
                }

                cumulative_wages += variable;
                previous = Some((variable, width));
                allocations.push(BracketVar {
                    bracket: bracket.clone(),
                    variable,
                });
            }

            cumulative_revenue += revenue;
            add_year_constraint(
                &mut program,
                cumulative_wages.clone(),
                decimal_to_f64(cumulative_revenue),
                index == last_index,
            );

            years.push(YearLayout {
                calendar_year: year,
                allocations,
            });
        }

        info!(
            years = input.years.len(),
            variables = program.num_variables(),
            ordering_enforced = enforce,
            "assembled allocation model"
        );

        Ok(Self {
            program,
            years,
            ordering_enforced: enforce,
        })
    }

    /// Whether fill-order enforcement was added to this model.
    pub fn ordering_enforced(&self) -> bool {
        self.ordering_enforced
    }

    /// The underlying program, for inspecting bounds, constraints, and
    /// objective coefficients.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Solve the model and extract per-year, per-bracket allocations.
    pub fn solve(self) -> Result<PlanSolution, SolveError> {
        let solved = self.program.solve()?;
        Ok(PlanSolution::extract(&solved, &self.years))
    }
}

/// Multiplier converting year `offset`'s after-tax income to present value:
/// exactly 1 for the reference year and earlier, compound-interest discounted
/// beyond it.
pub fn discount_factor(interest_rate: f64, offset: i64) -> f64 {
    if offset <= 0 {
        1.0
    } else {
        // Offsets past i32 range underflow to zero anyway once raised.
        let offset = i32::try_from(offset).unwrap_or(i32::MAX);
        (1.0 + interest_rate).powi(-offset)
    }
}

/// Create the income variable for one (year, bracket) pair and accumulate
/// its discounted after-tax contribution into the objective.
fn add_bracket_variable(
    program: &mut Program,
    bracket: &TaxBracket,
    width: f64,
    discount: f64,
) -> Variable {
    let variable = program.add_continuous(0.0, width);
    let after_tax = 1.0 - decimal_to_f64(bracket.rate);
    program.add_to_objective(variable * (after_tax * discount));
    variable
}

/// Couple two adjacent bracket variables so the upper one stays at zero
/// until the lower one is (within tolerance) fully allocated.
///
/// The indicator may reach 1 only when `previous >= previous_width * (1 - ε)`
/// and `current` is capped at `indicator * width`, so brackets fill in income
/// order even when a higher bracket carries a lower rate.
fn enforce_fill_order(
    program: &mut Program,
    current: Variable,
    current_width: f64,
    previous: Variable,
    previous_width: f64,
    fill_tolerance: f64,
) {
    let indicator = program.add_binary();
    // indicator <= (previous + eps) / previous_width, with eps relative to
    // the width; dividing through leaves the tolerance itself as the slack.
    program.add_constraint(
        Expression::from(indicator) - previous * (1.0 / previous_width),
        Relation::LessEq,
        fill_tolerance,
    );
    program.add_constraint(
        Expression::from(current) - indicator * current_width,
        Relation::LessEq,
        0.0,
    );
}

/// Constrain the cumulative wage expression against cumulative revenue:
/// an upper bound for deferrable years, an equality for the final year.
fn add_year_constraint(
    program: &mut Program,
    cumulative_wages: Expression,
    cumulative_revenue: f64,
    is_final_year: bool,
) {
    let relation = if is_final_year {
        Relation::Eq
    } else {
        Relation::LessEq
    };
    program.add_constraint(cumulative_wages, relation, cumulative_revenue);
}

fn validate_input(input: &PlanInput, options: &PlannerOptions) -> Result<(), PlanError> {
    if input.years.is_empty() {
        return Err(PlanError::NoYears);
    }
    if input.years.len() != input.revenues.len() {
        return Err(PlanError::LengthMismatch {
            years: input.years.len(),
            revenues: input.revenues.len(),
        });
    }
    if input.years.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(PlanError::YearsNotIncreasing);
    }
    if input.interest_rate < Decimal::ZERO {
        return Err(PlanError::NegativeInterestRate(input.interest_rate));
    }
    for (&year, &revenue) in input.years.iter().zip(&input.revenues) {
        if revenue < Decimal::ZERO {
            return Err(PlanError::NegativeRevenue { year, revenue });
        }
    }
    // Negative tolerances make every indicator unreachable; tolerances at or
    // above 1 let an empty bracket count as full. Both void the enforcement.
    if !(0.0..1.0).contains(&options.fill_tolerance) {
        return Err(PlanError::FillToleranceOutOfRange(options.fill_tolerance));
    }
    Ok(())
}
