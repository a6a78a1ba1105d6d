//! Reading a solved model back into domain terms.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::f64_to_decimal;
use crate::planner::YearLayout;
use crate::program::Solved;

/// Income allocated to one bracket of one plan year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketAllocation {
    pub lower: Decimal,
    pub upper: Option<Decimal>,
    pub rate: Decimal,
    pub income: Decimal,
}

/// All bracket allocations for one plan year, with the year total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearAllocation {
    pub calendar_year: i32,
    pub brackets: Vec<BracketAllocation>,
    pub total_income: Decimal,
}

/// The optimized allocation: bracket-by-bracket and year-by-year income,
/// rounded to cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSolution {
    pub years: Vec<YearAllocation>,
    pub total_income: Decimal,
}

impl PlanSolution {
    pub(crate) fn extract(solved: &Solved, years: &[YearLayout]) -> Self {
        let mut out = Vec::with_capacity(years.len());
        let mut total_income = Decimal::ZERO;

        for layout in years {
            let mut brackets = Vec::with_capacity(layout.allocations.len());
            let mut year_total = Decimal::ZERO;
            for allocation in &layout.allocations {
                let income = f64_to_decimal(solved.value(allocation.variable));
                year_total += income;
                brackets.push(BracketAllocation {
                    lower: allocation.bracket.lower,
                    upper: allocation.bracket.upper,
                    rate: allocation.bracket.rate,
                    income,
                });
            }
            total_income += year_total;
            out.push(YearAllocation {
                calendar_year: layout.calendar_year,
                brackets,
                total_income: year_total,
            });
        }

        Self {
            years: out,
            total_income,
        }
    }

    /// The allocation for a given calendar year, if the plan contains it.
    pub fn year(&self, calendar_year: i32) -> Option<&YearAllocation> {
        self.years.iter().find(|y| y.calendar_year == calendar_year)
    }
}
