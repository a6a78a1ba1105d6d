use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TaxBracket;

/// Errors produced when validating bracket schedules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// A schedule must contain at least one bracket.
    #[error("bracket schedule is empty")]
    EmptySchedule,

    /// The first bracket must start at zero income.
    #[error("first bracket starts at {0}, expected 0")]
    FirstBracketNotZero(Decimal),

    /// A bounded bracket whose upper bound does not exceed its lower bound.
    #[error("bracket [{lower}, {upper}] has inverted bounds")]
    InvertedBounds { lower: Decimal, upper: Decimal },

    /// Marginal rates must lie in [0, 1).
    #[error("marginal rate {0} is outside [0, 1)")]
    RateOutOfRange(Decimal),

    /// Brackets must be contiguous: each one starts where the previous ended.
    #[error("bracket starts at {found}, expected {expected}")]
    Gap { expected: Decimal, found: Decimal },

    /// An unbounded bracket can only appear in the last position.
    #[error("unbounded bracket is not the last bracket in the schedule")]
    UnboundedBeforeLast,

    /// A schedule set must contain at least one schedule.
    #[error("schedule set is empty")]
    EmptySet,

    /// Two schedules share the same effective year.
    #[error("duplicate schedule for effective year {0}")]
    DuplicateEffectiveYear(i32),
}

/// A validated, ordered list of brackets for one tax regime.
///
/// Invariants established at construction: brackets are contiguous starting
/// from zero, non-overlapping, with rates in [0, 1). The last bracket may be
/// bounded (a capacity-limited schedule) or unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaxBracket>", into = "Vec<TaxBracket>")]
pub struct BracketSchedule {
    brackets: Vec<TaxBracket>,
}

impl BracketSchedule {
    pub fn new(brackets: Vec<TaxBracket>) -> Result<Self, ScheduleError> {
        let Some(first) = brackets.first() else {
            return Err(ScheduleError::EmptySchedule);
        };
        if first.lower != Decimal::ZERO {
            return Err(ScheduleError::FirstBracketNotZero(first.lower));
        }

        let mut expected_lower = Decimal::ZERO;
        let last = brackets.len() - 1;
        for (idx, bracket) in brackets.iter().enumerate() {
            if bracket.rate < Decimal::ZERO || bracket.rate >= Decimal::ONE {
                return Err(ScheduleError::RateOutOfRange(bracket.rate));
            }
            if bracket.lower != expected_lower {
                return Err(ScheduleError::Gap {
                    expected: expected_lower,
                    found: bracket.lower,
                });
            }
            match bracket.upper {
                Some(upper) if upper <= bracket.lower => {
                    return Err(ScheduleError::InvertedBounds {
                        lower: bracket.lower,
                        upper,
                    });
                }
                Some(upper) => expected_lower = upper,
                None if idx != last => return Err(ScheduleError::UnboundedBeforeLast),
                None => {}
            }
        }

        Ok(Self { brackets })
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    /// Whether marginal rates never decrease from one bracket to the next.
    ///
    /// When this holds the optimizer already prefers lower brackets and no
    /// fill-order enforcement is needed.
    pub fn is_rate_monotonic(&self) -> bool {
        self.brackets
            .windows(2)
            .all(|pair| pair[0].rate <= pair[1].rate)
    }

    /// Total income the schedule can hold, or `None` when the top bracket is
    /// unbounded.
    pub fn capacity(&self) -> Option<Decimal> {
        self.brackets.last().and_then(|b| b.upper)
    }
}

impl TryFrom<Vec<TaxBracket>> for BracketSchedule {
    type Error = ScheduleError;

    fn try_from(brackets: Vec<TaxBracket>) -> Result<Self, Self::Error> {
        Self::new(brackets)
    }
}

impl From<BracketSchedule> for Vec<TaxBracket> {
    fn from(schedule: BracketSchedule) -> Self {
        schedule.brackets
    }
}

/// A mapping from effective calendar year to bracket schedule.
///
/// `schedule_for` selects the schedule with the greatest effective year at or
/// before the query year; years before every effective date fall back to the
/// earliest schedule, so any integer year resolves to a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(i32, BracketSchedule)>", into = "Vec<(i32, BracketSchedule)>")]
pub struct ScheduleSet {
    // sorted by effective year, never empty
    entries: Vec<(i32, BracketSchedule)>,
}

impl TryFrom<Vec<(i32, BracketSchedule)>> for ScheduleSet {
    type Error = ScheduleError;

    fn try_from(entries: Vec<(i32, BracketSchedule)>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<ScheduleSet> for Vec<(i32, BracketSchedule)> {
    fn from(set: ScheduleSet) -> Self {
        set.entries
    }
}

impl ScheduleSet {
    pub fn new(mut entries: Vec<(i32, BracketSchedule)>) -> Result<Self, ScheduleError> {
        if entries.is_empty() {
            return Err(ScheduleError::EmptySet);
        }
        entries.sort_by_key(|(year, _)| *year);
        for pair in entries.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(ScheduleError::DuplicateEffectiveYear(pair[0].0));
            }
        }
        Ok(Self { entries })
    }

    pub fn schedule_for(&self, year: i32) -> &BracketSchedule {
        let idx = self
            .entries
            .partition_point(|(effective, _)| *effective <= year);
        // idx == 0 means the year predates every schedule; use the earliest.
        &self.entries[idx.saturating_sub(1)].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &BracketSchedule)> {
        self.entries.iter().map(|(year, schedule)| (*year, schedule))
    }

    /// The historical Australian resident tables: one schedule in effect
    /// through 2012, and the revised schedule effective 2013.
    pub fn australian_historical() -> Self {
        let pre_2013 = BracketSchedule {
            brackets: vec![
                TaxBracket::new(Decimal::ZERO, Some(Decimal::from(6_000)), Decimal::ZERO),
                TaxBracket::new(
                    Decimal::from(6_000),
                    Some(Decimal::from(37_000)),
                    Decimal::new(15, 2),
                ),
                TaxBracket::new(
                    Decimal::from(37_000),
                    Some(Decimal::from(80_000)),
                    Decimal::new(30, 2),
                ),
                TaxBracket::new(
                    Decimal::from(80_000),
                    Some(Decimal::from(180_000)),
                    Decimal::new(37, 2),
                ),
                TaxBracket::new(Decimal::from(180_000), None, Decimal::new(45, 2)),
            ],
        };
        let from_2013 = BracketSchedule {
            brackets: vec![
                TaxBracket::new(Decimal::ZERO, Some(Decimal::from(18_200)), Decimal::ZERO),
                TaxBracket::new(
                    Decimal::from(18_200),
                    Some(Decimal::from(37_000)),
                    Decimal::new(19, 2),
                ),
                TaxBracket::new(
                    Decimal::from(37_000),
                    Some(Decimal::from(80_000)),
                    Decimal::new(325, 3),
                ),
                TaxBracket::new(
                    Decimal::from(80_000),
                    Some(Decimal::from(180_000)),
                    Decimal::new(37, 2),
                ),
                TaxBracket::new(Decimal::from(180_000), None, Decimal::new(45, 2)),
            ],
        };
        Self {
            entries: vec![(i32::MIN, pre_2013), (2013, from_2013)],
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn bracket(lower: Decimal, upper: Option<Decimal>, rate: Decimal) -> TaxBracket {
        TaxBracket::new(lower, upper, rate)
    }

    fn simple_schedule() -> BracketSchedule {
        BracketSchedule::new(vec![
            bracket(dec!(0), Some(dec!(10000)), dec!(0.1)),
            bracket(dec!(10000), Some(dec!(20000)), dec!(0.2)),
            bracket(dec!(20000), None, dec!(0.3)),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_empty_schedule() {
        assert_eq!(
            BracketSchedule::new(vec![]),
            Err(ScheduleError::EmptySchedule)
        );
    }

    #[test]
    fn rejects_first_bracket_not_starting_at_zero() {
        let result = BracketSchedule::new(vec![bracket(dec!(100), None, dec!(0.1))]);

        assert_eq!(result, Err(ScheduleError::FirstBracketNotZero(dec!(100))));
    }

    #[test]
    fn rejects_gap_between_brackets() {
        let result = BracketSchedule::new(vec![
            bracket(dec!(0), Some(dec!(10000)), dec!(0.1)),
            bracket(dec!(15000), None, dec!(0.2)),
        ]);

        assert_eq!(
            result,
            Err(ScheduleError::Gap {
                expected: dec!(10000),
                found: dec!(15000),
            })
        );
    }

    #[test]
    fn rejects_inverted_bounds() {
        let result = BracketSchedule::new(vec![bracket(dec!(0), Some(dec!(0)), dec!(0.1))]);

        assert_eq!(
            result,
            Err(ScheduleError::InvertedBounds {
                lower: dec!(0),
                upper: dec!(0),
            })
        );
    }

    #[test]
    fn rejects_rate_of_one_or_more() {
        let result = BracketSchedule::new(vec![bracket(dec!(0), None, dec!(1))]);

        assert_eq!(result, Err(ScheduleError::RateOutOfRange(dec!(1))));
    }

    #[test]
    fn rejects_negative_rate() {
        let result = BracketSchedule::new(vec![bracket(dec!(0), None, dec!(-0.1))]);

        assert_eq!(result, Err(ScheduleError::RateOutOfRange(dec!(-0.1))));
    }

    #[test]
    fn rejects_unbounded_bracket_before_last() {
        let result = BracketSchedule::new(vec![
            bracket(dec!(0), None, dec!(0.1)),
            bracket(dec!(10000), None, dec!(0.2)),
        ]);

        assert_eq!(result, Err(ScheduleError::UnboundedBeforeLast));
    }

    #[test]
    fn accepts_bounded_top_bracket() {
        let schedule = BracketSchedule::new(vec![
            bracket(dec!(0), Some(dec!(10000)), dec!(0.1)),
            bracket(dec!(10000), Some(dec!(20000)), dec!(0.2)),
        ])
        .unwrap();

        assert_eq!(schedule.capacity(), Some(dec!(20000)));
    }

    #[test]
    fn monotonic_rates_are_detected() {
        assert!(simple_schedule().is_rate_monotonic());

        let decreasing = BracketSchedule::new(vec![
            bracket(dec!(0), Some(dec!(10000)), dec!(0.3)),
            bracket(dec!(10000), None, dec!(0.1)),
        ])
        .unwrap();
        assert!(!decreasing.is_rate_monotonic());
    }

    #[test]
    fn schedule_set_rejects_duplicate_effective_years() {
        let result = ScheduleSet::new(vec![
            (2013, simple_schedule()),
            (2013, simple_schedule()),
        ]);

        assert_eq!(result, Err(ScheduleError::DuplicateEffectiveYear(2013)));
    }

    #[test]
    fn schedule_set_rejects_empty_input() {
        assert_eq!(ScheduleSet::new(vec![]), Err(ScheduleError::EmptySet));
    }

    #[test]
    fn schedule_for_picks_newest_schedule_in_effect() {
        let set = ScheduleSet::australian_historical();

        assert_eq!(
            set.schedule_for(2012).brackets()[0].upper,
            Some(dec!(6000))
        );
        assert_eq!(
            set.schedule_for(2013).brackets()[0].upper,
            Some(dec!(18200))
        );
        assert_eq!(
            set.schedule_for(2030).brackets()[0].upper,
            Some(dec!(18200))
        );
    }

    #[test]
    fn schedule_for_falls_back_to_earliest_for_ancient_years() {
        let set = ScheduleSet::new(vec![(2013, simple_schedule())]).unwrap();

        assert_eq!(set.schedule_for(1999), set.schedule_for(2013));
    }

    #[test]
    fn historical_tables_are_valid_and_monotonic() {
        for (_, schedule) in ScheduleSet::australian_historical().iter() {
            assert_eq!(schedule.len(), 5);
            assert!(schedule.is_rate_monotonic());
            assert_eq!(schedule.capacity(), None);
            // re-validate through the public constructor
            BracketSchedule::new(schedule.brackets().to_vec()).unwrap();
        }
    }
}
