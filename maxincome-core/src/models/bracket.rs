use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One contiguous income range taxed at a single marginal rate.
///
/// `upper` is `None` for an unbounded top bracket. Validity of a bracket in
/// context (ordering, contiguity, rate range) is checked by
/// [`BracketSchedule::new`](crate::models::BracketSchedule::new).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub lower: Decimal,
    pub upper: Option<Decimal>,
    pub rate: Decimal,
}

impl TaxBracket {
    pub fn new(lower: Decimal, upper: Option<Decimal>, rate: Decimal) -> Self {
        Self { lower, upper, rate }
    }

    /// Width of the bracket's income range, or `None` when unbounded.
    pub fn width(&self) -> Option<Decimal> {
        self.upper.map(|u| u - self.lower)
    }

    pub fn is_unbounded(&self) -> bool {
        self.upper.is_none()
    }
}
