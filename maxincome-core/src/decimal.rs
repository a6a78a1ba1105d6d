//! Decimal helpers shared across the crate.
//!
//! Domain values (bracket bounds, revenues, reported allocations) are
//! `Decimal`; the solver works in `f64`. Conversion happens here and nowhere
//! else.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// Values at exactly 0.005 are rounded up to 0.01 (away from zero), the
/// standard financial convention.
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a Decimal to f64 for use as a solver bound or coefficient.
pub fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Convert a solved f64 value back to a reportable Decimal, rounded to 2 dp.
///
/// Solver output can carry tiny negative noise (e.g. -1e-12 on a variable
/// bounded below by zero); rounding absorbs it. Non-finite values collapse
/// to zero.
pub fn f64_to_decimal(v: f64) -> Decimal {
    Decimal::try_from(v).map(round_half_up).unwrap_or(Decimal::ZERO)
}
