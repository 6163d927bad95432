//! Monetary rounding helpers

use bigdecimal::{BigDecimal, RoundingMode};

/// Round a monetary amount to the given number of decimal places.
///
/// Uses half-even rounding. Callers round at every conversion step, not only
/// on final totals, so per-line rounding differences never accumulate into an
/// off-by-a-cent imbalance.
pub fn round_to(amount: &BigDecimal, precision: i64) -> BigDecimal {
    amount.with_scale_round(precision, RoundingMode::HalfEven)
}
