use crate::domain::money::{Amount, Money, Percent};
use crate::error::Result;
use rust_decimal::Decimal;

/// Computes `round_half_up(base_amount * percent / 100, 2)`.
///
/// Takes the raw base amount so that a non-positive input is reported as a
/// validation error here rather than by the caller.
pub fn calculate(base_amount: Decimal, percent: Percent) -> Result<Money> {
    let base = Amount::new(base_amount)?;
    Ok(commission_for(base, percent))
}

/// Infallible form for callers that already hold a validated `Amount`.
pub fn commission_for(base_amount: Amount, percent: Percent) -> Money {
    Money::commission(base_amount, percent)
}
