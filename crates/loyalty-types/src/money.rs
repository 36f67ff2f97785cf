//! Conversion between decimal amounts and integer minor units (cents).
//!
//! The ledger stores every amount as `i64` cents. Decimals only appear at the
//! edges: oracle responses, withdrawal requests, and API responses.

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

use crate::{constants, LoyaltyError, Result};

/// Render minor units as a two-place decimal (`12345` → `123.45`).
#[must_use]
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, constants::MINOR_UNIT_SCALE)
}

/// Convert a user-supplied amount to minor units, exactly.
///
/// # Errors
/// `Validation` if the amount is not positive, has more than two fractional
/// digits, or does not fit in `i64` cents.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    if amount <= Decimal::ZERO {
        return Err(LoyaltyError::Validation {
            reason: format!("amount must be positive, got {amount}"),
        });
    }
    if amount.normalize().scale() > constants::MINOR_UNIT_SCALE {
        return Err(LoyaltyError::Validation {
            reason: format!(
                "amount {amount} exceeds {} fractional digits",
                constants::MINOR_UNIT_SCALE
            ),
        });
    }
    scaled(amount).ok_or_else(|| LoyaltyError::Validation {
        reason: format!("amount {amount} is out of range"),
    })
}

/// Convert an oracle accrual to minor units, truncating fractional cents.
///
/// Negative accruals are clamped to zero.
///
/// # Errors
/// `OracleTransient` if the value does not fit in `i64` cents.
pub fn accrual_to_minor_units(accrual: Decimal) -> Result<i64> {
    if accrual <= Decimal::ZERO {
        return Ok(0);
    }
    let truncated =
        accrual.round_dp_with_strategy(constants::MINOR_UNIT_SCALE, RoundingStrategy::ToZero);
    scaled(truncated).ok_or_else(|| LoyaltyError::OracleTransient {
        reason: format!("accrual {accrual} is out of range"),
    })
}

fn scaled(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::from(constants::MINOR_UNITS_PER_UNIT))?
        .trunc()
        .to_i64()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn minor_units_render_with_two_places() {
        assert_eq!(from_minor_units(20_000).to_string(), "200.00");
        assert_eq!(from_minor_units(-150).to_string(), "-1.50");
        assert_eq!(from_minor_units(0), Decimal::ZERO);
    }

    #[test]
    fn exact_amounts_convert() {
        assert_eq!(to_minor_units(Decimal::new(100, 0)).unwrap(), 10_000);
        assert_eq!(to_minor_units(Decimal::from_str("751.5").unwrap()).unwrap(), 75_150);
        assert_eq!(to_minor_units(Decimal::from_str("0.01").unwrap()).unwrap(), 1);
        // Trailing zeros beyond two places are still exact.
        assert_eq!(to_minor_units(Decimal::from_str("1.2300").unwrap()).unwrap(), 123);
    }

    #[test]
    fn fractional_cents_rejected() {
        let err = to_minor_units(Decimal::from_str("1.005").unwrap()).unwrap_err();
        assert!(matches!(err, LoyaltyError::Validation { .. }));
    }

    #[test]
    fn non_positive_rejected() {
        assert!(to_minor_units(Decimal::ZERO).is_err());
        assert!(to_minor_units(Decimal::new(-5, 0)).is_err());
    }

    #[test]
    fn accrual_truncates_toward_zero() {
        assert_eq!(accrual_to_minor_units(Decimal::from_str("729.98").unwrap()).unwrap(), 72_998);
        assert_eq!(accrual_to_minor_units(Decimal::from_str("0.019").unwrap()).unwrap(), 1);
        assert_eq!(accrual_to_minor_units(Decimal::from_str("200").unwrap()).unwrap(), 20_000);
        assert_eq!(accrual_to_minor_units(Decimal::new(-3, 0)).unwrap(), 0);
    }
}
