//! Monetary amount helpers.
//!
//! Every amount that enters the ledger is normalised to two decimal places.
//! Amounts with more precision than a cent are rejected rather than rounded,
//! so a caller never loses money to silent truncation.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::{LedgerError, LedgerResult};

/// Number of decimal places stored for every amount.
pub const MONEY_SCALE: u32 = 2;

/// Largest single amount accepted (`NUMERIC(15, 2)` headroom on balances).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(999_999_999, 0, 0, false, 2);

/// Validate a caller-supplied amount.
///
/// # Errors
///
/// * `LedgerError::InvalidAmount` - amount is zero, negative, finer than a
///   cent, or larger than [`MAX_AMOUNT`]
pub fn validate_amount(amount: Decimal) -> LedgerResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "{amount} (must be positive)"
        )));
    }

    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LedgerError::InvalidAmount(format!(
            "{amount} (at most {MONEY_SCALE} decimal places)"
        )));
    }

    if amount > MAX_AMOUNT {
        return Err(LedgerError::InvalidAmount(format!(
            "{amount} (exceeds {MAX_AMOUNT})"
        )));
    }

    Ok(to_money(amount))
}

/// Rescale to exactly two decimal places.
pub fn to_money(amount: Decimal) -> Decimal {
    let mut value = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
    value.rescale(MONEY_SCALE);
    value
}

/// `amount × odds`, rounded toward zero to the cent.
///
/// Rounding toward zero means a payout never includes a fraction of a cent
/// that was not staked.
pub fn potential_win(amount: Decimal, odds: Decimal) -> LedgerResult<Decimal> {
    amount
        .checked_mul(odds)
        .map(to_money)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{amount} x {odds} overflows")))
}
