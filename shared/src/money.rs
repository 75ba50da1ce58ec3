//! Money calculation utilities using rust_decimal for precision
//!
//! Amounts travel as `f64` on the wire. Every comparison and derivation
//! converts to `Decimal` first and converts back rounded to 2 decimal
//! places.

use rust_decimal::prelude::*;

/// Monetary values carry 2 decimal places
const DECIMAL_PLACES: u32 = 2;

/// Convert f64 to Decimal for calculation
///
/// Non-finite input is logged and treated as zero.
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Convert Decimal back to f64, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Minimum deposit for a service: `price * percentage / 100`
///
/// The exact amount is kept when it fits in cents; a fraction of a cent
/// rounds up so the deposit never falls below the configured share.
pub fn deposit_amount(price: f64, percentage: f64) -> f64 {
    if percentage <= 0.0 || price <= 0.0 {
        return 0.0;
    }
    // f64 noise below 1e-6 must not push an exact amount up a cent
    let exact = (to_decimal(price) * to_decimal(percentage) / Decimal::ONE_HUNDRED).round_dp(6);
    let rounded = exact.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::AwayFromZero);
    rounded.to_f64().unwrap_or_default()
}

/// `total - paid`, never negative
pub fn remaining(total: f64, paid: f64) -> f64 {
    let diff = to_decimal(total) - to_decimal(paid);
    if diff.is_sign_negative() {
        0.0
    } else {
        to_f64(diff)
    }
}

/// True when `amount` is strictly below `minimum` at cent precision
pub fn is_below(amount: f64, minimum: f64) -> bool {
    let amount = to_decimal(amount).round_dp(DECIMAL_PLACES);
    let minimum = to_decimal(minimum).round_dp(DECIMAL_PLACES);
    amount < minimum
}

/// Display form used in tickets and prompts (`$1,250.50` style without grouping)
pub fn format_amount(value: f64) -> String {
    format!("${:.2}", to_f64(to_decimal(value)))
}
