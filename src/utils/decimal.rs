//! Decimal arithmetic utilities for sizing calculations.

use rust_decimal::Decimal;

/// Round toward zero to a multiple of `lot_size` (sign preserved).
///
/// A zero lot size leaves the value unchanged.
pub fn round_toward_zero_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size == Decimal::ZERO {
        return value;
    }
    (value / lot_size).trunc() * lot_size
}

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}
