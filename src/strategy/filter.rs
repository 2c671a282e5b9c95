//! Minimum-notional trade filter.

use rust_decimal::Decimal;

/// Whether a quantity change is worth trading.
///
/// The boundary is inclusive: a delta whose notional equals `min_notional`
/// is traded. A zero delta is never traded.
pub fn should_trade(delta_qty: Decimal, price: Decimal, min_notional: Decimal) -> bool {
    if delta_qty.is_zero() {
        return false;
    }
    delta_qty.abs() * price >= min_notional
}
