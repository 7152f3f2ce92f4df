//! Fixed-point money helpers.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on computed amounts (interest, percentage fees).
pub const MONEY_SCALE: u32 = 6;

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// `percent` of `base`, where `percent` is expressed in whole percent (5 = 5%).
pub fn percent_of(base: Decimal, percent: Decimal) -> Decimal {
    round_money(base * percent / Decimal::ONE_HUNDRED)
}
