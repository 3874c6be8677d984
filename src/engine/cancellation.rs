use chrono::Duration;
use rust_decimal::Decimal;

use crate::config::CancellationPolicy;
use crate::model::Money;

use super::pricing::round_money;

/// Fee kept from the deposit when cancelling with `until_start` notice.
/// More notice never costs more.
pub fn cancellation_fee(policy: &CancellationPolicy, deposit: Money, until_start: Duration) -> Money {
    if until_start >= Duration::hours(policy.free_hours) {
        Decimal::ZERO
    } else if until_start >= Duration::hours(policy.half_fee_hours) {
        round_money(deposit * Decimal::new(5, 1))
    } else {
        deposit
    }
}

/// What goes back to the customer once the fee is kept.
pub fn refund_due(paid: Money, fee: Money) -> Money {
    (paid - fee).max(Decimal::ZERO)
}
