use rust_decimal::Decimal;

use crate::model::*;

use super::pricing::round_money;
use super::EngineError;

/// Payment status as a pure function of the amounts. Never reads the
/// previous status, so replaying the same ledger always gives the same answer.
pub fn derive_payment_status(final_amount: Money, deposit_amount: Money, completed_sum: Money) -> PaymentStatus {
    if completed_sum <= Decimal::ZERO {
        PaymentStatus::Unpaid
    } else if completed_sum >= final_amount {
        PaymentStatus::Paid
    } else if completed_sum >= deposit_amount {
        PaymentStatus::Deposit
    } else {
        PaymentStatus::Partial
    }
}

/// Sum of ledger entries that actually settled.
pub fn completed_sum(payments: &[Payment]) -> Money {
    payments
        .iter()
        .filter(|p| p.status == LedgerStatus::Completed)
        .map(|p| p.amount)
        .sum()
}

pub fn derive_for(reservation: &Reservation, payments: &[Payment]) -> PaymentStatus {
    derive_payment_status(
        reservation.final_amount,
        reservation.deposit_amount,
        completed_sum(payments),
    )
}

/// `max(0, total − discount − promotion)`.
pub fn final_amount(total: Money, discount: Money, promotion_discount: Money) -> Money {
    (total - discount - promotion_discount).max(Decimal::ZERO)
}

/// Explicit deposit, or `ratio × final`; never more than the final amount.
pub fn deposit_for(final_amount: Money, explicit: Option<Money>, ratio: Decimal) -> Money {
    let deposit = explicit.unwrap_or_else(|| round_money(final_amount * ratio));
    deposit.max(Decimal::ZERO).min(final_amount)
}

/// Ledger entries settle once and may later be refunded; nothing else moves.
pub fn check_ledger_transition(payment: &Payment, to: LedgerStatus) -> Result<(), EngineError> {
    let allowed = matches!(
        (payment.status, to),
        (LedgerStatus::Pending, LedgerStatus::Completed)
            | (LedgerStatus::Pending, LedgerStatus::Failed)
            | (LedgerStatus::Completed, LedgerStatus::Refunded)
    );
    if allowed {
        Ok(())
    } else {
        Err(EngineError::InvalidPaymentTransition {
            payment_id: payment.meta.id,
            from: payment.status,
            to,
        })
    }
}
