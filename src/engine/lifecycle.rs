//! Reservation state machine.
//!
//! `PENDING → CONFIRMED → {COMPLETED, NO_SHOW}`, and `PENDING | CONFIRMED → CANCELLED`.
//! Every transition takes the current record by reference and returns the
//! next one; the caller decides whether to persist it.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::config::{CancellationPolicy, CheckInWindow};
use crate::model::*;

use super::cancellation::cancellation_fee;
use super::payment::final_amount;
use super::EngineError;

/// Amounts fixed when a reservation is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charges {
    pub total: Money,
    pub discount: Money,
    pub promotion_discount: Money,
    pub deposit: Money,
}

impl Reservation {
    /// New reservation in `PENDING`, nothing paid yet.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: Ulid,
        court_id: Ulid,
        date: NaiveDate,
        slot: Slot,
        customer: Option<String>,
        charges: Charges,
        now: NaiveDateTime,
        actor: Option<String>,
    ) -> Self {
        Self {
            meta: RecordMeta::new(id, now, actor),
            court_id,
            date,
            slot,
            customer,
            status: ReservationStatus::Pending,
            total_amount: charges.total,
            deposit_amount: charges.deposit,
            discount_amount: charges.discount,
            promotion_discount: charges.promotion_discount,
            final_amount: final_amount(charges.total, charges.discount, charges.promotion_discount),
            payment_status: PaymentStatus::Unpaid,
            cancellation: None,
            checked_in_at: None,
            checked_out_at: None,
        }
    }

    fn reject(&self, attempted: Action, guard: Guard) -> EngineError {
        EngineError::InvalidStateTransition {
            reservation_id: self.meta.id,
            from: self.status,
            attempted,
            guard,
        }
    }

    fn next(&self, status: ReservationStatus, now: NaiveDateTime, actor: Option<&str>) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.meta.touch(now, actor);
        next
    }

    pub fn confirm(&self, now: NaiveDateTime, actor: Option<&str>) -> Result<Self, EngineError> {
        if self.status != ReservationStatus::Pending {
            return Err(self.reject(Action::Confirm, Guard::WrongState));
        }
        Ok(self.next(ReservationStatus::Confirmed, now, actor))
    }

    pub fn check_in(&self, now: NaiveDateTime, window: &CheckInWindow) -> Result<Self, EngineError> {
        if self.status != ReservationStatus::Confirmed {
            return Err(self.reject(Action::CheckIn, Guard::WrongState));
        }
        if self.checked_in_at.is_some() {
            return Err(self.reject(Action::CheckIn, Guard::AlreadyCheckedIn));
        }
        let start = self.starts_at();
        let earliest = start - Duration::minutes(window.early_minutes);
        let latest = start + Duration::minutes(window.late_minutes);
        if now < earliest || now > latest {
            return Err(self.reject(Action::CheckIn, Guard::OutsideCheckInWindow));
        }
        let mut next = self.next(ReservationStatus::Confirmed, now, None);
        next.checked_in_at = Some(now);
        Ok(next)
    }

    pub fn check_out(&self, now: NaiveDateTime) -> Result<Self, EngineError> {
        if self.status != ReservationStatus::Confirmed {
            return Err(self.reject(Action::CheckOut, Guard::WrongState));
        }
        if self.checked_in_at.is_none() {
            return Err(self.reject(Action::CheckOut, Guard::NotCheckedIn));
        }
        if self.checked_out_at.is_some() {
            return Err(self.reject(Action::CheckOut, Guard::AlreadyCheckedOut));
        }
        let mut next = self.next(ReservationStatus::Completed, now, None);
        next.checked_out_at = Some(now);
        Ok(next)
    }

    /// Cancel before the start time, recording the fee the policy keeps.
    pub fn cancel(
        &self,
        actor: &str,
        reason: Option<String>,
        now: NaiveDateTime,
        policy: &CancellationPolicy,
    ) -> Result<Self, EngineError> {
        if !self.status.is_blocking() {
            return Err(self.reject(Action::Cancel, Guard::WrongState));
        }
        let until_start = self.starts_at() - now;
        if until_start <= Duration::zero() {
            return Err(self.reject(Action::Cancel, Guard::AlreadyStarted));
        }
        let fee = cancellation_fee(policy, self.deposit_amount, until_start);
        let mut next = self.next(ReservationStatus::Cancelled, now, Some(actor));
        next.cancellation = Some(Cancellation {
            actor: actor.to_string(),
            reason,
            cancelled_at: now,
            fee,
        });
        Ok(next)
    }

    /// Confirmed, never checked in, and strictly over.
    pub fn mark_no_show(&self, now: NaiveDateTime) -> Result<Self, EngineError> {
        if self.status != ReservationStatus::Confirmed {
            return Err(self.reject(Action::MarkNoShow, Guard::WrongState));
        }
        if self.checked_in_at.is_some() {
            return Err(self.reject(Action::MarkNoShow, Guard::AlreadyCheckedIn));
        }
        if self.ends_at() >= now {
            return Err(self.reject(Action::MarkNoShow, Guard::NotYetEnded));
        }
        Ok(self.next(ReservationStatus::NoShow, now, None))
    }
}
