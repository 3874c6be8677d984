use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::*;

use super::calendar::{check_advance, check_open};
use super::cancellation::refund_due;
use super::conflict::{check_no_conflict, validate_request};
use super::lifecycle::Charges;
use super::payment::{check_ledger_transition, completed_sum, derive_payment_status, deposit_for, final_amount};
use super::pricing;
use super::{Engine, EngineError};

/// A request to reserve `[start, end)` on one court and date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub id: Ulid,
    pub court_id: Ulid,
    pub date: NaiveDate,
    pub start: Minute,
    pub end: Minute,
    pub customer: Option<String>,
    pub discount: Money,
    pub promotion_discount: Money,
    /// Overrides the configured deposit ratio.
    pub deposit: Option<Money>,
    pub actor: Option<String>,
}

impl BookingRequest {
    pub fn new(id: Ulid, court_id: Ulid, date: NaiveDate, start: Minute, end: Minute) -> Self {
        Self {
            id,
            court_id,
            date,
            start,
            end,
            customer: None,
            discount: Decimal::ZERO,
            promotion_discount: Decimal::ZERO,
            deposit: None,
            actor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationOutcome {
    pub reservation: Reservation,
    pub fee: Money,
    pub refund_due: Money,
}

fn check_text(value: Option<&str>, what: &'static str) -> Result<(), EngineError> {
    if value.is_some_and(|v| v.len() > MAX_TEXT_LEN) {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

fn record_transition(action: &'static str, result: &Result<Reservation, EngineError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => e.label(),
    };
    metrics::counter!(TRANSITIONS_TOTAL, "action" => action, "status" => status).increment(1);
}

impl Engine {
    // ── Facility setup ───────────────────────────────────────

    pub async fn register_court(&self, court: Court) -> Result<(), EngineError> {
        if self.courts.len() >= MAX_COURTS {
            return Err(EngineError::LimitExceeded("too many courts"));
        }
        check_text(court.name.as_deref(), "court name too long")?;
        let id = court.id;
        match self.courts.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(CourtState::new(court))));
            }
        }
        metrics::gauge!(COURTS_REGISTERED).set(self.courts.len() as f64);
        info!("registered court {id}");
        Ok(())
    }

    pub async fn set_court_status(&self, court_id: Ulid, status: CourtStatus) -> Result<(), EngineError> {
        let mut guard = self.court_write(court_id).await?;
        if guard.court.status != status {
            guard.court.status = status;
            info!("court {court_id} is now {status:?}");
            self.notify.send(&Event::CourtStatusChanged { court_id, status });
        }
        Ok(())
    }

    /// Add an opening window. Windows on the same weekday may not overlap.
    pub async fn add_window(&self, window: WeeklyWindow) -> Result<(), EngineError> {
        if window.hours.start >= window.hours.end || window.hours.end > MINUTES_PER_DAY {
            return Err(EngineError::Validation("window hours must be a non-empty range within the day"));
        }
        if window.slot_minutes == 0 || window.slot_minutes > MAX_SLOT_GRANULARITY_MINUTES {
            return Err(EngineError::Validation("slot granularity out of range"));
        }
        if self.entity_to_court.contains_key(&window.id) {
            return Err(EngineError::AlreadyExists(window.id));
        }
        let court_id = window.court_id;
        let mut guard = self.court_write(court_id).await?;
        if guard.windows.len() >= MAX_WINDOWS_PER_COURT {
            return Err(EngineError::LimitExceeded("too many windows on court"));
        }
        if guard
            .windows
            .iter()
            .any(|w| w.weekday == window.weekday && w.hours.overlaps(&window.hours))
        {
            return Err(EngineError::Validation("window overlaps an existing window"));
        }
        self.claim_id(window.id, court_id)?;
        guard.windows.push(window);
        Ok(())
    }

    pub async fn remove_window(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (court_id, mut guard) = self.resolve_entity_write(&id).await?;
        let pos = guard
            .windows
            .iter()
            .position(|w| w.id == id)
            .ok_or(EngineError::NotFound(id))?;
        guard.windows.remove(pos);
        self.entity_to_court.remove(&id);
        Ok(court_id)
    }

    pub async fn add_blackout(&self, blackout: MaintenanceBlackout) -> Result<(), EngineError> {
        if blackout.start_date > blackout.end_date {
            return Err(EngineError::Validation("blackout ends before it starts"));
        }
        if blackout.end_date - blackout.start_date > Duration::days(MAX_BLACKOUT_DAYS) {
            return Err(EngineError::LimitExceeded("blackout too long"));
        }
        check_text(blackout.reason.as_deref(), "blackout reason too long")?;
        if self.entity_to_court.contains_key(&blackout.id) {
            return Err(EngineError::AlreadyExists(blackout.id));
        }
        let court_id = blackout.court_id;
        let mut guard = self.court_write(court_id).await?;
        if guard.blackouts.len() >= MAX_BLACKOUTS_PER_COURT {
            return Err(EngineError::LimitExceeded("too many blackouts on court"));
        }
        self.claim_id(blackout.id, court_id)?;
        info!(
            "blackout {} on court {court_id}: {} to {}",
            blackout.id, blackout.start_date, blackout.end_date
        );
        guard.blackouts.push(blackout);
        Ok(())
    }

    pub async fn set_blackout_status(&self, id: Ulid, status: MaintenanceStatus) -> Result<Ulid, EngineError> {
        let (court_id, mut guard) = self.resolve_entity_write(&id).await?;
        let blackout = guard
            .blackouts
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(EngineError::NotFound(id))?;
        blackout.status = status;
        Ok(court_id)
    }

    pub async fn add_rate_rule(&self, rule: RateRule) -> Result<(), EngineError> {
        if rule.hours.start >= rule.hours.end || rule.hours.end > MINUTES_PER_DAY {
            return Err(EngineError::Validation("rule hours must be a non-empty range within the day"));
        }
        if rule.min_minutes == 0 || rule.min_minutes > rule.max_minutes {
            return Err(EngineError::Validation("rule duration bounds are inverted or empty"));
        }
        if rule.price_per_hour < Decimal::ZERO {
            return Err(EngineError::Validation("negative price"));
        }
        if self.entity_to_court.contains_key(&rule.id) {
            return Err(EngineError::AlreadyExists(rule.id));
        }
        let court_id = rule.court_id;
        let mut guard = self.court_write(court_id).await?;
        if guard.rules.len() >= MAX_RATE_RULES_PER_COURT {
            return Err(EngineError::LimitExceeded("too many rate rules on court"));
        }
        self.claim_id(rule.id, court_id)?;
        guard.rules.push(rule);
        Ok(())
    }

    pub async fn set_rate_rule_active(&self, id: Ulid, active: bool) -> Result<Ulid, EngineError> {
        let (court_id, mut guard) = self.resolve_entity_write(&id).await?;
        let rule = guard
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(EngineError::NotFound(id))?;
        rule.active = active;
        Ok(court_id)
    }

    // ── Booking ──────────────────────────────────────────────

    /// Check, price and insert a new `PENDING` reservation as one unit under
    /// the court's write lock.
    pub async fn book(&self, request: BookingRequest, now: NaiveDateTime) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let id = request.id;
        let court_id = request.court_id;
        let result = self.try_book(request, now).await;
        metrics::histogram!(BOOKING_COMMIT_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match &result {
            Ok(r) => {
                metrics::counter!(RESERVATIONS_CREATED_TOTAL).increment(1);
                info!(
                    "reservation {id} on court {court_id}: {} {} final {}",
                    r.date, r.slot, r.final_amount
                );
            }
            Err(e) => {
                metrics::counter!(BOOKINGS_REJECTED_TOTAL, "reason" => e.label()).increment(1);
                debug!("booking {id} on court {court_id} rejected: {e}");
            }
        }
        result
    }

    async fn try_book(&self, request: BookingRequest, now: NaiveDateTime) -> Result<Reservation, EngineError> {
        let BookingRequest {
            id,
            court_id,
            date,
            start,
            end,
            customer,
            discount,
            promotion_discount,
            deposit,
            actor,
        } = request;

        let slot = validate_request(date, start, end, now)?;
        check_text(customer.as_deref(), "customer too long")?;
        check_text(actor.as_deref(), "actor too long")?;
        if discount < Decimal::ZERO || promotion_discount < Decimal::ZERO {
            return Err(EngineError::Validation("negative discount"));
        }
        if deposit.is_some_and(|d| d < Decimal::ZERO) {
            return Err(EngineError::Validation("negative deposit"));
        }
        // early out; `claim_id` under the lock is authoritative
        if self.entity_to_court.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let mut guard = self.court_write(court_id).await?;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_COURT {
            return Err(EngineError::LimitExceeded("too many reservations on court"));
        }

        let window = check_open(&guard.court, &guard.windows, &guard.blackouts, date, &slot)
            .map_err(|reason| EngineError::NotBookable { court_id, reason })?;
        check_advance(window, date, &slot, now).map_err(|reason| EngineError::NotBookable { court_id, reason })?;
        check_no_conflict(court_id, date, &slot, guard.reservations_on(date))?;
        let quote = pricing::quote(&guard.rules, court_id, date, &slot)?;

        let final_due = final_amount(quote.amount, discount, promotion_discount);
        let charges = Charges {
            total: quote.amount,
            discount,
            promotion_discount,
            deposit: deposit_for(final_due, deposit, self.config.deposit_ratio),
        };
        let reservation = Reservation::pending(id, court_id, date, slot, customer, charges, now, actor);

        self.claim_id(id, court_id)?;
        guard.insert_reservation(reservation.clone());
        self.notify.send(&Event::ReservationCreated {
            id,
            court_id,
            date,
            slot,
            final_amount: reservation.final_amount,
        });
        Ok(reservation)
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Apply `step` to the stored reservation under the court lock and store
    /// the result.
    async fn transition<F>(&self, id: Ulid, step: F) -> Result<(Ulid, Reservation), EngineError>
    where
        F: FnOnce(&Reservation) -> Result<Reservation, EngineError>,
    {
        let (court_id, mut guard) = self.resolve_entity_write(&id).await?;
        let current = guard.reservation_mut(id).ok_or(EngineError::NotFound(id))?;
        let next = step(current)?;
        *current = next.clone();
        Ok((court_id, next))
    }

    pub async fn confirm(&self, id: Ulid, now: NaiveDateTime, actor: Option<&str>) -> Result<Reservation, EngineError> {
        let result = self
            .transition(id, |r| r.confirm(now, actor))
            .await
            .map(|(court_id, r)| {
                self.notify.send(&Event::ReservationConfirmed { id, court_id });
                r
            });
        record_transition("confirm", &result);
        result
    }

    pub async fn check_in(&self, id: Ulid, now: NaiveDateTime) -> Result<Reservation, EngineError> {
        let window = self.config.check_in;
        let result = self
            .transition(id, |r| r.check_in(now, &window))
            .await
            .map(|(court_id, r)| {
                self.notify.send(&Event::CheckedIn { id, court_id, at: now });
                r
            });
        record_transition("check_in", &result);
        result
    }

    pub async fn check_out(&self, id: Ulid, now: NaiveDateTime) -> Result<Reservation, EngineError> {
        let result = self
            .transition(id, |r| r.check_out(now))
            .await
            .map(|(court_id, r)| {
                self.notify.send(&Event::CheckedOut { id, court_id, at: now });
                r
            });
        record_transition("check_out", &result);
        result
    }

    pub async fn mark_no_show(&self, id: Ulid, now: NaiveDateTime) -> Result<Reservation, EngineError> {
        let result = self
            .transition(id, |r| r.mark_no_show(now))
            .await
            .map(|(court_id, r)| {
                self.notify.send(&Event::NoShowMarked { id, court_id });
                r
            });
        record_transition("mark_no_show", &result);
        result
    }

    /// Cancel and report the fee kept plus what must be refunded from
    /// completed payments.
    pub async fn cancel(
        &self,
        id: Ulid,
        actor: &str,
        reason: Option<String>,
        now: NaiveDateTime,
    ) -> Result<CancellationOutcome, EngineError> {
        check_text(Some(actor), "actor too long")?;
        check_text(reason.as_deref(), "cancellation reason too long")?;
        let policy = self.config.cancellation;

        let (court_id, mut guard) = self.resolve_entity_write(&id).await?;
        let paid = completed_sum(guard.payments_for(id));
        let current = guard.reservation_mut(id).ok_or(EngineError::NotFound(id))?;
        let result = current.cancel(actor, reason, now, &policy);
        record_transition("cancel", &result);
        let next = result?;
        *current = next.clone();
        drop(guard);

        let fee = next.cancellation.as_ref().map_or(Decimal::ZERO, |c| c.fee);
        if fee > Decimal::ZERO {
            metrics::counter!(CANCELLATIONS_WITH_FEE_TOTAL).increment(1);
        }
        info!("reservation {id} cancelled by {actor}, fee {fee}");
        self.notify.send(&Event::ReservationCancelled { id, court_id, fee });
        Ok(CancellationOutcome {
            reservation: next,
            fee,
            refund_due: refund_due(paid, fee),
        })
    }

    // ── Payments ─────────────────────────────────────────────

    /// Record a ledger entry and recompute the reservation's payment status.
    pub async fn post_payment(
        &self,
        id: Ulid,
        reservation_id: Ulid,
        amount: Money,
        status: LedgerStatus,
        now: NaiveDateTime,
        actor: Option<String>,
    ) -> Result<PaymentStatus, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation("payment amount must be positive"));
        }
        if status == LedgerStatus::Refunded {
            return Err(EngineError::Validation("a new payment cannot start refunded"));
        }
        check_text(actor.as_deref(), "actor too long")?;
        if self.payment_to_reservation.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let (court_id, mut guard) = self.resolve_entity_write(&reservation_id).await?;
        if guard.reservation(reservation_id).is_none() {
            return Err(EngineError::NotFound(reservation_id));
        }
        if guard.payments_for(reservation_id).len() >= MAX_PAYMENTS_PER_RESERVATION {
            return Err(EngineError::LimitExceeded("too many payments on reservation"));
        }
        match self.payment_to_reservation.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(reservation_id);
            }
        }
        guard.payments.entry(reservation_id).or_default().push(Payment {
            meta: RecordMeta::new(id, now, actor),
            reservation_id,
            amount,
            status,
        });
        metrics::counter!(PAYMENTS_TOTAL, "status" => ledger_label(status)).increment(1);
        self.notify.send(&Event::PaymentRecorded {
            id,
            reservation_id,
            court_id,
            amount,
            status,
        });

        self.refresh_payment_status(court_id, &mut guard, reservation_id, now)
    }

    /// Move a ledger entry (settle, fail, refund) and recompute.
    pub async fn update_payment_status(
        &self,
        id: Ulid,
        to: LedgerStatus,
        now: NaiveDateTime,
    ) -> Result<PaymentStatus, EngineError> {
        let reservation_id = self
            .payment_to_reservation
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(id))?;
        let (court_id, mut guard) = self.resolve_entity_write(&reservation_id).await?;
        let payment = guard
            .payments
            .get_mut(&reservation_id)
            .and_then(|ps| ps.iter_mut().find(|p| p.meta.id == id))
            .ok_or(EngineError::NotFound(id))?;
        check_ledger_transition(payment, to)?;
        payment.status = to;
        payment.meta.touch(now, None);
        let amount = payment.amount;
        metrics::counter!(PAYMENTS_TOTAL, "status" => ledger_label(to)).increment(1);
        self.notify.send(&Event::PaymentRecorded {
            id,
            reservation_id,
            court_id,
            amount,
            status: to,
        });

        self.refresh_payment_status(court_id, &mut guard, reservation_id, now)
    }

    /// Derive payment status from the ledger from scratch and store it.
    fn refresh_payment_status(
        &self,
        court_id: Ulid,
        cs: &mut CourtState,
        reservation_id: Ulid,
        now: NaiveDateTime,
    ) -> Result<PaymentStatus, EngineError> {
        let paid = completed_sum(cs.payments_for(reservation_id));
        let r = cs
            .reservation_mut(reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?;
        let from = r.payment_status;
        let to = derive_payment_status(r.final_amount, r.deposit_amount, paid);
        if from != to {
            r.payment_status = to;
            r.meta.touch(now, None);
            debug!("reservation {reservation_id} payment {from:?} -> {to:?}");
            self.notify.send(&Event::PaymentStatusChanged {
                reservation_id,
                court_id,
                from,
                to,
            });
        }
        Ok(to)
    }
}

impl Engine {
    /// Register `id` as belonging to `court_id`. Called with the court's write
    /// lock held, right before the record is stored.
    fn claim_id(&self, id: Ulid, court_id: Ulid) -> Result<(), EngineError> {
        match self.entity_to_court.entry(id) {
            Entry::Occupied(_) => Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(court_id);
                Ok(())
            }
        }
    }
}

fn ledger_label(status: LedgerStatus) -> &'static str {
    match status {
        LedgerStatus::Pending => "pending",
        LedgerStatus::Completed => "completed",
        LedgerStatus::Failed => "failed",
        LedgerStatus::Refunded => "refunded",
    }
}
