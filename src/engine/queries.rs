use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::model::*;
use crate::observability::QUOTES_TOTAL;

use super::calendar::{self, check_advance, check_open};
use super::conflict::{check_no_conflict, validate_request};
use super::pricing;
use super::{Engine, EngineError};

impl Engine {
    /// Advisory "is this slot bookable, and for how much?". Runs the same
    /// checks as `book` under a read lock; the answer may be stale by the
    /// time a booking is committed.
    pub async fn quote(
        &self,
        court_id: Ulid,
        date: NaiveDate,
        start: Minute,
        end: Minute,
        now: NaiveDateTime,
    ) -> Result<PriceQuote, EngineError> {
        let result = self.try_quote(court_id, date, start, end, now).await;
        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        metrics::counter!(QUOTES_TOTAL, "status" => status).increment(1);
        result
    }

    async fn try_quote(
        &self,
        court_id: Ulid,
        date: NaiveDate,
        start: Minute,
        end: Minute,
        now: NaiveDateTime,
    ) -> Result<PriceQuote, EngineError> {
        let slot = validate_request(date, start, end, now)?;
        let cs = self.get_court(&court_id).ok_or(EngineError::NotFound(court_id))?;
        let guard = cs.read().await;

        let window = check_open(&guard.court, &guard.windows, &guard.blackouts, date, &slot)
            .map_err(|reason| EngineError::NotBookable { court_id, reason })?;
        check_advance(window, date, &slot, now).map_err(|reason| EngineError::NotBookable { court_id, reason })?;
        check_no_conflict(court_id, date, &slot, guard.reservations_on(date))?;
        pricing::quote(&guard.rules, court_id, date, &slot)
    }

    /// Free intervals on `date`, optionally only those at least `min_minutes` long.
    pub async fn open_slots(
        &self,
        court_id: Ulid,
        date: NaiveDate,
        min_minutes: Option<u32>,
    ) -> Result<Vec<Slot>, EngineError> {
        let cs = self.get_court(&court_id).ok_or(EngineError::NotFound(court_id))?;
        let guard = cs.read().await;
        Ok(calendar::open_slots(
            &guard.court,
            &guard.windows,
            &guard.blackouts,
            guard.reservations_on(date),
            date,
            min_minutes,
        ))
    }

    pub async fn get_reservation(&self, id: Ulid) -> Option<Reservation> {
        let court_id = self.get_court_for_entity(&id)?;
        let cs = self.get_court(&court_id)?;
        let guard = cs.read().await;
        guard.reservation(id).cloned()
    }

    /// Every reservation on the court for `date`, any status, ordered by start.
    pub async fn reservations_on(&self, court_id: Ulid, date: NaiveDate) -> Result<Vec<Reservation>, EngineError> {
        let cs = self.get_court(&court_id).ok_or(EngineError::NotFound(court_id))?;
        let guard = cs.read().await;
        Ok(guard.reservations_on(date).to_vec())
    }

    pub async fn payments_for(&self, reservation_id: Ulid) -> Result<Vec<Payment>, EngineError> {
        let court_id = self
            .get_court_for_entity(&reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?;
        let cs = self.get_court(&court_id).ok_or(EngineError::NotFound(court_id))?;
        let guard = cs.read().await;
        Ok(guard.payments_for(reservation_id).to_vec())
    }

    pub async fn get_court_info(&self, court_id: Ulid) -> Option<Court> {
        let cs = self.get_court(&court_id)?;
        let guard = cs.read().await;
        Some(guard.court.clone())
    }

    /// Confirmed reservations that ended by `now` without a check-in, as
    /// `(reservation_id, court_id)`. Courts locked for writing are skipped
    /// and picked up on the next pass.
    pub fn collect_no_shows(&self, now: NaiveDateTime) -> Vec<(Ulid, Ulid)> {
        let mut due = Vec::new();
        for entry in self.courts.iter() {
            let cs = entry.value().clone();
            if let Ok(guard) = cs.try_read() {
                for r in &guard.reservations {
                    if r.status == ReservationStatus::Confirmed
                        && r.checked_in_at.is_none()
                        && r.ends_at() < now
                    {
                        due.push((r.id(), guard.court.id));
                    }
                }
            }
        }
        due
    }
}
