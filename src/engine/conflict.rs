use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::limits::MINUTES_PER_DAY;
use crate::model::*;

use super::EngineError;

/// Reject malformed requests before any calendar or pricing lookup.
pub(crate) fn validate_request(
    date: NaiveDate,
    start: Minute,
    end: Minute,
    now: NaiveDateTime,
) -> Result<Slot, EngineError> {
    if start >= end {
        return Err(EngineError::Validation("start must be before end"));
    }
    if end > MINUTES_PER_DAY {
        return Err(EngineError::Validation("slot must end by midnight"));
    }
    if at(date, start) <= now {
        return Err(EngineError::Validation("slot starts in the past"));
    }
    Ok(Slot::new(start, end))
}

/// First pending/confirmed reservation on the same court and date whose slot
/// overlaps `slot`. Touching endpoints do not conflict.
pub fn find_conflict<'a>(
    court_id: Ulid,
    date: NaiveDate,
    slot: &Slot,
    existing: &'a [Reservation],
) -> Option<&'a Reservation> {
    existing.iter().find(|r| {
        r.court_id == court_id
            && r.date == date
            && r.status.is_blocking()
            && r.slot.overlaps(slot)
    })
}

pub fn has_conflict(court_id: Ulid, date: NaiveDate, slot: &Slot, existing: &[Reservation]) -> bool {
    find_conflict(court_id, date, slot, existing).is_some()
}

pub(crate) fn check_no_conflict(
    court_id: Ulid,
    date: NaiveDate,
    slot: &Slot,
    existing: &[Reservation],
) -> Result<(), EngineError> {
    match find_conflict(court_id, date, slot, existing) {
        Some(r) => Err(EngineError::ConflictDetected {
            reservation_id: r.id(),
        }),
        None => Ok(()),
    }
}
