use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::model::*;

// ── Bookability ──────────────────────────────────────────────────

/// First blocking blackout on the court covering `date`, if any.
pub fn blackout_on<'a>(
    blackouts: &'a [MaintenanceBlackout],
    court_id: ulid::Ulid,
    date: NaiveDate,
) -> Option<&'a MaintenanceBlackout> {
    blackouts
        .iter()
        .find(|b| b.court_id == court_id && b.status.blocks_bookings() && b.covers(date))
}

/// Check that `slot` on `date` lies inside an open weekly window of an active,
/// non-blacked-out court. Returns the window that admits the slot.
///
/// The slot must be fully contained in one window; partial overlap is rejected.
pub fn check_open<'a>(
    court: &Court,
    windows: &'a [WeeklyWindow],
    blackouts: &[MaintenanceBlackout],
    date: NaiveDate,
    slot: &Slot,
) -> Result<&'a WeeklyWindow, Unbookable> {
    if !court.is_active() {
        return Err(Unbookable::CourtNotActive(court.status));
    }

    let weekday = date.weekday();
    let mut candidates = windows
        .iter()
        .filter(|w| w.court_id == court.id && w.weekday == weekday)
        .peekable();
    let first = match candidates.peek() {
        Some(w) => *w,
        None => return Err(Unbookable::NoWindow(weekday)),
    };

    let mut any_available: Option<&WeeklyWindow> = None;
    let mut admitting: Option<&WeeklyWindow> = None;
    for w in candidates {
        if !w.available {
            continue;
        }
        if any_available.is_none() {
            any_available = Some(w);
        }
        if w.hours.contains_slot(slot) {
            admitting = Some(w);
            break;
        }
    }

    let window = match (admitting, any_available) {
        (Some(w), _) => w,
        (None, Some(w)) => return Err(Unbookable::OutsideWindow(w.hours)),
        (None, None) => return Err(Unbookable::WindowUnavailable(first.id)),
    };

    if let Some(b) = blackout_on(blackouts, court.id, date) {
        return Err(Unbookable::Blackout(b.id));
    }

    Ok(window)
}

pub fn is_open(
    court: &Court,
    windows: &[WeeklyWindow],
    blackouts: &[MaintenanceBlackout],
    date: NaiveDate,
    slot: &Slot,
) -> bool {
    check_open(court, windows, blackouts, date, slot).is_ok()
}

/// Enforce the window's advance-booking rules relative to `now`.
pub fn check_advance(
    window: &WeeklyWindow,
    date: NaiveDate,
    slot: &Slot,
    now: NaiveDateTime,
) -> Result<(), Unbookable> {
    if let Some(min) = window.min_advance_minutes {
        let lead = at(date, slot.start) - now;
        if lead < Duration::minutes(min as i64) {
            return Err(Unbookable::TooSoon {
                min_advance_minutes: min,
            });
        }
    }
    if let Some(max) = window.max_advance_days
        && date > now.date() + Duration::days(max as i64)
    {
        return Err(Unbookable::TooFarAhead {
            max_advance_days: max,
        });
    }
    Ok(())
}

// ── Free intervals ───────────────────────────────────────────────

/// Free intervals on `date`: open windows minus blocking reservations.
///
/// Returns nothing for an inactive or blacked-out court. Windows are not
/// merged with each other, so every returned interval is bookable as a whole.
pub fn open_slots(
    court: &Court,
    windows: &[WeeklyWindow],
    blackouts: &[MaintenanceBlackout],
    reservations: &[Reservation],
    date: NaiveDate,
    min_minutes: Option<u32>,
) -> Vec<Slot> {
    if !court.is_active() || blackout_on(blackouts, court.id, date).is_some() {
        return Vec::new();
    }

    let weekday = date.weekday();
    let mut open: Vec<Slot> = windows
        .iter()
        .filter(|w| w.court_id == court.id && w.weekday == weekday && w.available)
        .map(|w| w.hours)
        .collect();
    open.sort_by_key(|s| s.start);

    let mut busy: Vec<Slot> = reservations
        .iter()
        .filter(|r| r.court_id == court.id && r.date == date && r.status.is_blocking())
        .map(|r| r.slot)
        .collect();
    busy.sort_by_key(|s| s.start);
    let busy = merge_overlapping(&busy);

    let mut free = subtract_slots(&open, &busy);
    if let Some(min) = min_minutes {
        free.retain(|s| s.minutes() >= min);
    }
    free
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Slot]) -> Vec<Slot> {
    let mut merged: Vec<Slot> = Vec::new();
    for &slot in sorted {
        if let Some(last) = merged.last_mut()
            && slot.start <= last.end
        {
            last.end = last.end.max(slot.end);
            continue;
        }
        merged.push(slot);
    }
    merged
}

/// Remove sorted, disjoint `to_remove` from sorted, disjoint `base`.
pub fn subtract_slots(base: &[Slot], to_remove: &[Slot]) -> Vec<Slot> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Slot::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Slot::new(current_start, current_end));
        }
    }

    result
}
