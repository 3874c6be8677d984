use chrono::Weekday;
use ulid::Ulid;

use crate::model::{Action, Guard, LedgerStatus, Minute, ReservationStatus, Unbookable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed input: empty slot, start in the past, bad amounts.
    Validation(&'static str),
    LimitExceeded(&'static str),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    NotBookable {
        court_id: Ulid,
        reason: Unbookable,
    },
    NoMatchingRateRule {
        court_id: Ulid,
        weekday: Weekday,
        start: Minute,
    },
    DurationOutOfBounds {
        rule_id: Ulid,
        minutes: u32,
        min: u32,
        max: u32,
    },
    ConflictDetected {
        reservation_id: Ulid,
    },
    InvalidStateTransition {
        reservation_id: Ulid,
        from: ReservationStatus,
        attempted: Action,
        guard: Guard,
    },
    InvalidPaymentTransition {
        payment_id: Ulid,
        from: LedgerStatus,
        to: LedgerStatus,
    },
}

impl EngineError {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::NotFound(_) => "not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::NotBookable { .. } => "not_bookable",
            EngineError::NoMatchingRateRule { .. } => "no_matching_rate_rule",
            EngineError::DurationOutOfBounds { .. } => "duration_out_of_bounds",
            EngineError::ConflictDetected { .. } => "conflict",
            EngineError::InvalidStateTransition { .. } => "invalid_state_transition",
            EngineError::InvalidPaymentTransition { .. } => "invalid_payment_transition",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::NotBookable { court_id, reason } => {
                write!(f, "court {court_id} not bookable: ")?;
                match reason {
                    Unbookable::CourtNotActive(status) => write!(f, "court is {status:?}"),
                    Unbookable::NoWindow(day) => write!(f, "no opening window on {day}"),
                    Unbookable::WindowUnavailable(id) => write!(f, "window {id} is closed"),
                    Unbookable::OutsideWindow(hours) => {
                        write!(f, "requested slot outside opening hours {hours}")
                    }
                    Unbookable::Blackout(id) => write!(f, "maintenance blackout {id}"),
                    Unbookable::TooSoon { min_advance_minutes } => {
                        write!(f, "must book at least {min_advance_minutes} minutes ahead")
                    }
                    Unbookable::TooFarAhead { max_advance_days } => {
                        write!(f, "cannot book more than {max_advance_days} days ahead")
                    }
                }
            }
            EngineError::NoMatchingRateRule {
                court_id,
                weekday,
                start,
            } => write!(
                f,
                "no active rate rule for court {court_id} on {weekday} at {:02}:{:02}",
                start / 60,
                start % 60
            ),
            EngineError::DurationOutOfBounds {
                rule_id,
                minutes,
                min,
                max,
            } => write!(
                f,
                "duration {minutes} min outside [{min}, {max}] allowed by rate rule {rule_id}"
            ),
            EngineError::ConflictDetected { reservation_id } => {
                write!(f, "conflict with reservation: {reservation_id}")
            }
            EngineError::InvalidStateTransition {
                reservation_id,
                from,
                attempted,
                guard,
            } => write!(
                f,
                "cannot {attempted:?} reservation {reservation_id} in state {}: {guard:?}",
                from.as_str()
            ),
            EngineError::InvalidPaymentTransition { payment_id, from, to } => {
                write!(f, "payment {payment_id} cannot move from {from:?} to {to:?}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
