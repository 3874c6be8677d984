use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since local midnight. The only time-of-day type; `1440` is end of day.
pub type Minute = u32;

pub type Money = Decimal;

pub const fn hm(hour: u32, minute: u32) -> Minute {
    hour * 60 + minute
}

/// Facility-local instant for `minute` on `date`.
pub fn at(date: NaiveDate, minute: Minute) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::minutes(minute as i64)
}

/// Half-open interval `[start, end)` on a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start: Minute,
    pub end: Minute,
}

impl Slot {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "Slot start must be before end");
        Self { start, end }
    }

    pub fn minutes(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_minute(&self, t: Minute) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_slot(&self, other: &Slot) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:02}:{:02}, {:02}:{:02})",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

/// Identity and audit fields shared by every stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub id: Ulid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl RecordMeta {
    pub fn new(id: Ulid, at: NaiveDateTime, actor: Option<String>) -> Self {
        Self {
            id,
            created_at: at,
            updated_at: at,
            created_by: actor.clone(),
            updated_by: actor,
        }
    }

    pub fn touch(&mut self, at: NaiveDateTime, actor: Option<&str>) {
        self.updated_at = at;
        if let Some(a) = actor {
            self.updated_by = Some(a.to_string());
        }
    }
}

// ── Facility ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourtStatus {
    Active,
    Inactive,
    UnderMaintenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: Ulid,
    pub branch_id: Ulid,
    pub name: Option<String>,
    pub status: CourtStatus,
}

impl Court {
    pub fn is_active(&self) -> bool {
        self.status == CourtStatus::Active
    }
}

/// Weekly opening window for one court on one day of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyWindow {
    pub id: Ulid,
    pub court_id: Ulid,
    pub weekday: Weekday,
    /// Opening hours as `[open, close)`.
    pub hours: Slot,
    pub slot_minutes: u32,
    /// Bookings must be made at least this long before they start.
    pub min_advance_minutes: Option<u32>,
    /// Bookings may be made at most this many days ahead.
    pub max_advance_days: Option<u32>,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MaintenanceStatus {
    pub fn blocks_bookings(&self) -> bool {
        matches!(self, MaintenanceStatus::Scheduled | MaintenanceStatus::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceBlackout {
    pub id: Ulid,
    pub court_id: Ulid,
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    pub status: MaintenanceStatus,
    pub reason: Option<String>,
}

impl MaintenanceBlackout {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateKind {
    Normal,
    Peak,
    Discount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRule {
    pub id: Ulid,
    pub court_id: Ulid,
    pub weekday: Weekday,
    pub hours: Slot,
    pub price_per_hour: Money,
    pub kind: RateKind,
    pub min_minutes: u32,
    pub max_minutes: u32,
    pub active: bool,
}

// ── Reservations & payments ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    /// Only pending and confirmed reservations occupy the court.
    pub fn is_blocking(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_blocking()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::NoShow => "NO_SHOW",
        }
    }
}

/// Derived payment state of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Deposit,
    Partial,
    Paid,
}

/// Status of a single payment ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub actor: String,
    pub reason: Option<String>,
    pub cancelled_at: NaiveDateTime,
    pub fee: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub meta: RecordMeta,
    pub court_id: Ulid,
    pub date: NaiveDate,
    pub slot: Slot,
    pub customer: Option<String>,
    pub status: ReservationStatus,
    pub total_amount: Money,
    pub deposit_amount: Money,
    pub discount_amount: Money,
    pub promotion_discount: Money,
    pub final_amount: Money,
    pub payment_status: PaymentStatus,
    pub cancellation: Option<Cancellation>,
    pub checked_in_at: Option<NaiveDateTime>,
    pub checked_out_at: Option<NaiveDateTime>,
}

impl Reservation {
    pub fn id(&self) -> Ulid {
        self.meta.id
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        at(self.date, self.slot.start)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        at(self.date, self.slot.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub meta: RecordMeta,
    pub reservation_id: Ulid,
    pub amount: Money,
    pub status: LedgerStatus,
}

// ── Transition vocabulary ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Confirm,
    CheckIn,
    CheckOut,
    Cancel,
    MarkNoShow,
}

/// Which guard rejected a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    WrongState,
    AlreadyCheckedIn,
    NotCheckedIn,
    AlreadyCheckedOut,
    OutsideCheckInWindow,
    AlreadyStarted,
    NotYetEnded,
}

/// Why a slot cannot be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unbookable {
    CourtNotActive(CourtStatus),
    NoWindow(Weekday),
    WindowUnavailable(Ulid),
    OutsideWindow(Slot),
    Blackout(Ulid),
    TooSoon { min_advance_minutes: u32 },
    TooFarAhead { max_advance_days: u32 },
}

/// Priced slot, before any discount is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub rule_id: Ulid,
    pub kind: RateKind,
    pub minutes: u32,
    pub amount: Money,
}

// ── Per-court state ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CourtState {
    pub court: Court,
    pub windows: Vec<WeeklyWindow>,
    pub blackouts: Vec<MaintenanceBlackout>,
    pub rules: Vec<RateRule>,
    /// Sorted by `(date, slot.start)`.
    pub reservations: Vec<Reservation>,
    /// Ledger entries keyed by reservation id.
    pub payments: HashMap<Ulid, Vec<Payment>>,
}

impl CourtState {
    pub fn new(court: Court) -> Self {
        Self {
            court,
            windows: Vec::new(),
            blackouts: Vec::new(),
            rules: Vec::new(),
            reservations: Vec::new(),
            payments: HashMap::new(),
        }
    }

    /// Insert reservation maintaining sort order by `(date, slot.start)`.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let key = (reservation.date, reservation.slot.start);
        let pos = self
            .reservations
            .partition_point(|r| (r.date, r.slot.start) <= key);
        self.reservations.insert(pos, reservation);
    }

    /// All reservations (any status) on `date`.
    pub fn reservations_on(&self, date: NaiveDate) -> &[Reservation] {
        let lo = self.reservations.partition_point(|r| r.date < date);
        let hi = self.reservations.partition_point(|r| r.date <= date);
        &self.reservations[lo..hi]
    }

    pub fn reservation(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.meta.id == id)
    }

    pub fn reservation_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.meta.id == id)
    }

    pub fn payments_for(&self, reservation_id: Ulid) -> &[Payment] {
        self.payments
            .get(&reservation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Domain events emitted after each committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CourtStatusChanged {
        court_id: Ulid,
        status: CourtStatus,
    },
    ReservationCreated {
        id: Ulid,
        court_id: Ulid,
        date: NaiveDate,
        slot: Slot,
        final_amount: Money,
    },
    ReservationConfirmed {
        id: Ulid,
        court_id: Ulid,
    },
    CheckedIn {
        id: Ulid,
        court_id: Ulid,
        at: NaiveDateTime,
    },
    CheckedOut {
        id: Ulid,
        court_id: Ulid,
        at: NaiveDateTime,
    },
    ReservationCancelled {
        id: Ulid,
        court_id: Ulid,
        fee: Money,
    },
    NoShowMarked {
        id: Ulid,
        court_id: Ulid,
    },
    PaymentRecorded {
        id: Ulid,
        reservation_id: Ulid,
        court_id: Ulid,
        amount: Money,
        status: LedgerStatus,
    },
    PaymentStatusChanged {
        reservation_id: Ulid,
        court_id: Ulid,
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

impl Event {
    pub fn court_id(&self) -> Ulid {
        match self {
            Event::CourtStatusChanged { court_id, .. }
            | Event::ReservationCreated { court_id, .. }
            | Event::ReservationConfirmed { court_id, .. }
            | Event::CheckedIn { court_id, .. }
            | Event::CheckedOut { court_id, .. }
            | Event::ReservationCancelled { court_id, .. }
            | Event::NoShowMarked { court_id, .. }
            | Event::PaymentRecorded { court_id, .. }
            | Event::PaymentStatusChanged { court_id, .. } => *court_id,
        }
    }
}
