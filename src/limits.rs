/// Minutes in a day; `Slot` ends may equal this to mean midnight.
pub const MINUTES_PER_DAY: u32 = 1440;

pub const MAX_COURTS: usize = 10_000;
pub const MAX_WINDOWS_PER_COURT: usize = 7 * 24;
pub const MAX_BLACKOUTS_PER_COURT: usize = 1_000;
pub const MAX_RATE_RULES_PER_COURT: usize = 1_000;
pub const MAX_RESERVATIONS_PER_COURT: usize = 100_000;
pub const MAX_PAYMENTS_PER_RESERVATION: usize = 64;

pub const MAX_TEXT_LEN: usize = 512;

/// Longest blackout accepted, in days.
pub const MAX_BLACKOUT_DAYS: i64 = 366;

pub const MAX_SLOT_GRANULARITY_MINUTES: u32 = 240;
