use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// Round to cents, half-up.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Pick the active rule for `court_id` on `date`'s weekday whose hours contain
/// `start`. When several match, the narrowest window wins; equal widths keep
/// the earlier rule.
pub fn select_rule(rules: &[RateRule], court_id: Ulid, date: NaiveDate, start: Minute) -> Option<&RateRule> {
    let weekday = date.weekday();
    rules
        .iter()
        .filter(|r| {
            r.active && r.court_id == court_id && r.weekday == weekday && r.hours.contains_minute(start)
        })
        .min_by_key(|r| r.hours.minutes())
}

pub fn quote(rules: &[RateRule], court_id: Ulid, date: NaiveDate, slot: &Slot) -> Result<PriceQuote, EngineError> {
    if slot.start >= slot.end {
        return Err(EngineError::Validation("start must be before end"));
    }
    let rule = select_rule(rules, court_id, date, slot.start).ok_or(EngineError::NoMatchingRateRule {
        court_id,
        weekday: date.weekday(),
        start: slot.start,
    })?;

    let minutes = slot.minutes();
    if minutes < rule.min_minutes || minutes > rule.max_minutes {
        return Err(EngineError::DurationOutOfBounds {
            rule_id: rule.id,
            minutes,
            min: rule.min_minutes,
            max: rule.max_minutes,
        });
    }

    let amount = round_money(rule.price_per_hour * Decimal::from(minutes) / Decimal::from(60));
    Ok(PriceQuote {
        rule_id: rule.id,
        kind: rule.kind,
        minutes,
        amount,
    })
}

pub fn price(rules: &[RateRule], court_id: Ulid, date: NaiveDate, slot: &Slot) -> Result<Money, EngineError> {
    quote(rules, court_id, date, slot).map(|q| q.amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn rule(court_id: Ulid, start: Minute, end: Minute, per_hour: i64, kind: RateKind) -> RateRule {
        RateRule {
            id: Ulid::new(),
            court_id,
            weekday: Weekday::Mon,
            hours: Slot::new(start, end),
            price_per_hour: Decimal::from(per_hour),
            kind,
            min_minutes: 60,
            max_minutes: 180,
            active: true,
        }
    }

    #[test]
    fn evening_peak_scenario() {
        let court = Ulid::new();
        let rules = vec![rule(court, hm(18, 0), hm(22, 0), 200_000, RateKind::Peak)];

        let q = quote(&rules, court, monday(), &Slot::new(hm(18, 0), hm(19, 30))).unwrap();
        assert_eq!(q.amount, Decimal::from(300_000));
        assert_eq!(q.minutes, 90);
        assert_eq!(q.kind, RateKind::Peak);
        assert_eq!(q.rule_id, rules[0].id);

        let seventy = price(&rules, court, monday(), &Slot::new(hm(18, 0), hm(19, 10))).unwrap();
        assert_eq!(seventy, Decimal::new(23_333_333, 2));

        let err = price(&rules, court, monday(), &Slot::new(hm(18, 0), hm(18, 50))).unwrap_err();
        assert_eq!(
            err,
            EngineError::DurationOutOfBounds {
                rule_id: rules[0].id,
                minutes: 50,
                min: 60,
                max: 180,
            }
        );
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        let court = Ulid::new();
        let rules = vec![rule(court, hm(6, 0), hm(22, 0), 100_000, RateKind::Normal)];
        assert!(price(&rules, court, monday(), &Slot::new(hm(8, 0), hm(9, 0))).is_ok());
        assert!(price(&rules, court, monday(), &Slot::new(hm(8, 0), hm(11, 0))).is_ok());
        assert!(matches!(
            price(&rules, court, monday(), &Slot::new(hm(8, 0), hm(11, 1))),
            Err(EngineError::DurationOutOfBounds { minutes: 181, .. })
        ));
    }

    #[test]
    fn rule_is_chosen_by_start_time_only() {
        // Rule covers 18:00-22:00; a slot starting inside it may run past its end.
        let court = Ulid::new();
        let rules = vec![rule(court, hm(18, 0), hm(22, 0), 200_000, RateKind::Peak)];
        assert!(price(&rules, court, monday(), &Slot::new(hm(21, 0), hm(22, 30))).is_ok());
        // Rule end is exclusive.
        assert!(matches!(
            price(&rules, court, monday(), &Slot::new(hm(22, 0), hm(23, 0))),
            Err(EngineError::NoMatchingRateRule { weekday: Weekday::Mon, start: 1320, .. })
        ));
    }

    #[test]
    fn narrowest_overlapping_rule_wins() {
        let court = Ulid::new();
        let all_day = rule(court, hm(6, 0), hm(22, 0), 100_000, RateKind::Normal);
        let happy_hour = rule(court, hm(14, 0), hm(16, 0), 60_000, RateKind::Discount);
        let rules = vec![all_day, happy_hour.clone()];
        let q = quote(&rules, court, monday(), &Slot::new(hm(14, 0), hm(15, 0))).unwrap();
        assert_eq!(q.rule_id, happy_hour.id);
        assert_eq!(q.amount, Decimal::from(60_000));
        assert_eq!(q.kind, RateKind::Discount);

        let q = quote(&rules, court, monday(), &Slot::new(hm(16, 0), hm(17, 0))).unwrap();
        assert_eq!(q.amount, Decimal::from(100_000));
    }

    #[test]
    fn equal_width_ties_keep_first_rule() {
        let court = Ulid::new();
        let a = rule(court, hm(8, 0), hm(10, 0), 1_000, RateKind::Normal);
        let b = rule(court, hm(9, 0), hm(11, 0), 2_000, RateKind::Normal);
        let rules = vec![a.clone(), b];
        let q = quote(&rules, court, monday(), &Slot::new(hm(9, 0), hm(10, 0))).unwrap();
        assert_eq!(q.rule_id, a.id);
    }

    #[test]
    fn inactive_other_day_and_other_court_rules_ignored() {
        let court = Ulid::new();
        let mut inactive = rule(court, hm(6, 0), hm(22, 0), 100_000, RateKind::Normal);
        inactive.active = false;
        let mut tuesday = rule(court, hm(6, 0), hm(22, 0), 100_000, RateKind::Normal);
        tuesday.weekday = Weekday::Tue;
        let other_court = rule(Ulid::new(), hm(6, 0), hm(22, 0), 100_000, RateKind::Normal);
        let rules = vec![inactive, tuesday, other_court];
        assert!(matches!(
            price(&rules, court, monday(), &Slot::new(hm(8, 0), hm(9, 0))),
            Err(EngineError::NoMatchingRateRule { .. })
        ));
    }

    #[test]
    fn pricing_is_deterministic() {
        let court = Ulid::new();
        let rules = vec![
            rule(court, hm(6, 0), hm(22, 0), 123_457, RateKind::Normal),
            rule(court, hm(7, 0), hm(9, 0), 99_999, RateKind::Discount),
        ];
        let slot = Slot::new(hm(7, 0), hm(8, 10));
        let first = price(&rules, court, monday(), &slot).unwrap();
        for _ in 0..10 {
            assert_eq!(price(&rules, court, monday(), &slot).unwrap(), first);
        }
    }

    #[test]
    fn rounds_half_up_to_cents() {
        assert_eq!(round_money(Decimal::new(1_005, 3)), Decimal::new(101, 2));
        assert_eq!(round_money(Decimal::new(1_004, 3)), Decimal::new(100, 2));
        // 10/hr for 61 minutes = 10.1666.. -> 10.17
        let court = Ulid::new();
        let rules = vec![rule(court, hm(6, 0), hm(22, 0), 10, RateKind::Normal)];
        assert_eq!(
            price(&rules, court, monday(), &Slot::new(hm(8, 0), hm(9, 1))).unwrap(),
            Decimal::new(1017, 2)
        );
    }

    #[test]
    fn inverted_slot_is_a_validation_error() {
        let court = Ulid::new();
        let rules = vec![rule(court, hm(6, 0), hm(22, 0), 100_000, RateKind::Normal)];
        for slot in [
            Slot { start: hm(19, 0), end: hm(18, 0) },
            Slot { start: hm(18, 0), end: hm(18, 0) },
        ] {
            assert_eq!(
                price(&rules, court, monday(), &slot).unwrap_err(),
                EngineError::Validation("start must be before end")
            );
        }
    }
}
