use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, Weekday};
use futures::future::join_all;
use rust_decimal::Decimal;
use ulid::Ulid;

use courtside::config::EngineConfig;
use courtside::engine::{BookingRequest, Engine, EngineError};
use courtside::model::*;
use courtside::notify::EventHub;

// ── Test infrastructure ──────────────────────────────────────

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn booked_at() -> NaiveDateTime {
    at(monday() - Duration::days(3), hm(12, 0))
}

async fn start_engine() -> (Arc<Engine>, Ulid) {
    let engine = Arc::new(Engine::new(EngineConfig::default(), Arc::new(EventHub::new())));
    let court_id = Ulid::new();
    engine
        .register_court(Court {
            id: court_id,
            branch_id: Ulid::new(),
            name: Some("Center court".into()),
            status: CourtStatus::Active,
        })
        .await
        .unwrap();
    engine
        .add_window(WeeklyWindow {
            id: Ulid::new(),
            court_id,
            weekday: Weekday::Mon,
            hours: Slot::new(hm(6, 0), hm(22, 0)),
            slot_minutes: 30,
            min_advance_minutes: None,
            max_advance_days: None,
            available: true,
        })
        .await
        .unwrap();
    engine
        .add_rate_rule(RateRule {
            id: Ulid::new(),
            court_id,
            weekday: Weekday::Mon,
            hours: Slot::new(hm(6, 0), hm(22, 0)),
            price_per_hour: Decimal::from(120_000),
            kind: RateKind::Normal,
            min_minutes: 60,
            max_minutes: 180,
            active: true,
        })
        .await
        .unwrap();
    (engine, court_id)
}

// ── Check-then-reserve race ──────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_same_slot_commit_once() {
    let (engine, court_id) = start_engine().await;

    let attempts = (0..32).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let req = BookingRequest::new(Ulid::new(), court_id, monday(), hm(18, 0), hm(19, 0));
            engine.book(req, booked_at()).await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let winners: Vec<&Reservation> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let winner = winners[0].id();
    for r in &results {
        if let Err(e) = r {
            assert_eq!(
                *e,
                EngineError::ConflictDetected {
                    reservation_id: winner
                }
            );
        }
    }

    let stored = engine.reservations_on(court_id, monday()).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_requests_never_double_book() {
    let (engine, court_id) = start_engine().await;

    // Staggered one-hour requests every 15 minutes from 08:00 to 12:45.
    let attempts = (0..20u32).map(|i| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let start = hm(8, 0) + i * 15;
            let req = BookingRequest::new(Ulid::new(), court_id, monday(), start, start + 60);
            engine.book(req, booked_at()).await
        })
    });
    for r in join_all(attempts).await {
        let r = r.expect("task panicked");
        assert!(matches!(r, Ok(_) | Err(EngineError::ConflictDetected { .. })));
    }

    let stored = engine.reservations_on(court_id, monday()).await.unwrap();
    assert!(!stored.is_empty());
    for pair in stored.windows(2) {
        assert!(
            pair[0].slot.end <= pair[1].slot.start,
            "{} overlaps {}",
            pair[0].slot,
            pair[1].slot
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payments_and_cancel_stay_consistent() {
    let (engine, court_id) = start_engine().await;
    let mut req = BookingRequest::new(Ulid::new(), court_id, monday(), hm(18, 0), hm(19, 0));
    req.deposit = Some(Decimal::from(40_000));
    let r = engine.book(req, booked_at()).await.unwrap();
    let id = r.id();
    engine.confirm(id, booked_at(), None).await.unwrap();

    let payments = (0..12).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .post_payment(
                    Ulid::new(),
                    id,
                    Decimal::from(10_000),
                    LedgerStatus::Completed,
                    booked_at(),
                    None,
                )
                .await
        })
    });
    let cancel = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.cancel(id, "customer", None, booked_at()).await })
    };

    for p in join_all(payments).await {
        p.expect("task panicked").unwrap();
    }
    let outcome = cancel.await.expect("task panicked").unwrap();
    // Three days' notice: no fee.
    assert_eq!(outcome.fee, Decimal::ZERO);

    // Status is recomputed from the full ledger, whatever the interleaving.
    let stored = engine.get_reservation(id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Cancelled);
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert_eq!(engine.payments_for(id).await.unwrap().len(), 12);
}

// ── Duplicate ids queued behind the court lock ───────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_reservation_id_queued_behind_lock_commits_once() {
    let (engine, court_id) = start_engine().await;
    let id = Ulid::new();

    let court = engine.get_court(&court_id).unwrap();
    let held = court.write().await;
    let attempts: Vec<_> = [(hm(8, 0), hm(9, 0)), (hm(10, 0), hm(11, 0))]
        .into_iter()
        .map(|(start, end)| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let req = BookingRequest::new(id, court_id, monday(), start, end);
                engine.book(req, booked_at()).await
            })
        })
        .collect();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    drop(held);

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(EngineError::AlreadyExists(dup)) if *dup == id))
    );

    let stored = engine.reservations_on(court_id, monday()).await.unwrap();
    assert_eq!(stored.iter().filter(|r| r.id() == id).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retried_payment_id_is_counted_once() {
    let (engine, court_id) = start_engine().await;
    let r = engine
        .book(
            BookingRequest::new(Ulid::new(), court_id, monday(), hm(18, 0), hm(19, 0)),
            booked_at(),
        )
        .await
        .unwrap();
    let reservation_id = r.id();
    let payment_id = Ulid::new();

    let court = engine.get_court(&court_id).unwrap();
    let held = court.write().await;
    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .post_payment(
                        payment_id,
                        reservation_id,
                        Decimal::from(36_000),
                        LedgerStatus::Completed,
                        booked_at(),
                        None,
                    )
                    .await
            })
        })
        .collect();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    drop(held);

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();
    assert!(results.contains(&Ok(PaymentStatus::Deposit)));
    assert!(results.contains(&Err(EngineError::AlreadyExists(payment_id))));

    let entries = engine.payments_for(reservation_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    let stored = engine.get_reservation(reservation_id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Deposit);
}
