use std::{fs, sync::Arc};

use hush::{
    audit::{
        ATTEMPT_STORE, AppendOutcome, AttemptRecord, AttemptStore, AuditLimits, AuditPersistence,
        AuditStore,
    },
    clock::{Clock, FixedClock},
    delivery::{DeliveryAttempt, DeliveryReason, DeliveryResult, TransportKind},
    registration::{REGISTRATION_STORE, RegistrationRequest, RegistrationStore, TokenKind},
};
use time::{Duration, macros::datetime};
use uuid::Uuid;

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(datetime!(2026-10-16 09:00:00 UTC)))
}

fn temp_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("hush-audit-test-{}", Uuid::now_v7()))
}

fn record(index: usize, clock: &FixedClock) -> AttemptRecord {
    record_with(index, clock, DeliveryResult::Skipped, DeliveryReason::CapReached)
}

fn record_with(
    index: usize,
    clock: &FixedClock,
    result: DeliveryResult,
    reason: DeliveryReason,
) -> AttemptRecord {
    AttemptRecord {
        attempt: DeliveryAttempt {
            attempt_id: format!("{index:032x}"),
            circle_id_hash: "circle".to_string(),
            period_key: "2026-10-16".to_string(),
            candidate_hash: format!("cand-{index}"),
            result,
            reason,
            transport_kind: TransportKind::Stub,
            status_hash: "0".repeat(32),
        },
        response_hash: None,
        recorded_at: clock.now(),
    }
}

#[test]
fn given_more_records_than_limit_when_appending_then_oldest_are_evicted() {
    let clock = clock();
    let store: AttemptStore =
        AuditStore::in_memory(ATTEMPT_STORE, AuditLimits::default(), clock.clone());

    for index in 0..210 {
        store.append(record(index, &clock)).expect("append");
    }

    assert_eq!(store.count(), 200);
    let remaining = store.snapshot();
    assert_eq!(remaining[0].attempt.candidate_hash, "cand-10");
    assert_eq!(remaining[199].attempt.candidate_hash, "cand-209");
}

#[test]
fn given_sent_attempts_when_log_overflows_then_only_retention_removes_them() {
    let clock = clock();
    let store: AttemptStore = AuditStore::in_memory(
        ATTEMPT_STORE,
        AuditLimits::new(10, Duration::days(30)),
        clock.clone(),
    );

    for index in 0..2 {
        store
            .append(record_with(
                index,
                &clock,
                DeliveryResult::Sent,
                DeliveryReason::Delivered,
            ))
            .expect("append");
    }
    for index in 2..40 {
        store.append(record(index, &clock)).expect("append");
    }

    assert_eq!(store.count(), 10);
    assert_eq!(store.sent_count("circle", "2026-10-16").expect("count"), 2);

    clock.advance(Duration::days(31));
    store.prune().expect("prune");
    assert_eq!(store.sent_count("circle", "2026-10-16").expect("count"), 0);
}

#[test]
fn given_same_record_twice_when_appending_then_second_is_duplicate() {
    let clock = clock();
    let store: AttemptStore =
        AuditStore::in_memory(ATTEMPT_STORE, AuditLimits::default(), clock.clone());

    let first = store.append(record(1, &clock)).expect("append");
    let second = store.append(record(1, &clock)).expect("append");

    assert_eq!(first, AppendOutcome::Appended { evicted: 0 });
    assert_eq!(second, AppendOutcome::Duplicate);
    assert_eq!(store.count(), 1);
}

#[test]
fn given_records_past_retention_when_pruned_then_only_fresh_records_remain() {
    let clock = clock();
    let store: AttemptStore = AuditStore::in_memory(
        ATTEMPT_STORE,
        AuditLimits::new(200, Duration::days(30)),
        clock.clone(),
    );

    store.append(record(1, &clock)).expect("append");
    clock.advance(Duration::days(20));
    store.append(record(2, &clock)).expect("append");
    clock.advance(Duration::days(15));

    let evicted = store.prune().expect("prune");

    assert_eq!(evicted, 1);
    let remaining = store.snapshot();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].attempt.candidate_hash, "cand-2");
}

#[test]
fn given_persistent_store_when_reopened_then_records_survive() {
    let dir = temp_dir();
    let clock = clock();

    {
        let store: AttemptStore = AuditStore::persistent(
            ATTEMPT_STORE,
            AuditLimits::default(),
            clock.clone(),
            AuditPersistence::in_dir(&dir, ATTEMPT_STORE),
        )
        .expect("store should open");
        store.append(record(1, &clock)).expect("append");
        store.append(record(2, &clock)).expect("append");
    }

    assert!(dir.join("attempts.json").exists());
    assert!(!dir.join("attempts.tmp").exists());

    let reopened: AttemptStore = AuditStore::persistent(
        ATTEMPT_STORE,
        AuditLimits::default(),
        clock.clone(),
        AuditPersistence::in_dir(&dir, ATTEMPT_STORE),
    )
    .expect("store should reopen");
    assert_eq!(reopened.count(), 2);
    assert_eq!(
        reopened.append(record(2, &clock)).expect("append"),
        AppendOutcome::Duplicate
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn given_expired_records_on_disk_when_reopened_then_they_are_dropped() {
    let dir = temp_dir();
    let clock = clock();
    let limits = AuditLimits::new(200, Duration::days(30));

    {
        let store: AttemptStore = AuditStore::persistent(
            ATTEMPT_STORE,
            limits,
            clock.clone(),
            AuditPersistence::in_dir(&dir, ATTEMPT_STORE),
        )
        .expect("store should open");
        store.append(record(1, &clock)).expect("append");
    }

    clock.advance(Duration::days(31));
    let reopened: AttemptStore = AuditStore::persistent(
        ATTEMPT_STORE,
        limits,
        clock.clone(),
        AuditPersistence::in_dir(&dir, ATTEMPT_STORE),
    )
    .expect("store should reopen");
    assert_eq!(reopened.count(), 0);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn given_persisted_registration_when_reopened_then_active_device_is_found() {
    let dir = temp_dir();
    let clock = clock();

    {
        let store = RegistrationStore::persistent(
            AuditLimits::default(),
            clock.clone(),
            AuditPersistence::in_dir(&dir, REGISTRATION_STORE),
        )
        .expect("store should open");
        store
            .register(RegistrationRequest {
                circle_id_hash: "circle".to_string(),
                device_fingerprint_hash: "device-1".to_string(),
                provider_kind: TransportKind::Webhook,
                token_kind: TokenKind::Device,
                token_hash: "7".repeat(64),
            })
            .expect("register");
    }

    let reopened = RegistrationStore::persistent(
        AuditLimits::default(),
        clock.clone(),
        AuditPersistence::in_dir(&dir, REGISTRATION_STORE),
    )
    .expect("store should reopen");
    let active = reopened.active_for("circle").expect("registration is active");
    assert_eq!(active.provider_kind, TransportKind::Webhook);
    assert_eq!(active.token_hash, "7".repeat(64));

    let _ = fs::remove_dir_all(&dir);
}
