use std::{collections::BTreeSet, fs, sync::Arc};

use hush::{
    audit::{
        ATTEMPT_STORE, AttemptStore, AuditLimits, AuditPersistence, AuditStore, RECEIPT_STORE,
    },
    clock::{Clock, FixedClock, day_period_key},
    delivery::{
        DeliveryCandidate, DeliveryPorts, DeliveryReason, DeliveryRequest, DeliveryResult,
        DeliveryRunInput, DeliveryService, TransportKind, attempt_id, compute_delivery_run,
        noop::{AllowAllRateLimit, StaticCandidateSource, StaticPolicySource, StaticTrustSource},
        types::PolicySnapshot,
    },
    escalation::{EscalationCap, ResolutionStatus, UrgencyLevel},
    registration::{RegistrationRequest, RegistrationStore, TokenKind},
    transport::{FailureBucket, StubTransport, Transport},
};
use time::macros::datetime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const CIRCLE: &str = "circle-a";

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(datetime!(2026-10-16 07:30:00 UTC)))
}

fn candidate(hash: &str) -> DeliveryCandidate {
    DeliveryCandidate {
        candidate_hash: hash.to_string(),
        resolution_level: UrgencyLevel::High,
        resolution_cap: EscalationCap::InterruptCandidateOnly,
        resolution_status: ResolutionStatus::Ok,
    }
}

struct Harness {
    service: DeliveryService,
    registrations: Arc<RegistrationStore>,
    attempts: Arc<AttemptStore>,
    period_key: String,
}

fn harness(
    transport: Arc<dyn Transport>,
    provider_kind: TransportKind,
    candidates: &[&str],
) -> Harness {
    let clock = clock();
    let attempts = Arc::new(AuditStore::in_memory(
        ATTEMPT_STORE,
        AuditLimits::default(),
        clock.clone(),
    ));
    harness_with(transport, provider_kind, candidates, clock, attempts)
}

fn harness_with(
    transport: Arc<dyn Transport>,
    provider_kind: TransportKind,
    candidates: &[&str],
    clock: Arc<FixedClock>,
    attempts: Arc<AttemptStore>,
) -> Harness {
    let registrations = Arc::new(RegistrationStore::in_memory(
        AuditLimits::default(),
        clock.clone(),
    ));
    registrations
        .register(RegistrationRequest {
            circle_id_hash: CIRCLE.to_string(),
            device_fingerprint_hash: "device-1".to_string(),
            provider_kind,
            token_kind: TokenKind::Device,
            token_hash: "7".repeat(64),
        })
        .expect("registration should succeed");

    let receipts = Arc::new(AuditStore::in_memory(
        RECEIPT_STORE,
        AuditLimits::default(),
        clock.clone(),
    ));

    let service = DeliveryService::new(
        DeliveryPorts {
            candidates: Arc::new(StaticCandidateSource::new(
                candidates.iter().map(|hash| candidate(hash)),
            )),
            policy: Arc::new(StaticPolicySource::new(PolicySnapshot::default())),
            devices: registrations.clone(),
            rate_limit: Arc::new(AllowAllRateLimit),
            trust: Arc::new(StaticTrustSource::established()),
        },
        transport,
        attempts.clone(),
        receipts,
        clock.clone(),
        2,
    );

    Harness {
        service,
        registrations,
        attempts,
        period_key: day_period_key(clock.now()),
    }
}

fn request(harness: &Harness, candidates: &[&str]) -> DeliveryRequest {
    DeliveryRequest {
        circle_id_hash: CIRCLE.to_string(),
        period_key: harness.period_key.clone(),
        candidate_hashes: candidates.iter().map(|hash| hash.to_string()).collect(),
    }
}

#[tokio::test]
async fn given_same_candidate_delivered_twice_when_second_run_then_deduped_with_same_attempt_id() {
    let transport = Arc::new(StubTransport::new());
    let harness = harness(transport.clone(), TransportKind::Stub, &["cand-1"]);
    let cancel = CancellationToken::new();

    let first = harness
        .service
        .deliver(&cancel, &request(&harness, &["cand-1"]))
        .await
        .expect("first run");
    let second = harness
        .service
        .deliver(&cancel, &request(&harness, &["cand-1"]))
        .await
        .expect("second run");

    assert_eq!(first.attempts[0].result, DeliveryResult::Sent);
    assert_eq!(second.attempts[0].result, DeliveryResult::Deduped);
    assert_eq!(second.attempts[0].reason, DeliveryReason::AlreadySent);
    assert_eq!(first.attempts[0].attempt_id, second.attempts[0].attempt_id);
    assert_eq!(
        first.attempts[0].attempt_id,
        attempt_id(CIRCLE, "cand-1", &harness.period_key)
    );
    assert_eq!(transport.calls(), 1);
    assert_eq!(harness.attempts.count(), 2);
}

#[test]
fn given_sent_today_at_max_when_run_computed_then_nothing_is_sent() {
    let mut input = DeliveryRunInput::new(
        CIRCLE,
        "2026-10-16",
        vec![candidate("a"), candidate("b"), candidate("c")],
    );
    input.max_per_day = 2;
    input.sent_today = 2;

    let run = compute_delivery_run(&input);

    assert_eq!(run.sent().count(), 0);
    assert!(
        run.attempts
            .iter()
            .all(|attempt| attempt.reason == DeliveryReason::CapReached)
    );
}

#[tokio::test]
async fn given_daily_quota_when_three_candidates_delivered_then_two_sent_and_third_capped() {
    let transport = Arc::new(StubTransport::new());
    let candidates = ["cand-c", "cand-a", "cand-b"];
    let harness = harness(transport.clone(), TransportKind::Stub, &candidates);

    let run = harness
        .service
        .deliver(&CancellationToken::new(), &request(&harness, &candidates))
        .await
        .expect("run");

    let outcomes = run
        .attempts
        .iter()
        .map(|attempt| (attempt.candidate_hash.as_str(), attempt.result))
        .collect::<Vec<_>>();
    assert_eq!(
        outcomes,
        vec![
            ("cand-a", DeliveryResult::Sent),
            ("cand-b", DeliveryResult::Sent),
            ("cand-c", DeliveryResult::Skipped),
        ]
    );
    assert_eq!(run.receipt.sent, 2);
    assert_eq!(transport.calls(), 2);
    assert_eq!(
        harness
            .attempts
            .sent_count(CIRCLE, &harness.period_key)
            .expect("sent count"),
        2
    );
}

#[tokio::test]
async fn given_transport_error_when_delivering_then_attempt_skipped_with_response_hash() {
    let transport = Arc::new(StubTransport::failing(FailureBucket::TransportError));
    let harness = harness(transport.clone(), TransportKind::Stub, &["cand-1"]);

    let run = harness
        .service
        .deliver(&CancellationToken::new(), &request(&harness, &["cand-1"]))
        .await
        .expect("run");

    assert_eq!(run.attempts[0].result, DeliveryResult::Skipped);
    assert_eq!(run.attempts[0].reason, DeliveryReason::TransportError);
    assert_eq!(run.receipt.sent, 0);
    assert_eq!(transport.calls(), 1);

    let records = harness.attempts.snapshot();
    assert_eq!(records.len(), 1);
    assert!(records[0].response_hash.is_some());
    assert_eq!(
        harness
            .attempts
            .sent_count(CIRCLE, &harness.period_key)
            .expect("sent count"),
        0
    );
}

#[tokio::test]
async fn given_gone_token_when_delivering_then_registration_disabled_and_rest_skipped() {
    let transport = Arc::new(StubTransport::failing(FailureBucket::NotConfigured));
    let harness = harness(transport.clone(), TransportKind::Stub, &["cand-1", "cand-2"]);

    let run = harness
        .service
        .deliver(
            &CancellationToken::new(),
            &request(&harness, &["cand-1", "cand-2"]),
        )
        .await
        .expect("run");

    assert_eq!(transport.calls(), 1);
    assert!(
        run.attempts
            .iter()
            .all(|attempt| attempt.reason == DeliveryReason::NotConfigured)
    );
    assert!(harness.registrations.active_for(CIRCLE).is_none());
}

#[tokio::test]
async fn given_registration_for_other_provider_when_delivering_then_push_not_enabled() {
    let transport = Arc::new(StubTransport::new());
    let harness = harness(transport.clone(), TransportKind::Apns, &["cand-1"]);

    let run = harness
        .service
        .deliver(&CancellationToken::new(), &request(&harness, &["cand-1"]))
        .await
        .expect("run");

    assert_eq!(run.attempts[0].reason, DeliveryReason::PushNotEnabled);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn given_unknown_candidate_hash_when_delivering_then_it_is_not_attempted() {
    let transport = Arc::new(StubTransport::new());
    let harness = harness(transport.clone(), TransportKind::Stub, &["cand-1"]);

    let run = harness
        .service
        .deliver(
            &CancellationToken::new(),
            &request(&harness, &["cand-1", "cand-missing"]),
        )
        .await
        .expect("run");

    assert_eq!(run.attempts.len(), 1);
    assert_eq!(run.receipt.attempt_ids.len(), 1);
}

#[test]
fn given_surface_only_candidate_when_run_computed_then_policy_disallowed() {
    let mut surfaced = candidate("a");
    surfaced.resolution_cap = EscalationCap::SurfaceOnly;
    let run = compute_delivery_run(&DeliveryRunInput::new(CIRCLE, "2026-10-16", vec![surfaced]));

    assert_eq!(run.attempts[0].reason, DeliveryReason::PolicyDisallowed);
}

#[test]
fn given_fragile_trust_when_run_computed_then_trust_fragile_skips() {
    let mut input = DeliveryRunInput::new(CIRCLE, "2026-10-16", vec![candidate("a")]);
    input.trust_fragile = true;

    let run = compute_delivery_run(&input);

    assert_eq!(run.attempts[0].result, DeliveryResult::Skipped);
    assert_eq!(run.attempts[0].reason, DeliveryReason::TrustFragile);
}

#[tokio::test]
async fn given_large_run_filling_the_attempt_log_when_next_run_delivers_then_daily_cap_holds() {
    let transport = Arc::new(StubTransport::new());
    let mut first_run = vec!["00a".to_string(), "00b".to_string()];
    first_run.extend((0..250).map(|index| format!("filler-{index:03}")));
    let second_run = ["01a".to_string(), "01b".to_string()];
    let all = first_run
        .iter()
        .chain(second_run.iter())
        .map(String::as_str)
        .collect::<Vec<_>>();
    let harness = harness(transport.clone(), TransportKind::Stub, &all);
    let cancel = CancellationToken::new();

    let first = harness
        .service
        .deliver(
            &cancel,
            &request(&harness, &first_run.iter().map(String::as_str).collect::<Vec<_>>()),
        )
        .await
        .expect("first run");
    assert_eq!(first.receipt.sent, 2);
    assert_eq!(first.receipt.skipped, 250);
    assert_eq!(
        harness
            .attempts
            .sent_count(CIRCLE, &harness.period_key)
            .expect("sent count"),
        2
    );

    let second = harness
        .service
        .deliver(&cancel, &request(&harness, &["01a", "01b"]))
        .await
        .expect("second run");

    assert_eq!(second.receipt.sent, 0);
    assert!(
        second
            .attempts
            .iter()
            .all(|attempt| attempt.reason == DeliveryReason::CapReached)
    );
    assert_eq!(transport.calls(), 2);

    let replay = harness
        .service
        .deliver(&cancel, &request(&harness, &["00a"]))
        .await
        .expect("replay");
    assert_eq!(replay.attempts[0].result, DeliveryResult::Deduped);
}

#[tokio::test]
async fn given_unreadable_attempt_store_when_delivering_then_run_aborts_without_sending() {
    let transport = Arc::new(StubTransport::new());
    let harness = harness(transport.clone(), TransportKind::Stub, &["cand-1"]);
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = harness.attempts.read(|_| -> () { panic!("reader panicked") });
    }));

    let result = harness
        .service
        .deliver(&CancellationToken::new(), &request(&harness, &["cand-1"]))
        .await;

    assert!(result.is_err());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn given_attempt_store_failing_to_flush_when_delivering_then_sending_stops() {
    let dir = std::env::temp_dir().join(format!("hush-delivery-test-{}", Uuid::now_v7()));
    let clock = clock();
    let attempts = Arc::new(
        AuditStore::persistent(
            ATTEMPT_STORE,
            AuditLimits::default(),
            clock.clone(),
            AuditPersistence::in_dir(&dir, ATTEMPT_STORE),
        )
        .expect("attempt store should open"),
    );
    // A plain file where the state directory should be makes every flush fail.
    fs::write(&dir, b"not a directory").expect("blocking file");

    let transport = Arc::new(StubTransport::new());
    let harness = harness_with(
        transport.clone(),
        TransportKind::Stub,
        &["cand-1", "cand-2"],
        clock,
        attempts,
    );

    let result = harness
        .service
        .deliver(
            &CancellationToken::new(),
            &request(&harness, &["cand-1", "cand-2"]),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(transport.calls(), 1);
    assert_eq!(
        harness
            .attempts
            .sent_candidates(CIRCLE, &harness.period_key)
            .expect("sent candidates"),
        BTreeSet::from(["cand-1".to_string()])
    );

    let _ = fs::remove_file(&dir);
}
