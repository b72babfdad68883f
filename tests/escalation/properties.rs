use hush::{
    envelope::{
        AttentionEnvelope, EnvelopeDuration, EnvelopeKind, EnvelopeReason, build_envelope,
    },
    escalation::{
        CapSources, CircleType, EscalationCap, HorizonBucket, InterruptAllowance, MagnitudeBucket,
        PressureInput, WindowSignal, clamp_pressure_allowance, resolve,
    },
    holding::{HoldingAction, HoldingContract, HoldingDuration, HoldingScope, HoldingState},
    vendor::{DeclaredBy, MaxFrequency, VendorContract, VendorScope},
};
use proptest::{prelude::*, sample::select};
use time::{OffsetDateTime, macros::datetime};

const AT: OffsetDateTime = datetime!(2026-10-16 09:20:00 UTC);

fn cap() -> impl Strategy<Value = EscalationCap> {
    select(EscalationCap::ALL.to_vec())
}

fn circle_type() -> impl Strategy<Value = CircleType> {
    select(vec![
        CircleType::Human,
        CircleType::Institution,
        CircleType::Commerce,
        CircleType::Unknown,
    ])
}

fn pressure_input() -> impl Strategy<Value = PressureInput> {
    (
        "[a-f0-9]{8,64}",
        circle_type(),
        select(HorizonBucket::ALL.to_vec()),
        select(MagnitudeBucket::ALL.to_vec()),
        any::<bool>(),
        proptest::option::of(cap()),
        proptest::option::of(select(vec![
            InterruptAllowance::None,
            InterruptAllowance::UrgentOnly,
            InterruptAllowance::Standard,
        ])),
        any::<bool>(),
        any::<bool>(),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(
            |(
                circle,
                circle_type,
                horizon,
                magnitude,
                window,
                vendor_cap,
                allowance,
                fragile,
                envelope_active,
                necessity,
            )| {
                let mut input =
                    PressureInput::new(circle, "2026-10-16", circle_type, horizon, magnitude);
                input.window_signal = if window {
                    WindowSignal::Active
                } else {
                    WindowSignal::None
                };
                input.vendor_cap = vendor_cap;
                input.interrupt_allowance = allowance;
                input.trust_fragile = fragile;
                input.envelope_active = envelope_active;
                input.necessity_declared = necessity;
                input
            },
        )
}

/// Owned cap-source records; `sources()` lends them to the resolver.
#[derive(Debug, Clone)]
struct Records {
    vendor_contract: Option<VendorContract>,
    envelope: Option<AttentionEnvelope>,
    holding_contract: Option<HoldingContract>,
}

impl Records {
    fn sources(&self) -> CapSources<'_> {
        CapSources {
            vendor_contract: self.vendor_contract.as_ref(),
            envelope: self.envelope.as_ref(),
            holding_contract: self.holding_contract.as_ref(),
            at: AT,
        }
    }
}

fn vendor_contract(circle: String) -> impl Strategy<Value = VendorContract> {
    (
        select(vec![
            VendorScope::Commerce,
            VendorScope::Institution,
            VendorScope::Health,
            VendorScope::Transport,
        ]),
        cap(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(move |(scope, allowed_pressure, emergency_exception, own_circle)| {
            VendorContract {
                vendor_circle_hash: if own_circle {
                    circle.clone()
                } else {
                    "b".repeat(64)
                },
                scope,
                allowed_pressure,
                max_frequency: MaxFrequency::Daily,
                emergency_exception,
                declared_by: DeclaredBy::VendorSelf,
                period_key: "2026-W42".to_string(),
            }
        })
}

fn envelope(circle: String) -> impl Strategy<Value = AttentionEnvelope> {
    (
        select(vec![
            EnvelopeKind::None,
            EnvelopeKind::Working,
            EnvelopeKind::Travel,
            EnvelopeKind::OnCall,
            EnvelopeKind::Emergency,
        ]),
        select(vec![EnvelopeDuration::M15, EnvelopeDuration::H4, EnvelopeDuration::Day]),
        0i64..120,
    )
        .prop_filter_map("envelope must build", move |(kind, duration, minutes_ago)| {
            build_envelope(
                &circle,
                kind,
                duration,
                EnvelopeReason::Other,
                AT - time::Duration::minutes(minutes_ago),
            )
            .ok()
        })
}

fn holding_contract(circle: String) -> impl Strategy<Value = HoldingContract> {
    (
        select(vec![HoldingScope::Human, HoldingScope::Institution]),
        select(vec![HoldingAction::HoldSilently, HoldingAction::QueueProof]),
        select(HorizonBucket::ALL.to_vec()),
        select(MagnitudeBucket::ALL.to_vec()),
        select(vec![HoldingState::Active, HoldingState::Revoked]),
    )
        .prop_map(move |(scope, action, max_horizon, max_magnitude, state)| HoldingContract {
            contract_id_hash: "0".repeat(32),
            circle_id_hash: circle.clone(),
            scope,
            action,
            duration: HoldingDuration::Day,
            max_horizon,
            max_magnitude,
            state,
            created_at: AT,
            expires_at: AT + time::Duration::days(1),
        })
}

/// A pressure input together with optional records for the same circle.
fn scenario() -> impl Strategy<Value = (PressureInput, Records)> {
    pressure_input().prop_flat_map(|input| {
        let circle = input.circle_id_hash.clone();
        (
            Just(input),
            proptest::option::of(vendor_contract(circle.clone())),
            proptest::option::of(envelope(circle.clone())),
            proptest::option::of(holding_contract(circle)),
        )
            .prop_map(|(input, vendor_contract, envelope, holding_contract)| {
                (
                    input,
                    Records {
                        vendor_contract,
                        envelope,
                        holding_contract,
                    },
                )
            })
    })
}

proptest! {
    #[test]
    fn given_any_input_when_resolved_twice_then_hash_is_identical(
        (input, records) in scenario()
    ) {
        let first = resolve(&input, &records.sources());
        let second = resolve(&input, &records.sources());
        prop_assert_eq!(first.resolution_hash, second.resolution_hash);
    }

    #[test]
    fn given_any_pair_when_clamped_then_never_raised(current in cap(), ceiling in cap()) {
        let clamped = clamp_pressure_allowance(current, ceiling);
        prop_assert!(clamped.order() <= current.order());
        prop_assert!(clamped.order() <= ceiling.order());
    }

    #[test]
    fn given_commerce_input_when_resolved_with_any_sources_then_hold_only(
        (input, records) in scenario()
    ) {
        let mut input = input;
        input.circle_type = CircleType::Commerce;
        prop_assert_eq!(resolve(&input, &records.sources()).cap, EscalationCap::HoldOnly);
    }

    #[test]
    fn given_necessity_false_when_compared_with_true_then_never_higher(
        (input, records) in scenario()
    ) {
        let mut without = input.clone();
        without.necessity_declared = Some(false);
        let mut with = input;
        with.necessity_declared = Some(true);

        let without = resolve(&without, &records.sources());
        let with = resolve(&with, &records.sources());
        prop_assert!(without.cap.order() <= with.cap.order());
    }

    #[test]
    fn given_any_sources_when_resolved_then_cap_never_exceeds_vendor_ceiling(
        (input, records) in scenario()
    ) {
        let resolution = resolve(&input, &records.sources());
        if let Some(contract) = records.vendor_contract.as_ref() {
            let (ceiling, _) = hush::vendor::compute_effective_cap(
                contract,
                &input.circle_id_hash,
                input.circle_type == CircleType::Commerce,
            );
            prop_assert!(resolution.cap.order() <= ceiling.order());
        }
    }

    #[test]
    fn given_any_input_when_resolved_then_reasons_bounded_and_sorted(
        (input, records) in scenario()
    ) {
        let resolution = resolve(&input, &records.sources());
        prop_assert!(resolution.reasons.len() <= 3);
        prop_assert!(resolution.reasons.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
