use time::OffsetDateTime;

use crate::{
    canonical::{CanonicalString, contains_delimiter, opaque_field},
    envelope::{engine::apply_envelope, types::AttentionEnvelope},
    escalation::{
        clamp::clamp_pressure_allowance,
        trust::FRAGILE_TRUST_CEILING,
        types::{
            CircleType, EscalationCap, HorizonBucket, InterruptAllowance, MagnitudeBucket,
            PressureInput, ReasonBucket, ResolutionStatus, UrgencyLevel, UrgencyResolution,
            WindowSignal,
        },
    },
    holding::{
        engine::apply_contract,
        types::{HoldingContract, HoldingEffect, HoldingPressure},
    },
    vendor::contract::{VendorContract, VendorReason, compute_effective_cap},
};

pub const MAX_REASONS: usize = 3;
const REASON_SEPARATOR: &str = ",";

/// Rows are horizon (none, later, soon, now); columns are magnitude
/// (nothing, a_few, several).
const BASELINE: [[UrgencyLevel; 3]; 4] = {
    use UrgencyLevel::{High, Low, Medium, None};
    [
        [None, Low, Low],
        [Low, Low, Medium],
        [Low, Medium, High],
        [Medium, High, High],
    ]
};

/// Cap-source records read for one evaluation. The resolver never mutates or
/// retains them.
#[derive(Debug, Clone, Copy)]
pub struct CapSources<'a> {
    pub vendor_contract: Option<&'a VendorContract>,
    pub envelope: Option<&'a AttentionEnvelope>,
    pub holding_contract: Option<&'a HoldingContract>,
    pub at: OffsetDateTime,
}

impl<'a> CapSources<'a> {
    pub fn none(at: OffsetDateTime) -> Self {
        Self {
            vendor_contract: None,
            envelope: None,
            holding_contract: None,
            at,
        }
    }
}

pub fn baseline_level(horizon: HorizonBucket, magnitude: MagnitudeBucket) -> UrgencyLevel {
    BASELINE[horizon.index()][magnitude.index()]
}

pub fn level_to_cap(level: UrgencyLevel) -> EscalationCap {
    match level {
        UrgencyLevel::None => EscalationCap::HoldOnly,
        UrgencyLevel::Low | UrgencyLevel::Medium => EscalationCap::SurfaceOnly,
        UrgencyLevel::High => EscalationCap::InterruptCandidateOnly,
    }
}

#[derive(Debug, Default)]
pub struct UrgencyResolver;

impl UrgencyResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, input: &PressureInput, sources: &CapSources<'_>) -> UrgencyResolution {
        let resolution = resolve(input, sources);
        tracing::debug!(
            target: "escalation",
            resolution_hash = %resolution.resolution_hash,
            level = resolution.level.as_str(),
            cap = resolution.cap.as_str(),
            status = resolution.status.as_str(),
            reasons = resolution.reasons.len(),
            "urgency_resolved"
        );
        resolution
    }
}

struct Pressure {
    level: UrgencyLevel,
    cap: EscalationCap,
    reasons: Vec<ReasonBucket>,
}

/// Pure resolution of one pressure signal against its cap sources.
pub fn resolve(input: &PressureInput, sources: &CapSources<'_>) -> UrgencyResolution {
    if let Some(rejected) = reject_invalid(input) {
        return rejected;
    }

    let pressure = shifted_pressure(input, sources);
    let mut reasons = pressure.reasons;
    let mut cap = pressure.cap;

    for (ceiling, reason) in ceilings(input, sources) {
        let clamped = clamp_pressure_allowance(cap, ceiling);
        if clamped != cap {
            cap = clamped;
            reasons.push(reason);
        }
    }

    let status = if cap < pressure.cap {
        ResolutionStatus::Clamped
    } else {
        ResolutionStatus::Ok
    };

    finish(
        &input.circle_id_hash,
        &input.period_key,
        pressure.level,
        cap,
        reasons,
        status,
    )
}

fn reject_invalid(input: &PressureInput) -> Option<UrgencyResolution> {
    let circle_invalid =
        input.circle_id_hash.is_empty() || contains_delimiter(&input.circle_id_hash);
    let period_invalid = input.period_key.is_empty() || contains_delimiter(&input.period_key);
    if !circle_invalid && !period_invalid {
        return None;
    }

    // Offending fields cannot be embedded verbatim in a canonical string.
    let circle = if circle_invalid {
        opaque_field(&input.circle_id_hash)
    } else {
        input.circle_id_hash.clone()
    };
    let period = if period_invalid {
        opaque_field(&input.period_key)
    } else {
        input.period_key.clone()
    };

    Some(finish(
        &circle,
        &period,
        UrgencyLevel::None,
        EscalationCap::HoldOnly,
        vec![ReasonBucket::InvalidInput],
        ResolutionStatus::Rejected,
    ))
}

fn shifted_pressure(input: &PressureInput, sources: &CapSources<'_>) -> Pressure {
    let base_level = baseline_level(input.horizon_bucket, input.magnitude_bucket);
    let base_cap = level_to_cap(base_level);

    if input.circle_type == CircleType::Commerce {
        return Pressure {
            level: base_level,
            cap: base_cap,
            reasons: Vec::new(),
        };
    }

    let window_shift = u8::from(input.window_signal == WindowSignal::Active);
    let envelope = sources
        .envelope
        .filter(|_| input.envelope_active)
        .filter(|envelope| envelope.circle_id_hash == input.circle_id_hash);
    let effect = apply_envelope(
        envelope,
        input.circle_type,
        input.horizon_bucket,
        input.magnitude_bucket,
        sources.at,
    );

    let horizon_shift = (window_shift + effect.horizon_shift).min(1);
    let magnitude_bias = effect.magnitude_bias.min(1);

    let window_level = baseline_level(
        input.horizon_bucket.shift_up(window_shift),
        input.magnitude_bucket,
    )
    .min(base_level.step_up(1));
    let level = baseline_level(
        input.horizon_bucket.shift_up(horizon_shift),
        input.magnitude_bucket.shift_up(magnitude_bias),
    )
    .min(base_level.step_up(1));
    let cap = level_to_cap(level).min(base_cap.step_up(1));

    let mut reasons = Vec::new();
    if window_level != base_level {
        reasons.push(ReasonBucket::WindowActive);
    }
    if level != window_level {
        reasons.push(ReasonBucket::EnvelopeShift);
    }

    Pressure {
        level,
        cap,
        reasons,
    }
}

/// Every ceiling that applies to `input`, in precedence order. Commerce comes
/// first so it owns the reason whenever it applies.
fn ceilings(input: &PressureInput, sources: &CapSources<'_>) -> Vec<(EscalationCap, ReasonBucket)> {
    let is_commerce = input.circle_type == CircleType::Commerce;
    let mut ceilings = Vec::with_capacity(8);

    if is_commerce {
        ceilings.push((EscalationCap::HoldOnly, ReasonBucket::CommerceHold));
    }
    if input.circle_type == CircleType::Unknown {
        ceilings.push((EscalationCap::HoldOnly, ReasonBucket::CircleUnknown));
    }
    if let Some(vendor_cap) = input.vendor_cap {
        ceilings.push((vendor_cap, ReasonBucket::VendorCapped));
    }
    if let Some(contract) = sources.vendor_contract {
        let (cap, reason) = compute_effective_cap(contract, &input.circle_id_hash, is_commerce);
        let bucket = match reason {
            VendorReason::Invalid => ReasonBucket::VendorInvalid,
            VendorReason::Applied | VendorReason::CommerceCapped => ReasonBucket::VendorCapped,
        };
        ceilings.push((cap, bucket));
    }
    if input.trust_fragile {
        ceilings.push((FRAGILE_TRUST_CEILING, ReasonBucket::TrustFragile));
    }
    if input.interrupt_allowance == Some(InterruptAllowance::None) {
        ceilings.push((EscalationCap::SurfaceOnly, ReasonBucket::AllowanceNone));
    }
    if input.circle_type == CircleType::Institution && input.necessity_declared != Some(true) {
        ceilings.push((EscalationCap::SurfaceOnly, ReasonBucket::NecessityMissing));
    }
    if let Some(contract) = sources.holding_contract {
        let pressure = HoldingPressure {
            circle_id_hash: input.circle_id_hash.clone(),
            subject: input.circle_type.into(),
            horizon: input.horizon_bucket,
            magnitude: input.magnitude_bucket,
        };
        match apply_contract(contract, &pressure, sources.at) {
            HoldingEffect::NoEffect => {}
            HoldingEffect::Hold => {
                ceilings.push((EscalationCap::HoldOnly, ReasonBucket::ContractHold));
            }
            HoldingEffect::QueueProof => {
                ceilings.push((EscalationCap::HoldOnly, ReasonBucket::ContractQueueProof));
            }
        }
    }

    ceilings
}

fn finish(
    circle_id_hash: &str,
    period_key: &str,
    level: UrgencyLevel,
    cap: EscalationCap,
    mut reasons: Vec<ReasonBucket>,
    status: ResolutionStatus,
) -> UrgencyResolution {
    reasons.sort();
    reasons.dedup();
    reasons.truncate(MAX_REASONS);

    let resolution_hash = resolution_hash(circle_id_hash, period_key, level, cap, &reasons, status);
    UrgencyResolution {
        circle_id_hash: circle_id_hash.to_string(),
        period_key: period_key.to_string(),
        level,
        cap,
        reasons,
        status,
        resolution_hash,
    }
}

pub fn resolution_hash(
    circle_id_hash: &str,
    period_key: &str,
    level: UrgencyLevel,
    cap: EscalationCap,
    reasons: &[ReasonBucket],
    status: ResolutionStatus,
) -> String {
    let joined = reasons
        .iter()
        .map(|reason| reason.as_str())
        .collect::<Vec<_>>()
        .join(REASON_SEPARATOR);

    match CanonicalString::new("URGENCY_RESOLUTION").and_then(|builder| {
        builder.push_all([
            circle_id_hash,
            period_key,
            level.as_str(),
            cap.as_str(),
            joined.as_str(),
            status.as_str(),
        ])
    }) {
        Ok(canonical) => canonical.short_hash(),
        // Inputs are validated before hashing; fall back to a digest of the
        // digests rather than panic.
        Err(_) => opaque_field(&format!(
            "{}{}{}",
            opaque_field(circle_id_hash),
            opaque_field(period_key),
            status.as_str()
        )),
    }
}
