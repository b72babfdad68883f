use time::OffsetDateTime;

use crate::{
    canonical::{CanonicalError, CanonicalString},
    clock::bucket_15m,
    envelope::types::{
        AttentionEnvelope, EnvelopeDuration, EnvelopeEffect, EnvelopeKind, EnvelopeReason,
        EnvelopeState,
    },
    escalation::types::{CircleType, HorizonBucket, MagnitudeBucket},
};

pub fn build_envelope(
    circle_id_hash: &str,
    kind: EnvelopeKind,
    duration: EnvelopeDuration,
    reason: EnvelopeReason,
    now: OffsetDateTime,
) -> Result<AttentionEnvelope, CanonicalError> {
    let started_at = bucket_15m(now);
    let envelope_hash = CanonicalString::new("ATTENTION_ENVELOPE")?
        .push_all([
            circle_id_hash,
            kind.as_str(),
            duration.as_str(),
            reason.as_str(),
            &started_at.unix_timestamp().to_string(),
        ])?
        .short_hash();

    Ok(AttentionEnvelope {
        envelope_hash,
        circle_id_hash: circle_id_hash.to_string(),
        kind,
        duration,
        reason,
        state: EnvelopeState::Active,
        started_at,
        expires_at: now + duration.as_duration(),
    })
}

/// Stopping is allowed from any state and always lands in `Stopped`.
pub fn stop(envelope: &mut AttentionEnvelope) {
    envelope.state = EnvelopeState::Stopped;
}

pub fn kind_effect(kind: EnvelopeKind) -> EnvelopeEffect {
    match kind {
        EnvelopeKind::None => EnvelopeEffect::NONE,
        EnvelopeKind::Working => EnvelopeEffect {
            horizon_shift: 0,
            magnitude_bias: 1,
            cap_delta: 1,
        },
        EnvelopeKind::Travel => EnvelopeEffect {
            horizon_shift: 1,
            magnitude_bias: 0,
            cap_delta: 1,
        },
        EnvelopeKind::OnCall | EnvelopeKind::Emergency => EnvelopeEffect {
            horizon_shift: 1,
            magnitude_bias: 1,
            cap_delta: 1,
        },
    }
}

/// Effect of `envelope` on one evaluation. Zero unless the envelope exists,
/// has a real kind, is active at `now` and the circle is not commerce.
pub fn apply_envelope(
    envelope: Option<&AttentionEnvelope>,
    circle_type: CircleType,
    horizon: HorizonBucket,
    magnitude: MagnitudeBucket,
    now: OffsetDateTime,
) -> EnvelopeEffect {
    let Some(envelope) = envelope else {
        return EnvelopeEffect::NONE;
    };
    if circle_type == CircleType::Commerce || !envelope.is_active_at(now) {
        return EnvelopeEffect::NONE;
    }

    let effect = kind_effect(envelope.kind);
    // Saturated buckets cannot move; report only what actually shifts.
    EnvelopeEffect {
        horizon_shift: if horizon == HorizonBucket::Now {
            0
        } else {
            effect.horizon_shift.min(1)
        },
        magnitude_bias: if magnitude == MagnitudeBucket::Several {
            0
        } else {
            effect.magnitude_bias.min(1)
        },
        cap_delta: effect.cap_delta.min(1),
    }
}
