use time::OffsetDateTime;

use crate::{
    delivery::types::{DeliveryCandidate, PolicySnapshot, RateLimitDecision},
    registration::types::PushRegistration,
};

pub use crate::escalation::trust::TrustSource;

/// Resolved candidates awaiting delivery. A candidate resolved for another
/// circle is reported as missing.
pub trait CandidateSource: Send + Sync {
    fn candidate(&self, circle_id_hash: &str, candidate_hash: &str) -> Option<DeliveryCandidate>;

    fn exists(&self, circle_id_hash: &str, candidate_hash: &str) -> bool {
        self.candidate(circle_id_hash, candidate_hash).is_some()
    }
}

pub trait PolicySource: Send + Sync {
    fn policy(&self, circle_id_hash: &str) -> PolicySnapshot;
}

/// Enabled push registration for a circle, if any.
pub trait DeviceSource: Send + Sync {
    fn registration(&self, circle_id_hash: &str) -> Option<PushRegistration>;

    /// Called when the provider reports the token as gone.
    fn mark_token_gone(&self, _token_hash: &str) {}
}

pub trait RateLimitSource: Send + Sync {
    fn check(&self, circle_id_hash: &str, period_key: &str) -> RateLimitDecision;
}

/// Whether a circle has an attention envelope in effect at `now`.
pub trait EnvelopeSource: Send + Sync {
    fn envelope_active(&self, circle_id_hash: &str, now: OffsetDateTime) -> bool;
}

pub trait PreviewSource: Send + Sync {
    fn preview_active(&self, circle_id_hash: &str) -> bool;
}
