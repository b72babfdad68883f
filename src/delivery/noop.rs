use std::collections::BTreeMap;

use crate::delivery::{
    ports::{CandidateSource, PolicySource, PreviewSource, RateLimitSource, TrustSource},
    types::{DeliveryCandidate, PolicySnapshot, RateLimitDecision},
};

#[derive(Debug, Default, Clone)]
pub struct StaticCandidateSource {
    candidates: BTreeMap<String, DeliveryCandidate>,
}

impl StaticCandidateSource {
    pub fn new(candidates: impl IntoIterator<Item = DeliveryCandidate>) -> Self {
        Self {
            candidates: candidates
                .into_iter()
                .map(|candidate| (candidate.candidate_hash.clone(), candidate))
                .collect(),
        }
    }
}

impl CandidateSource for StaticCandidateSource {
    fn candidate(&self, _circle_id_hash: &str, candidate_hash: &str) -> Option<DeliveryCandidate> {
        self.candidates.get(candidate_hash).cloned()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StaticPolicySource {
    pub snapshot: PolicySnapshot,
}

impl StaticPolicySource {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self { snapshot }
    }
}

impl PolicySource for StaticPolicySource {
    fn policy(&self, _circle_id_hash: &str) -> PolicySnapshot {
        self.snapshot
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllRateLimit;

impl RateLimitSource for AllowAllRateLimit {
    fn check(&self, _circle_id_hash: &str, _period_key: &str) -> RateLimitDecision {
        RateLimitDecision::allow()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticTrustSource {
    pub baseline: bool,
    pub fragile: bool,
}

impl StaticTrustSource {
    pub fn established() -> Self {
        Self {
            baseline: true,
            fragile: false,
        }
    }

    pub fn fragile() -> Self {
        Self {
            baseline: true,
            fragile: true,
        }
    }

    pub fn missing() -> Self {
        Self {
            baseline: false,
            fragile: false,
        }
    }
}

impl TrustSource for StaticTrustSource {
    fn has_baseline(&self, _circle_id_hash: &str) -> bool {
        self.baseline
    }

    fn is_fragile(&self, _circle_id_hash: &str) -> bool {
        self.fragile
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticPreviewSource {
    pub active: bool,
}

impl StaticPreviewSource {
    pub fn inactive() -> Self {
        Self { active: false }
    }

    pub fn active() -> Self {
        Self { active: true }
    }
}

impl PreviewSource for StaticPreviewSource {
    fn preview_active(&self, _circle_id_hash: &str) -> bool {
        self.active
    }
}

