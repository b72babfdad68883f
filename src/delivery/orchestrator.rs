use std::collections::BTreeSet;

use crate::{
    canonical::{CanonicalString, safe_field, short_hash},
    delivery::types::{
        DeliveryAttempt, DeliveryCandidate, DeliveryReason, DeliveryReceipt, DeliveryResult,
        DeliveryRun, DeliveryRunInput, TransportKind,
    },
    escalation::types::EscalationCap,
};

fn canonical_hash<'a>(type_tag: &str, fields: impl IntoIterator<Item = &'a str>) -> String {
    let fields = fields.into_iter().map(safe_field).collect::<Vec<_>>();
    match CanonicalString::new(type_tag).and_then(|builder| builder.push_all(&fields)) {
        Ok(canonical) => canonical.short_hash(),
        Err(_) => short_hash(type_tag),
    }
}

/// Deterministic identity of delivering `candidate_hash` to a circle in a
/// period. Recomputing the same triple always yields the same id.
pub fn attempt_id(circle_id_hash: &str, candidate_hash: &str, period_key: &str) -> String {
    canonical_hash(
        "DELIVERY_ATTEMPT",
        [circle_id_hash, candidate_hash, period_key],
    )
}

pub fn status_hash(attempt_id: &str, result: DeliveryResult, reason: DeliveryReason) -> String {
    canonical_hash(
        "DELIVERY_STATUS",
        [attempt_id, result.as_str(), reason.as_str()],
    )
}

impl DeliveryAttempt {
    fn decide(
        input: &DeliveryRunInput,
        candidate: &DeliveryCandidate,
        result: DeliveryResult,
        reason: DeliveryReason,
    ) -> Self {
        let attempt_id = attempt_id(
            &input.circle_id_hash,
            &candidate.candidate_hash,
            &input.period_key,
        );
        let status_hash = status_hash(&attempt_id, result, reason);
        Self {
            attempt_id,
            circle_id_hash: input.circle_id_hash.clone(),
            period_key: input.period_key.clone(),
            candidate_hash: candidate.candidate_hash.clone(),
            result,
            reason,
            transport_kind: input.transport_kind,
            status_hash,
        }
    }

    /// Downgrades an accepted attempt after the transport refused it.
    pub fn mark_failed(&mut self, reason: DeliveryReason) {
        self.result = DeliveryResult::Skipped;
        self.reason = reason;
        self.status_hash = status_hash(&self.attempt_id, self.result, self.reason);
    }

    pub fn is_sent(&self) -> bool {
        self.result == DeliveryResult::Sent
    }
}

pub fn build_receipt(
    circle_id_hash: &str,
    period_key: &str,
    attempts: &[DeliveryAttempt],
) -> DeliveryReceipt {
    let count = |result: DeliveryResult| {
        attempts
            .iter()
            .filter(|attempt| attempt.result == result)
            .count() as u32
    };
    let sent = count(DeliveryResult::Sent);
    let skipped = count(DeliveryResult::Skipped);
    let deduped = count(DeliveryResult::Deduped);
    let attempt_ids = attempts
        .iter()
        .map(|attempt| attempt.attempt_id.clone())
        .collect::<Vec<_>>();

    let counts = [sent.to_string(), skipped.to_string(), deduped.to_string()];
    let joined_ids = attempt_ids.join(",");
    let receipt_hash = canonical_hash(
        "DELIVERY_RECEIPT",
        [
            circle_id_hash,
            period_key,
            counts[0].as_str(),
            counts[1].as_str(),
            counts[2].as_str(),
            joined_ids.as_str(),
        ],
    );

    DeliveryReceipt {
        circle_id_hash: circle_id_hash.to_string(),
        period_key: period_key.to_string(),
        sent,
        skipped,
        deduped,
        attempt_ids,
        receipt_hash,
    }
}

fn policy_allows(input: &DeliveryRunInput, candidate: &DeliveryCandidate) -> bool {
    if !input.policy.enabled || !candidate.resolution_status.is_deliverable() {
        return false;
    }
    if candidate.resolution_cap < EscalationCap::InterruptCandidateOnly {
        return false;
    }
    match input.policy.allowance.level_floor() {
        Some(floor) => candidate.resolution_level >= floor,
        None => false,
    }
}

/// Decides sent/skipped/deduped for every candidate. Never touches the
/// network; the caller hands `Sent` attempts to a transport.
pub fn compute_delivery_run(input: &DeliveryRunInput) -> DeliveryRun {
    let mut candidates = input.candidates.iter().collect::<Vec<_>>();
    candidates.sort_by(|left, right| left.candidate_hash.cmp(&right.candidate_hash));

    let mut remaining = input
        .effective_max_per_day()
        .saturating_sub(input.sent_today);
    let mut seen = BTreeSet::new();
    let mut attempts = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let first_in_run = seen.insert(candidate.candidate_hash.as_str());
        let (result, reason) = if !policy_allows(input, candidate) {
            (DeliveryResult::Skipped, DeliveryReason::PolicyDisallowed)
        } else if input.trust_fragile {
            (DeliveryResult::Skipped, DeliveryReason::TrustFragile)
        } else if !input.push_enabled {
            (DeliveryResult::Skipped, DeliveryReason::PushNotEnabled)
        } else if !first_in_run || input.already_sent.contains(&candidate.candidate_hash) {
            (DeliveryResult::Deduped, DeliveryReason::AlreadySent)
        } else if !input.rate_limit.allowed {
            (DeliveryResult::Skipped, DeliveryReason::RateLimited)
        } else if remaining == 0 {
            (DeliveryResult::Skipped, DeliveryReason::CapReached)
        } else {
            remaining -= 1;
            (DeliveryResult::Sent, DeliveryReason::Delivered)
        };

        attempts.push(DeliveryAttempt::decide(input, candidate, result, reason));
    }

    let receipt = build_receipt(&input.circle_id_hash, &input.period_key, &attempts);
    DeliveryRun { attempts, receipt }
}

impl DeliveryRun {
    pub fn sent(&self) -> impl Iterator<Item = &DeliveryAttempt> {
        self.attempts.iter().filter(|attempt| attempt.is_sent())
    }

    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.attempts.first().map(|attempt| attempt.transport_kind)
    }
}
