use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    audit::{error::StoreError, log::AuditRecord, store::AuditStore},
    delivery::{
        ports::CandidateSource,
        types::{DeliveryAttempt, DeliveryCandidate, DeliveryReceipt, DeliveryResult},
    },
    escalation::types::UrgencyResolution,
};

pub const RESOLUTION_STORE: &str = "resolutions";
pub const ATTEMPT_STORE: &str = "attempts";
pub const RECEIPT_STORE: &str = "receipts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    #[serde(flatten)]
    pub resolution: UrgencyResolution,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl AuditRecord for ResolutionRecord {
    fn record_key(&self) -> String {
        self.resolution.resolution_hash.clone()
    }

    fn recorded_at(&self) -> OffsetDateTime {
        self.recorded_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    #[serde(flatten)]
    pub attempt: DeliveryAttempt,
    #[serde(default)]
    pub response_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl AuditRecord for AttemptRecord {
    /// One record per attempt outcome, so a deduped replay of a sent attempt
    /// is still recorded.
    fn record_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.attempt.attempt_id,
            self.attempt.result.as_str(),
            self.attempt.reason.as_str()
        )
    }

    fn recorded_at(&self) -> OffsetDateTime {
        self.recorded_at
    }

    /// Sent attempts carry the daily quota and dedup state.
    fn pinned(&self) -> bool {
        self.attempt.result == DeliveryResult::Sent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    #[serde(flatten)]
    pub receipt: DeliveryReceipt,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl AuditRecord for ReceiptRecord {
    fn record_key(&self) -> String {
        self.receipt.receipt_hash.clone()
    }

    fn recorded_at(&self) -> OffsetDateTime {
        self.recorded_at
    }
}

pub type ResolutionStore = AuditStore<ResolutionRecord>;
pub type AttemptStore = AuditStore<AttemptRecord>;
pub type ReceiptStore = AuditStore<ReceiptRecord>;

impl AuditStore<AttemptRecord> {
    fn sent_for<'a>(
        records: impl Iterator<Item = &'a AttemptRecord>,
        circle_id_hash: &'a str,
        period_key: &'a str,
    ) -> impl Iterator<Item = &'a AttemptRecord> {
        records.filter(move |record| {
            record.attempt.result == DeliveryResult::Sent
                && record.attempt.circle_id_hash == circle_id_hash
                && record.attempt.period_key == period_key
        })
    }

    /// Interrupts already delivered to the circle in the period.
    pub fn sent_count(&self, circle_id_hash: &str, period_key: &str) -> Result<u32, StoreError> {
        self.read(|log| Self::sent_for(log.iter(), circle_id_hash, period_key).count() as u32)
    }

    pub fn sent_candidates(
        &self,
        circle_id_hash: &str,
        period_key: &str,
    ) -> Result<BTreeSet<String>, StoreError> {
        self.read(|log| {
            Self::sent_for(log.iter(), circle_id_hash, period_key)
                .map(|record| record.attempt.candidate_hash.clone())
                .collect()
        })
    }
}

/// Delivery candidates are recorded resolutions, addressed by resolution
/// hash. Unknown, evicted and unreadable resolutions are all missing.
impl CandidateSource for AuditStore<ResolutionRecord> {
    fn candidate(&self, circle_id_hash: &str, candidate_hash: &str) -> Option<DeliveryCandidate> {
        self.read(|log| {
            log.iter()
                .rev()
                .map(|record| &record.resolution)
                .find(|resolution| {
                    resolution.resolution_hash == candidate_hash
                        && resolution.circle_id_hash == circle_id_hash
                })
                .map(|resolution| DeliveryCandidate {
                    candidate_hash: resolution.resolution_hash.clone(),
                    resolution_level: resolution.level,
                    resolution_cap: resolution.cap,
                    resolution_status: resolution.status,
                })
        })
        .ok()
        .flatten()
    }
}
