use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::escalation::types::{
    EscalationCap, InterruptAllowance, ResolutionStatus, UrgencyLevel, UrgencyResolution,
};

pub const DEFAULT_MAX_PER_DAY: u32 = 2;

pub fn default_max_per_day() -> u32 {
    DEFAULT_MAX_PER_DAY
}

/// Which sender carries accepted attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Stub,
    Webhook,
    Apns,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::Webhook => "webhook",
            Self::Apns => "apns",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCandidate {
    pub candidate_hash: String,
    pub resolution_level: UrgencyLevel,
    pub resolution_cap: EscalationCap,
    pub resolution_status: ResolutionStatus,
}

impl DeliveryCandidate {
    pub fn from_resolution(candidate_hash: impl Into<String>, resolution: &UrgencyResolution) -> Self {
        Self {
            candidate_hash: candidate_hash.into(),
            resolution_level: resolution.level,
            resolution_cap: resolution.cap,
            resolution_status: resolution.status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub allowance: InterruptAllowance,
    #[serde(default = "default_max_per_day")]
    pub max_per_day: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for PolicySnapshot {
    fn default() -> Self {
        Self {
            allowance: InterruptAllowance::Standard,
            max_per_day: DEFAULT_MAX_PER_DAY,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    #[serde(default)]
    pub reject_reason: Option<String>,
}

impl RateLimitDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reject_reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reject_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRunInput {
    pub circle_id_hash: String,
    pub period_key: String,
    pub candidates: Vec<DeliveryCandidate>,
    pub sent_today: u32,
    pub max_per_day: u32,
    pub policy: PolicySnapshot,
    pub trust_fragile: bool,
    pub push_enabled: bool,
    pub rate_limit: RateLimitDecision,
    pub already_sent: BTreeSet<String>,
    pub transport_kind: TransportKind,
}

impl DeliveryRunInput {
    pub fn new(
        circle_id_hash: impl Into<String>,
        period_key: impl Into<String>,
        candidates: Vec<DeliveryCandidate>,
    ) -> Self {
        Self {
            circle_id_hash: circle_id_hash.into(),
            period_key: period_key.into(),
            candidates,
            sent_today: 0,
            max_per_day: DEFAULT_MAX_PER_DAY,
            policy: PolicySnapshot::default(),
            trust_fragile: false,
            push_enabled: true,
            rate_limit: RateLimitDecision::allow(),
            already_sent: BTreeSet::new(),
            transport_kind: TransportKind::Stub,
        }
    }

    /// The stricter of the run's quota and the policy's quota.
    pub fn effective_max_per_day(&self) -> u32 {
        self.max_per_day.min(self.policy.max_per_day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryResult {
    Sent,
    Skipped,
    Deduped,
}

impl DeliveryResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Skipped => "skipped",
            Self::Deduped => "deduped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryReason {
    Delivered,
    PolicyDisallowed,
    TrustFragile,
    PushNotEnabled,
    AlreadySent,
    RateLimited,
    CapReached,
    TransportError,
    NotConfigured,
    NotPermitted,
}

impl DeliveryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::PolicyDisallowed => "policy_disallowed",
            Self::TrustFragile => "trust_fragile",
            Self::PushNotEnabled => "push_not_enabled",
            Self::AlreadySent => "already_sent",
            Self::RateLimited => "rate_limited",
            Self::CapReached => "cap_reached",
            Self::TransportError => "transport_error",
            Self::NotConfigured => "not_configured",
            Self::NotPermitted => "not_permitted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub attempt_id: String,
    pub circle_id_hash: String,
    pub period_key: String,
    pub candidate_hash: String,
    pub result: DeliveryResult,
    pub reason: DeliveryReason,
    pub transport_kind: TransportKind,
    pub status_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub circle_id_hash: String,
    pub period_key: String,
    pub sent: u32,
    pub skipped: u32,
    pub deduped: u32,
    pub attempt_ids: Vec<String>,
    pub receipt_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRun {
    pub attempts: Vec<DeliveryAttempt>,
    pub receipt: DeliveryReceipt,
}
