use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::escalation::types::{CircleType, HorizonBucket, MagnitudeBucket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingScope {
    Human,
    Institution,
}

impl HoldingScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Institution => "institution",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingAction {
    HoldSilently,
    QueueProof,
}

impl HoldingAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HoldSilently => "hold_silently",
            Self::QueueProof => "queue_proof",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingDuration {
    Hour,
    Day,
    Trip,
}

impl HoldingDuration {
    pub fn as_duration(self) -> Duration {
        match self {
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Trip => Duration::days(7),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Trip => "trip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingState {
    Active,
    Expired,
    Revoked,
}

/// Standing instruction to keep a circle's pressure out of sight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingContract {
    pub contract_id_hash: String,
    pub circle_id_hash: String,
    pub scope: HoldingScope,
    pub action: HoldingAction,
    pub duration: HoldingDuration,
    pub max_horizon: HorizonBucket,
    pub max_magnitude: MagnitudeBucket,
    pub state: HoldingState,
    /// 15-minute bucket of the creation instant; part of the contract id.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl HoldingContract {
    pub fn state_at(&self, now: OffsetDateTime) -> HoldingState {
        match self.state {
            HoldingState::Active if now >= self.expires_at => HoldingState::Expired,
            state => state,
        }
    }

    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        self.state_at(now) == HoldingState::Active
    }
}

/// Kind of circle a pressure originates from, as seen by holding contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingSubject {
    Human,
    Institution,
    /// Circles inferred from external data (vendors, unclassified senders).
    ExternalDerived,
}

impl From<CircleType> for HoldingSubject {
    fn from(circle_type: CircleType) -> Self {
        match circle_type {
            CircleType::Human => Self::Human,
            CircleType::Institution => Self::Institution,
            CircleType::Commerce | CircleType::Unknown => Self::ExternalDerived,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingPressure {
    pub circle_id_hash: String,
    pub subject: HoldingSubject,
    pub horizon: HorizonBucket,
    pub magnitude: MagnitudeBucket,
}

/// Outcome of applying a holding contract. There is deliberately no variant
/// that surfaces or interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingEffect {
    NoEffect,
    Hold,
    QueueProof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    TrustMissing,
    InterruptPreviewActive,
    ContractAlreadyActive,
}

impl IneligibleReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrustMissing => "trust_missing",
            Self::InterruptPreviewActive => "interrupt_preview_active",
            Self::ContractAlreadyActive => "contract_already_active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub allowed: bool,
    pub reason: Option<IneligibleReason>,
}

impl Eligibility {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn refused(reason: IneligibleReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}
