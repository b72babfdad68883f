use std::fmt;

use serde::{Deserialize, Serialize};

pub type CircleIdHash = String;
pub type PeriodKey = String;

/// Ceiling on how assertively a signal may be surfaced. Variant order is the
/// total order; caps compose by minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCap {
    HoldOnly,
    SurfaceOnly,
    InterruptCandidateOnly,
}

impl EscalationCap {
    pub const ALL: [EscalationCap; 3] = [
        EscalationCap::HoldOnly,
        EscalationCap::SurfaceOnly,
        EscalationCap::InterruptCandidateOnly,
    ];

    pub fn order(self) -> u8 {
        match self {
            Self::HoldOnly => 0,
            Self::SurfaceOnly => 1,
            Self::InterruptCandidateOnly => 2,
        }
    }

    pub fn from_order(order: u8) -> Self {
        match order {
            0 => Self::HoldOnly,
            1 => Self::SurfaceOnly,
            _ => Self::InterruptCandidateOnly,
        }
    }

    pub fn step_up(self, steps: u8) -> Self {
        Self::from_order(self.order().saturating_add(steps))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HoldOnly => "hold_only",
            Self::SurfaceOnly => "surface_only",
            Self::InterruptCandidateOnly => "interrupt_candidate_only",
        }
    }
}

impl fmt::Display for EscalationCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleType {
    Human,
    Institution,
    Commerce,
    #[serde(other)]
    Unknown,
}

impl CircleType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Institution => "institution",
            Self::Commerce => "commerce",
            Self::Unknown => "unknown",
        }
    }
}

/// How soon. Ordered by urgency, not by the order words appear in prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonBucket {
    None,
    Later,
    Soon,
    Now,
}

impl HorizonBucket {
    pub const ALL: [HorizonBucket; 4] = [
        HorizonBucket::None,
        HorizonBucket::Later,
        HorizonBucket::Soon,
        HorizonBucket::Now,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::None => 0,
            Self::Later => 1,
            Self::Soon => 2,
            Self::Now => 3,
        }
    }

    pub fn shift_up(self, steps: u8) -> Self {
        let index = (self.index() + steps as usize).min(Self::ALL.len() - 1);
        Self::ALL[index]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Later => "later",
            Self::Soon => "soon",
            Self::Now => "now",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeBucket {
    Nothing,
    AFew,
    Several,
}

impl MagnitudeBucket {
    pub const ALL: [MagnitudeBucket; 3] = [
        MagnitudeBucket::Nothing,
        MagnitudeBucket::AFew,
        MagnitudeBucket::Several,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Nothing => 0,
            Self::AFew => 1,
            Self::Several => 2,
        }
    }

    pub fn shift_up(self, steps: u8) -> Self {
        let index = (self.index() + steps as usize).min(Self::ALL.len() - 1);
        Self::ALL[index]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nothing => "nothing",
            Self::AFew => "a_few",
            Self::Several => "several",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSignal {
    #[default]
    None,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    None,
    Low,
    Medium,
    High,
}

impl UrgencyLevel {
    pub const ALL: [UrgencyLevel; 4] = [
        UrgencyLevel::None,
        UrgencyLevel::Low,
        UrgencyLevel::Medium,
        UrgencyLevel::High,
    ];

    pub fn step_up(self, steps: u8) -> Self {
        let index = (self as usize + steps as usize).min(Self::ALL.len() - 1);
        Self::ALL[index]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// How many interrupts the person has agreed to, independent of the daily quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptAllowance {
    None,
    UrgentOnly,
    #[default]
    Standard,
}

impl InterruptAllowance {
    /// Lowest urgency level this allowance lets through as an interrupt.
    pub fn level_floor(self) -> Option<UrgencyLevel> {
        match self {
            Self::None => None,
            Self::UrgentOnly => Some(UrgencyLevel::High),
            Self::Standard => Some(UrgencyLevel::Medium),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::UrgentOnly => "urgent_only",
            Self::Standard => "standard",
        }
    }
}

/// Why a resolution differs from its baseline. Ordered by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonBucket {
    AllowanceNone,
    CircleUnknown,
    CommerceHold,
    ContractHold,
    ContractQueueProof,
    EnvelopeShift,
    InvalidInput,
    NecessityMissing,
    TrustFragile,
    VendorCapped,
    VendorInvalid,
    WindowActive,
}

impl ReasonBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllowanceNone => "allowance_none",
            Self::CircleUnknown => "circle_unknown",
            Self::CommerceHold => "commerce_hold",
            Self::ContractHold => "contract_hold",
            Self::ContractQueueProof => "contract_queue_proof",
            Self::EnvelopeShift => "envelope_shift",
            Self::InvalidInput => "invalid_input",
            Self::NecessityMissing => "necessity_missing",
            Self::TrustFragile => "trust_fragile",
            Self::VendorCapped => "vendor_capped",
            Self::VendorInvalid => "vendor_invalid",
            Self::WindowActive => "window_active",
        }
    }
}

impl PartialOrd for ReasonBucket {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReasonBucket {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Ok,
    Clamped,
    Rejected,
}

impl ResolutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Clamped => "clamped",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_deliverable(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureInput {
    pub circle_id_hash: CircleIdHash,
    pub period_key: PeriodKey,
    pub circle_type: CircleType,
    pub horizon_bucket: HorizonBucket,
    pub magnitude_bucket: MagnitudeBucket,
    #[serde(default)]
    pub window_signal: WindowSignal,
    #[serde(default)]
    pub vendor_cap: Option<EscalationCap>,
    #[serde(default)]
    pub interrupt_allowance: Option<InterruptAllowance>,
    #[serde(default)]
    pub trust_fragile: bool,
    #[serde(default)]
    pub envelope_active: bool,
    #[serde(default)]
    pub necessity_declared: Option<bool>,
}

impl PressureInput {
    pub fn new(
        circle_id_hash: impl Into<String>,
        period_key: impl Into<String>,
        circle_type: CircleType,
        horizon_bucket: HorizonBucket,
        magnitude_bucket: MagnitudeBucket,
    ) -> Self {
        Self {
            circle_id_hash: circle_id_hash.into(),
            period_key: period_key.into(),
            circle_type,
            horizon_bucket,
            magnitude_bucket,
            window_signal: WindowSignal::None,
            vendor_cap: None,
            interrupt_allowance: None,
            trust_fragile: false,
            envelope_active: false,
            necessity_declared: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyResolution {
    pub circle_id_hash: CircleIdHash,
    pub period_key: PeriodKey,
    pub level: UrgencyLevel,
    pub cap: EscalationCap,
    pub reasons: Vec<ReasonBucket>,
    pub status: ResolutionStatus,
    pub resolution_hash: String,
}
