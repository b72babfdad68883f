use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    None,
    Working,
    Travel,
    OnCall,
    Emergency,
}

impl EnvelopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Working => "working",
            Self::Travel => "travel",
            Self::OnCall => "on_call",
            Self::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeDuration {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "trip")]
    Trip,
}

impl EnvelopeDuration {
    pub fn as_duration(self) -> Duration {
        match self {
            Self::M15 => Duration::minutes(15),
            Self::H1 => Duration::hours(1),
            Self::H4 => Duration::hours(4),
            Self::Day => Duration::days(1),
            Self::Trip => Duration::days(7),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::Day => "day",
            Self::Trip => "trip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeReason {
    Deadline,
    Travel,
    Family,
    Health,
    Other,
}

impl EnvelopeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deadline => "deadline",
            Self::Travel => "travel",
            Self::Family => "family",
            Self::Health => "health",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeState {
    Active,
    Stopped,
    Expired,
}

impl EnvelopeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stopped => "stopped",
            Self::Expired => "expired",
        }
    }
}

/// A temporary, person-declared mode that raises attention for one circle.
///
/// `state` records only explicit transitions; expiry is derived on read by
/// [`AttentionEnvelope::state_at`]. `started_at` is the 15-minute bucket that
/// feeds the hash, while `expires_at` runs from the exact start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionEnvelope {
    pub envelope_hash: String,
    pub circle_id_hash: String,
    pub kind: EnvelopeKind,
    pub duration: EnvelopeDuration,
    pub reason: EnvelopeReason,
    pub state: EnvelopeState,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AttentionEnvelope {
    pub fn state_at(&self, now: OffsetDateTime) -> EnvelopeState {
        match self.state {
            EnvelopeState::Active if now >= self.expires_at => EnvelopeState::Expired,
            state => state,
        }
    }

    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        self.state_at(now) == EnvelopeState::Active
    }
}

/// Bounded adjustment an envelope applies before the baseline lookup. Each
/// component is 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvelopeEffect {
    pub horizon_shift: u8,
    pub magnitude_bias: u8,
    pub cap_delta: u8,
}

impl EnvelopeEffect {
    pub const NONE: EnvelopeEffect = EnvelopeEffect {
        horizon_shift: 0,
        magnitude_bias: 0,
        cap_delta: 0,
    };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}
