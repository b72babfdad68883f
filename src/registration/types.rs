use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::delivery::types::TransportKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Device,
    Endpoint,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Endpoint => "endpoint",
        }
    }
}

/// A device's push channel for one circle. Holds the hash of the provider
/// token, never the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRegistration {
    pub registration_id: String,
    pub circle_id_hash: String,
    pub device_fingerprint_hash: String,
    pub provider_kind: TransportKind,
    pub token_kind: TokenKind,
    pub token_hash: String,
    pub enabled: bool,
    #[serde(default)]
    pub superseded: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
}

impl PushRegistration {
    pub fn is_active(&self) -> bool {
        self.enabled && !self.superseded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub circle_id_hash: String,
    pub device_fingerprint_hash: String,
    pub provider_kind: TransportKind,
    pub token_kind: TokenKind,
    pub token_hash: String,
}
