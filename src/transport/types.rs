use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::delivery::types::{DeliveryReason, TransportKind};

pub const PUSH_TITLE: &str = "Something is waiting";
pub const PUSH_BODY: &str = "Open hush when you have a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureBucket {
    None,
    NotConfigured,
    NotPermitted,
    TransportError,
}

impl FailureBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::NotConfigured => "not_configured",
            Self::NotPermitted => "not_permitted",
            Self::TransportError => "transport_error",
        }
    }

    /// Delivery reason recorded when an accepted attempt fails with this
    /// bucket. `None` means the attempt was delivered.
    pub fn delivery_reason(self) -> DeliveryReason {
        match self {
            Self::None => DeliveryReason::Delivered,
            Self::NotConfigured => DeliveryReason::NotConfigured,
            Self::NotPermitted => DeliveryReason::NotPermitted,
            Self::TransportError => DeliveryReason::TransportError,
        }
    }
}

/// Everything a sender receives. Identifies the device only by token hash and
/// carries no candidate data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub provider_kind: TransportKind,
    pub token_hash: String,
    pub status_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResult {
    pub success: bool,
    pub failure: FailureBucket,
    pub response_hash: String,
}

impl TransportResult {
    pub fn delivered(response_hash: String) -> Self {
        Self {
            success: true,
            failure: FailureBucket::None,
            response_hash,
        }
    }

    pub fn failed(failure: FailureBucket, response_hash: String) -> Self {
        Self {
            success: false,
            failure,
            response_hash,
        }
    }
}

/// The only user-visible text any transport sends. Built once by the
/// composition root and shared by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPayload {
    title: &'static str,
    body: &'static str,
}

impl Default for PushPayload {
    fn default() -> Self {
        Self {
            title: PUSH_TITLE,
            body: PUSH_BODY,
        }
    }
}

impl PushPayload {
    pub fn title(&self) -> &'static str {
        self.title
    }

    pub fn body(&self) -> &'static str {
        self.body
    }

    pub fn webhook_body(&self, status_hash: &str) -> Value {
        json!({
            "title": self.title,
            "body": self.body,
            "status_hash": status_hash,
        })
    }

    pub fn apns_body(&self) -> Value {
        json!({
            "aps": {
                "alert": {
                    "title": self.title,
                    "body": self.body,
                },
                "sound": "default",
            }
        })
    }
}
