pub mod http_common;
pub mod stub;
pub mod types;
pub mod webhook;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::delivery::types::TransportKind;

pub use http_common::{DEFAULT_TIMEOUT_MS, clamp_timeout, map_status, response_hash};
pub use stub::StubTransport;
pub use types::{FailureBucket, PushPayload, TransportRequest, TransportResult};
pub use webhook::WebhookTransport;

/// One push sender. Each `send` makes at most one network attempt and never
/// retries.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn send(&self, cancel: &CancellationToken, request: TransportRequest) -> TransportResult;
}
