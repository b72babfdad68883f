use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tokio_util::sync::CancellationToken;

use crate::{
    canonical::{CanonicalString, sha256_hex},
    transport::types::{FailureBucket, TransportResult},
};

pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const MIN_TIMEOUT_MS: u64 = 10_000;
pub const MAX_TIMEOUT_MS: u64 = 30_000;
pub const RESPONSE_BODY_HASH_CHARS: usize = 256;

pub fn clamp_timeout(timeout_ms: u64) -> Duration {
    Duration::from_millis(timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
}

/// Client with no retry or redirect behavior; one request is one attempt.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
}

pub fn map_status(status: u16) -> FailureBucket {
    match status {
        200..=299 => FailureBucket::None,
        404 | 410 => FailureBucket::NotConfigured,
        401 | 403 => FailureBucket::NotPermitted,
        _ => FailureBucket::TransportError,
    }
}

/// Audit digest of a provider response. The body is hashed after truncation
/// and then dropped.
pub fn response_hash(status: u16, body: &str) -> String {
    let truncated = body.chars().take(RESPONSE_BODY_HASH_CHARS).collect::<String>();
    let body_digest = sha256_hex(truncated.as_bytes());
    let status = status.to_string();
    CanonicalString::new("PUSH_RESPONSE")
        .and_then(|builder| builder.push_all([status.as_str(), body_digest.as_str()]))
        .map(CanonicalString::short_hash)
        .unwrap_or(body_digest)
}

pub fn result_from_status(status: u16, body: &str) -> TransportResult {
    let hash = response_hash(status, body);
    match map_status(status) {
        FailureBucket::None => TransportResult::delivered(hash),
        failure => TransportResult::failed(failure, hash),
    }
}

/// Issues `request` exactly once. Cancellation and timeouts surface as
/// `transport_error`.
pub async fn send_once(
    cancel: &CancellationToken,
    request: RequestBuilder,
    transport: &'static str,
) -> TransportResult {
    let exchange = async {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok::<_, reqwest::Error>((status, body))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(target: "transport", transport = transport, "push_send_cancelled");
            TransportResult::failed(FailureBucket::TransportError, response_hash(0, ""))
        }
        outcome = exchange => match outcome {
            Ok((status, body)) => {
                let result = result_from_status(status, &body);
                tracing::info!(
                    target: "transport",
                    transport = transport,
                    status = status,
                    failure = result.failure.as_str(),
                    response_hash = %result.response_hash,
                    "push_send_completed"
                );
                result
            }
            Err(err) => {
                // reqwest errors render the request URL, which can embed a
                // device token; log only the error class.
                let error_kind = if err.is_timeout() {
                    "timeout"
                } else if err.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                tracing::warn!(
                    target: "transport",
                    transport = transport,
                    error_kind = error_kind,
                    "push_send_failed"
                );
                TransportResult::failed(FailureBucket::TransportError, response_hash(0, ""))
            }
        }
    }
}
