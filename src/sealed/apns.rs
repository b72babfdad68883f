use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    delivery::types::TransportKind,
    sealed::{error::SealedError, jwt::ProviderTokenCache, store::SealedSecretStore},
    transport::{
        Transport,
        http_common::{build_client, response_hash, send_once},
        types::{FailureBucket, PushPayload, TransportRequest, TransportResult},
    },
};

pub const APNS_PRODUCTION_URL: &str = "https://api.push.apple.com";
pub const APNS_SANDBOX_URL: &str = "https://api.sandbox.push.apple.com";
/// Low priority; delivery is never urgent by transport.
pub const APNS_PRIORITY: &str = "5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApnsEnvironment {
    #[default]
    Production,
    Sandbox,
}

impl ApnsEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Production => APNS_PRODUCTION_URL,
            Self::Sandbox => APNS_SANDBOX_URL,
        }
    }
}

/// The only sender that opens sealed tokens.
pub struct SealedPushTransport {
    client: Client,
    base_url: String,
    store: Arc<SealedSecretStore>,
    tokens: Arc<ProviderTokenCache>,
    payload: Arc<PushPayload>,
}

impl SealedPushTransport {
    pub fn new(
        environment: ApnsEnvironment,
        timeout: Duration,
        store: Arc<SealedSecretStore>,
        tokens: Arc<ProviderTokenCache>,
        payload: Arc<PushPayload>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: environment.base_url().to_string(),
            store,
            tokens,
            payload,
        })
    }

    /// Points the transport at another provider host, e.g. a local endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builds the provider request. The decrypted token is dropped before
    /// this returns, ahead of any network await.
    fn prepare(&self, token_hash: &str) -> Result<RequestBuilder, SealedError> {
        let bearer = self.tokens.bearer()?;
        let token = self.store.open_token(token_hash)?;
        let url = format!("{}/3/device/{}", self.base_url, token.as_str()?);

        Ok(self
            .client
            .post(url)
            .header(header::AUTHORIZATION, format!("bearer {bearer}"))
            .header("apns-topic", self.tokens.credentials().bundle_id())
            .header("apns-push-type", "alert")
            .header("apns-priority", APNS_PRIORITY)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&self.payload.apns_body()))
    }
}

fn boundary_failure(err: &SealedError) -> FailureBucket {
    match err {
        // No sealed token means the registration is dead and can be pruned.
        SealedError::NotFound | SealedError::InvalidTokenHash => FailureBucket::NotConfigured,
        _ => FailureBucket::TransportError,
    }
}

#[async_trait]
impl Transport for SealedPushTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Apns
    }

    async fn send(&self, cancel: &CancellationToken, request: TransportRequest) -> TransportResult {
        let builder = match self.prepare(&request.token_hash) {
            Ok(builder) => builder,
            Err(err) => {
                let failure = boundary_failure(&err);
                tracing::warn!(
                    target: "sealed",
                    token_hash = %request.token_hash,
                    failure = failure.as_str(),
                    error = %err,
                    "sealed_send_refused"
                );
                return TransportResult::failed(failure, response_hash(0, failure.as_str()));
            }
        };

        send_once(cancel, builder, "apns").await
    }
}
