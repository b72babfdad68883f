use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, header};
use tokio_util::sync::CancellationToken;

use crate::{
    delivery::types::TransportKind,
    transport::{
        Transport,
        http_common::{build_client, send_once},
        types::{PushPayload, TransportRequest, TransportResult},
    },
};

/// Posts the constant payload plus status hash to one configured endpoint.
pub struct WebhookTransport {
    client: Client,
    url: String,
    payload: Arc<PushPayload>,
}

impl WebhookTransport {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        payload: Arc<PushPayload>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            payload,
        })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Webhook
    }

    async fn send(&self, cancel: &CancellationToken, request: TransportRequest) -> TransportResult {
        let builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&self.payload.webhook_body(&request.status_hash));
        send_once(cancel, builder, "webhook").await
    }
}
