use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    delivery::types::TransportKind,
    transport::{
        Transport,
        http_common::response_hash,
        types::{FailureBucket, TransportRequest, TransportResult},
    },
};

/// Accepts every request without touching the network.
#[derive(Debug, Default)]
pub struct StubTransport {
    calls: AtomicUsize,
    failure: Option<FailureBucket>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stub that reports `failure` for every request.
    pub fn failing(failure: FailureBucket) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failure: Some(failure).filter(|failure| *failure != FailureBucket::None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stub
    }

    async fn send(&self, cancel: &CancellationToken, request: TransportRequest) -> TransportResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return TransportResult::failed(FailureBucket::TransportError, response_hash(0, ""));
        }

        match self.failure {
            Some(failure) => TransportResult::failed(failure, response_hash(0, failure.as_str())),
            None => TransportResult::delivered(response_hash(200, &request.status_hash)),
        }
    }
}
