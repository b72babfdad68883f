use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    audit::{
        error::StoreError,
        records::{AttemptRecord, AttemptStore, ReceiptRecord, ReceiptStore},
    },
    clock::Clock,
    delivery::{
        orchestrator::{build_receipt, compute_delivery_run},
        ports::{CandidateSource, DeviceSource, PolicySource, RateLimitSource, TrustSource},
        types::{DeliveryReason, DeliveryRun, DeliveryRunInput},
    },
    transport::{
        Transport,
        types::{FailureBucket, TransportRequest},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub circle_id_hash: String,
    pub period_key: String,
    pub candidate_hashes: Vec<String>,
}

/// Read contracts the service consumes; owned elsewhere.
#[derive(Clone)]
pub struct DeliveryPorts {
    pub candidates: Arc<dyn CandidateSource>,
    pub policy: Arc<dyn PolicySource>,
    pub devices: Arc<dyn DeviceSource>,
    pub rate_limit: Arc<dyn RateLimitSource>,
    pub trust: Arc<dyn TrustSource>,
}

/// Runs one explicitly requested delivery: gather inputs, decide, send
/// accepted attempts one at a time, record everything.
pub struct DeliveryService {
    ports: DeliveryPorts,
    transport: Arc<dyn Transport>,
    attempts: Arc<AttemptStore>,
    receipts: Arc<ReceiptStore>,
    clock: Arc<dyn Clock>,
    max_per_day: u32,
}

impl DeliveryService {
    pub fn new(
        ports: DeliveryPorts,
        transport: Arc<dyn Transport>,
        attempts: Arc<AttemptStore>,
        receipts: Arc<ReceiptStore>,
        clock: Arc<dyn Clock>,
        max_per_day: u32,
    ) -> Self {
        Self {
            ports,
            transport,
            attempts,
            receipts,
            clock,
            max_per_day,
        }
    }

    /// Reads every input of a run. A store that cannot answer aborts the run
    /// rather than reading as "nothing sent yet".
    pub fn gather(&self, request: &DeliveryRequest) -> Result<DeliveryRunInput, StoreError> {
        let circle = request.circle_id_hash.as_str();
        let period = request.period_key.as_str();

        let candidates = request
            .candidate_hashes
            .iter()
            .filter_map(|hash| {
                let candidate = self.ports.candidates.candidate(circle, hash);
                if candidate.is_none() {
                    tracing::debug!(target: "delivery", candidate_hash = %hash, "candidate_missing");
                }
                candidate
            })
            .collect();

        let registration = self.ports.devices.registration(circle);
        let push_enabled = registration
            .as_ref()
            .is_some_and(|registration| registration.provider_kind == self.transport.kind());

        Ok(DeliveryRunInput {
            circle_id_hash: request.circle_id_hash.clone(),
            period_key: request.period_key.clone(),
            candidates,
            sent_today: self.attempts.sent_count(circle, period)?,
            max_per_day: self.max_per_day,
            policy: self.ports.policy.policy(circle),
            trust_fragile: self.ports.trust.is_fragile(circle),
            push_enabled,
            rate_limit: self.ports.rate_limit.check(circle, period),
            already_sent: self.attempts.sent_candidates(circle, period)?,
            transport_kind: self.transport.kind(),
        })
    }

    /// Each attempt is appended before the next send. Once an append fails no
    /// further sends happen; the remaining outcomes and the receipt are still
    /// written where possible and the first error is returned.
    pub async fn deliver(
        &self,
        cancel: &CancellationToken,
        request: &DeliveryRequest,
    ) -> Result<DeliveryRun, StoreError> {
        let input = self.gather(request)?;
        let mut run = compute_delivery_run(&input);
        let registration = self.ports.devices.registration(&request.circle_id_hash);

        let mut dead_token = false;
        let mut store_error = None;
        for attempt in run.attempts.iter_mut() {
            let mut response_hash = None;
            if attempt.is_sent() {
                match registration.as_ref() {
                    _ if store_error.is_some() => {
                        attempt.mark_failed(DeliveryReason::TransportError);
                    }
                    None => attempt.mark_failed(DeliveryReason::NotConfigured),
                    Some(_) if dead_token => attempt.mark_failed(DeliveryReason::NotConfigured),
                    Some(registration) => {
                        let result = self
                            .transport
                            .send(
                                cancel,
                                TransportRequest {
                                    provider_kind: registration.provider_kind,
                                    token_hash: registration.token_hash.clone(),
                                    status_hash: attempt.status_hash.clone(),
                                },
                            )
                            .await;

                        if !result.success {
                            attempt.mark_failed(result.failure.delivery_reason());
                            if result.failure == FailureBucket::NotConfigured {
                                dead_token = true;
                                self.ports.devices.mark_token_gone(&registration.token_hash);
                            }
                        }
                        response_hash = Some(result.response_hash);
                    }
                }
            }

            let record = AttemptRecord {
                attempt: attempt.clone(),
                response_hash,
                recorded_at: self.clock.now(),
            };
            if let Err(err) = self.attempts.append(record) {
                tracing::warn!(
                    target: "delivery",
                    attempt_id = %attempt.attempt_id,
                    error = %err,
                    "delivery_attempt_record_failed"
                );
                store_error.get_or_insert(err);
            }
        }

        run.receipt = build_receipt(&input.circle_id_hash, &input.period_key, &run.attempts);
        let receipt = ReceiptRecord {
            receipt: run.receipt.clone(),
            recorded_at: self.clock.now(),
        };
        if let Err(err) = self.receipts.append(receipt) {
            store_error.get_or_insert(err);
        }
        if let Some(err) = store_error {
            return Err(err);
        }

        tracing::info!(
            target: "delivery",
            receipt_hash = %run.receipt.receipt_hash,
            transport = self.transport.kind().as_str(),
            sent = run.receipt.sent,
            skipped = run.receipt.skipped,
            deduped = run.receipt.deduped,
            "delivery_run_completed"
        );
        Ok(run)
    }
}
