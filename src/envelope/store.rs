use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use time::OffsetDateTime;

use crate::{
    audit::error::{StoreError, internal_error, invalid_request},
    clock::Clock,
    delivery::ports::EnvelopeSource,
    envelope::{
        engine::{build_envelope, stop},
        types::{AttentionEnvelope, EnvelopeDuration, EnvelopeKind, EnvelopeReason},
    },
};

/// At most one envelope per circle; starting a new one replaces the old.
pub struct EnvelopeStore {
    clock: Arc<dyn Clock>,
    envelopes: Mutex<BTreeMap<String, AttentionEnvelope>>,
}

impl EnvelopeStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            envelopes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn start(
        &self,
        circle_id_hash: &str,
        kind: EnvelopeKind,
        duration: EnvelopeDuration,
        reason: EnvelopeReason,
    ) -> Result<AttentionEnvelope, StoreError> {
        if circle_id_hash.is_empty() {
            return Err(invalid_request("envelope circle cannot be empty"));
        }
        let envelope = build_envelope(circle_id_hash, kind, duration, reason, self.clock.now())
            .map_err(|err| invalid_request(err.to_string()))?;

        self.lock()?
            .insert(circle_id_hash.to_string(), envelope.clone());
        tracing::debug!(
            target: "envelope",
            envelope_hash = %envelope.envelope_hash,
            kind = envelope.kind.as_str(),
            duration = envelope.duration.as_str(),
            "envelope_started"
        );
        Ok(envelope)
    }

    /// Returns the stopped envelope, or `None` if the circle had none.
    pub fn stop(&self, circle_id_hash: &str) -> Result<Option<AttentionEnvelope>, StoreError> {
        let mut envelopes = self.lock()?;
        Ok(envelopes.get_mut(circle_id_hash).map(|envelope| {
            stop(envelope);
            envelope.clone()
        }))
    }

    pub fn get(&self, circle_id_hash: &str) -> Option<AttentionEnvelope> {
        self.lock()
            .ok()
            .and_then(|envelopes| envelopes.get(circle_id_hash).cloned())
    }

    pub fn active_for(&self, circle_id_hash: &str, now: OffsetDateTime) -> Option<AttentionEnvelope> {
        self.get(circle_id_hash)
            .filter(|envelope| envelope.is_active_at(now))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, AttentionEnvelope>>, StoreError> {
        self.envelopes
            .lock()
            .map_err(|_| internal_error("envelope store lock poisoned"))
    }
}

impl EnvelopeSource for EnvelopeStore {
    fn envelope_active(&self, circle_id_hash: &str, now: OffsetDateTime) -> bool {
        self.active_for(circle_id_hash, now).is_some()
    }
}

/// A single supplied record answers only for its own circle.
impl EnvelopeSource for AttentionEnvelope {
    fn envelope_active(&self, circle_id_hash: &str, now: OffsetDateTime) -> bool {
        self.circle_id_hash == circle_id_hash && self.is_active_at(now)
    }
}
