use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    audit::{
        error::{StoreError, conflict, internal_error, invalid_request},
        log::AuditLimits,
        persistence::AuditPersistence,
    },
    canonical::{CanonicalString, contains_delimiter, is_content_hash},
    clock::Clock,
    delivery::ports::DeviceSource,
    registration::types::{PushRegistration, RegistrationRequest},
};

pub const REGISTRATION_STORE: &str = "registrations";

/// Registration history. Re-registration appends a new record and flags the
/// previous one as superseded; records are otherwise never edited.
pub struct RegistrationStore {
    limits: AuditLimits,
    records: Mutex<Vec<PushRegistration>>,
    persistence: Option<AuditPersistence>,
    clock: Arc<dyn Clock>,
}

impl RegistrationStore {
    pub fn in_memory(limits: AuditLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            records: Mutex::new(Vec::new()),
            persistence: None,
            clock,
        }
    }

    pub fn persistent(
        limits: AuditLimits,
        clock: Arc<dyn Clock>,
        persistence: AuditPersistence,
    ) -> Result<Self, StoreError> {
        let records = persistence
            .load::<PushRegistration>()?
            .unwrap_or_default();
        Ok(Self {
            limits,
            records: Mutex::new(records),
            persistence: Some(persistence),
            clock,
        })
    }

    pub fn register(&self, request: RegistrationRequest) -> Result<PushRegistration, StoreError> {
        validate(&request)?;

        let now = self.clock.now();
        let mut records = self.lock()?;

        if records.iter().any(|record| {
            record.token_hash == request.token_hash
                && record.circle_id_hash != request.circle_id_hash
        }) {
            return Err(conflict("token is bound to another circle"));
        }

        for record in records.iter_mut().filter(|record| {
            !record.superseded
                && record.circle_id_hash == request.circle_id_hash
                && (record.device_fingerprint_hash == request.device_fingerprint_hash
                    || record.token_hash == request.token_hash)
        }) {
            record.superseded = true;
        }

        let registered_at = now.unix_timestamp().to_string();
        let registration_id = CanonicalString::new("PUSH_REGISTRATION")
            .and_then(|builder| {
                builder.push_all([
                    request.circle_id_hash.as_str(),
                    request.device_fingerprint_hash.as_str(),
                    request.provider_kind.as_str(),
                    request.token_kind.as_str(),
                    request.token_hash.as_str(),
                    registered_at.as_str(),
                ])
            })
            .map_err(|err| invalid_request(err.to_string()))?
            .short_hash();

        let registration = PushRegistration {
            registration_id,
            circle_id_hash: request.circle_id_hash,
            device_fingerprint_hash: request.device_fingerprint_hash,
            provider_kind: request.provider_kind,
            token_kind: request.token_kind,
            token_hash: request.token_hash,
            enabled: true,
            superseded: false,
            registered_at: now,
        };
        records.push(registration.clone());
        self.evict_locked(&mut records);
        self.flush_locked(&records)?;

        tracing::info!(
            target: "registration",
            registration_id = %registration.registration_id,
            provider = registration.provider_kind.as_str(),
            "push_registration_recorded"
        );
        Ok(registration)
    }

    /// Supersedes every active registration for `token_hash` with a disabled
    /// copy. Returns how many were disabled.
    pub fn disable(&self, token_hash: &str) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut records = self.lock()?;

        let mut disabled = Vec::new();
        for record in records
            .iter_mut()
            .filter(|record| record.token_hash == token_hash && record.is_active())
        {
            record.superseded = true;
            disabled.push(PushRegistration {
                enabled: false,
                superseded: false,
                registered_at: now,
                ..record.clone()
            });
        }

        let count = disabled.len();
        if count > 0 {
            records.extend(disabled);
            self.evict_locked(&mut records);
            self.flush_locked(&records)?;
            tracing::info!(
                target: "registration",
                disabled = count,
                "push_registration_disabled"
            );
        }
        Ok(count)
    }

    /// Latest enabled registration for the circle.
    pub fn active_for(&self, circle_id_hash: &str) -> Option<PushRegistration> {
        self.lock().ok().and_then(|records| {
            records
                .iter()
                .rev()
                .find(|record| record.circle_id_hash == circle_id_hash && record.is_active())
                .cloned()
        })
    }

    pub fn count(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> Vec<PushRegistration> {
        self.lock().map(|records| records.clone()).unwrap_or_default()
    }

    /// Applies retention without registering anything.
    pub fn prune(&self) -> Result<usize, StoreError> {
        let mut records = self.lock()?;
        let evicted = self.evict_locked(&mut records);
        if evicted > 0 {
            self.flush_locked(&records)?;
        }
        Ok(evicted)
    }

    /// Inactive history goes first; active registrations only fall out when
    /// they alone exceed the count limit.
    fn evict_locked(&self, records: &mut Vec<PushRegistration>) -> usize {
        let before = records.len();
        let cutoff = self.clock.now() - self.limits.retention;
        records.retain(|record| record.is_active() || record.registered_at >= cutoff);

        while records.len() > self.limits.max_records {
            let index = records
                .iter()
                .position(|record| !record.is_active())
                .unwrap_or(0);
            records.remove(index);
        }

        before - records.len()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<PushRegistration>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| internal_error("registration store lock poisoned"))
    }

    fn flush_locked(&self, records: &[PushRegistration]) -> Result<(), StoreError> {
        match &self.persistence {
            Some(persistence) => persistence.save(REGISTRATION_STORE, records),
            None => Ok(()),
        }
    }
}

fn validate(request: &RegistrationRequest) -> Result<(), StoreError> {
    if request.circle_id_hash.is_empty() || contains_delimiter(&request.circle_id_hash) {
        return Err(invalid_request("registration circle is invalid"));
    }
    if request.device_fingerprint_hash.is_empty()
        || contains_delimiter(&request.device_fingerprint_hash)
    {
        return Err(invalid_request("device fingerprint is invalid"));
    }
    if !is_content_hash(&request.token_hash) {
        return Err(invalid_request("token hash must be 64 lowercase hex chars"));
    }
    Ok(())
}

impl DeviceSource for RegistrationStore {
    fn registration(&self, circle_id_hash: &str) -> Option<PushRegistration> {
        self.active_for(circle_id_hash)
    }

    fn mark_token_gone(&self, token_hash: &str) {
        if let Err(err) = self.disable(token_hash) {
            tracing::warn!(
                target: "registration",
                error = %err,
                "push_registration_prune_failed"
            );
        }
    }
}
