use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    audit::{
        error::{StoreError, internal_error},
        log::{AppendOutcome, AuditLimits, AuditRecord, BoundedLog},
        persistence::AuditPersistence,
    },
    clock::Clock,
};

/// One bounded log behind one exclusive lock, optionally mirrored to disk.
pub struct AuditStore<R> {
    name: &'static str,
    log: Mutex<BoundedLog<R>>,
    persistence: Option<AuditPersistence>,
    clock: Arc<dyn Clock>,
}

impl<R: AuditRecord> AuditStore<R> {
    pub fn in_memory(name: &'static str, limits: AuditLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            log: Mutex::new(BoundedLog::new(limits)),
            persistence: None,
            clock,
        }
    }

    pub fn persistent(
        name: &'static str,
        limits: AuditLimits,
        clock: Arc<dyn Clock>,
        persistence: AuditPersistence,
    ) -> Result<Self, StoreError> {
        let records = persistence.load::<R>()?.unwrap_or_default();
        let log = BoundedLog::from_records(limits, records, clock.now());
        Ok(Self {
            name,
            log: Mutex::new(log),
            persistence: Some(persistence),
            clock,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn append(&self, record: R) -> Result<AppendOutcome, StoreError> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let outcome = guard.append(record, now);

        if let AppendOutcome::Appended { evicted } = outcome {
            if evicted > 0 {
                tracing::debug!(
                    target: "audit",
                    store = self.name,
                    evicted = evicted,
                    remaining = guard.count(),
                    "audit_records_evicted"
                );
            }
            self.flush_locked(&guard)?;
        }

        Ok(outcome)
    }

    /// Applies retention without appending.
    pub fn prune(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let evicted = guard.evict(now);
        if evicted > 0 {
            self.flush_locked(&guard)?;
        }
        Ok(evicted)
    }

    pub fn count(&self) -> usize {
        self.lock().map(|guard| guard.count()).unwrap_or(0)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock()
            .map(|guard| guard.contains_key(key))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> Vec<R> {
        self.lock().map(|guard| guard.to_vec()).unwrap_or_default()
    }

    /// Runs `read` against the records while holding the lock.
    pub fn read<T>(&self, read: impl FnOnce(&BoundedLog<R>) -> T) -> Result<T, StoreError> {
        let guard = self.lock()?;
        Ok(read(&*guard))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BoundedLog<R>>, StoreError> {
        self.log
            .lock()
            .map_err(|_| internal_error(format!("audit store '{}' lock poisoned", self.name)))
    }

    fn flush_locked(&self, log: &BoundedLog<R>) -> Result<(), StoreError> {
        match &self.persistence {
            Some(persistence) => persistence.save(self.name, &log.to_vec()),
            None => Ok(()),
        }
    }
}
