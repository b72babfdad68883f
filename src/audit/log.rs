use std::collections::{HashSet, VecDeque};

use serde::{Serialize, de::DeserializeOwned};
use time::{Duration, OffsetDateTime};

pub const DEFAULT_MAX_RECORDS: usize = 200;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

pub trait AuditRecord: Clone + Serialize + DeserializeOwned + Send {
    /// Idempotency key; appending a record whose key is present is a no-op.
    fn record_key(&self) -> String;
    fn recorded_at(&self) -> OffsetDateTime;

    /// Pinned records are skipped by count eviction and leave only through
    /// retention.
    fn pinned(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditLimits {
    pub max_records: usize,
    pub retention: Duration,
}

impl Default for AuditLimits {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }
}

impl AuditLimits {
    pub fn new(max_records: usize, retention: Duration) -> Self {
        Self {
            max_records: max_records.max(1),
            retention,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { evicted: usize },
    Duplicate,
}

/// Append-only record list bounded by age, and by count (FIFO over unpinned
/// records).
#[derive(Debug, Clone)]
pub struct BoundedLog<R> {
    limits: AuditLimits,
    records: VecDeque<R>,
    keys: HashSet<String>,
}

impl<R: AuditRecord> BoundedLog<R> {
    pub fn new(limits: AuditLimits) -> Self {
        Self {
            limits,
            records: VecDeque::new(),
            keys: HashSet::new(),
        }
    }

    pub fn from_records(limits: AuditLimits, records: Vec<R>, now: OffsetDateTime) -> Self {
        let mut log = Self::new(limits);
        for record in records {
            if log.keys.insert(record.record_key()) {
                log.records.push_back(record);
            }
        }
        log.evict(now);
        log
    }

    pub fn limits(&self) -> AuditLimits {
        self.limits
    }

    pub fn append(&mut self, record: R, now: OffsetDateTime) -> AppendOutcome {
        let key = record.record_key();
        if self.keys.contains(&key) {
            return AppendOutcome::Duplicate;
        }

        self.keys.insert(key);
        self.records.push_back(record);
        AppendOutcome::Appended {
            evicted: self.evict(now),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &R> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<R> {
        self.records.iter().cloned().collect()
    }

    /// Drops records past the retention window, then the oldest unpinned
    /// records past the count limit. Returns the number removed.
    pub fn evict(&mut self, now: OffsetDateTime) -> usize {
        let cutoff = now - self.limits.retention;
        let before = self.records.len();

        // A clock can step back, so expired records are not always at the front.
        let keys = &mut self.keys;
        self.records.retain(|record| {
            let keep = record.recorded_at() >= cutoff;
            if !keep {
                keys.remove(&record.record_key());
            }
            keep
        });

        while self.records.len() > self.limits.max_records {
            let Some(index) = self.records.iter().position(|record| !record.pinned()) else {
                break;
            };
            if let Some(removed) = self.records.remove(index) {
                self.keys.remove(&removed.record_key());
            }
        }

        before - self.records.len()
    }
}
