pub mod error;
pub mod log;
pub mod persistence;
pub mod records;
pub mod store;

pub use error::{StoreError, StoreErrorKind};
pub use log::{AppendOutcome, AuditLimits, AuditRecord, BoundedLog};
pub use persistence::AuditPersistence;
pub use records::{
    ATTEMPT_STORE, AttemptRecord, AttemptStore, RECEIPT_STORE, RESOLUTION_STORE, ReceiptRecord,
    ReceiptStore, ResolutionRecord, ResolutionStore,
};
pub use store::AuditStore;
