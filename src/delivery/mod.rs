pub mod noop;
pub mod orchestrator;
pub mod ports;
pub mod service;
pub mod types;

pub use orchestrator::{attempt_id, build_receipt, compute_delivery_run, status_hash};
pub use ports::{
    CandidateSource, DeviceSource, EnvelopeSource, PolicySource, PreviewSource, RateLimitSource,
    TrustSource,
};
pub use service::{DeliveryPorts, DeliveryRequest, DeliveryService};
pub use types::{
    DEFAULT_MAX_PER_DAY, DeliveryAttempt, DeliveryCandidate, DeliveryReason, DeliveryReceipt,
    DeliveryResult, DeliveryRun, DeliveryRunInput, PolicySnapshot, RateLimitDecision,
    TransportKind,
};
