pub mod engine;
pub mod store;
pub mod types;

pub use engine::{apply_envelope, build_envelope, kind_effect, stop};
pub use store::EnvelopeStore;
pub use types::{
    AttentionEnvelope, EnvelopeDuration, EnvelopeEffect, EnvelopeKind, EnvelopeReason,
    EnvelopeState,
};
