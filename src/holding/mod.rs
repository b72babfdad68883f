pub mod engine;
pub mod store;
pub mod types;

pub use engine::{apply_contract, can_create_contract};
pub use store::{CreateOutcome, HoldingContractStore, HoldingRequest};
pub use types::{
    Eligibility, HoldingAction, HoldingContract, HoldingDuration, HoldingEffect, HoldingPressure,
    HoldingScope, HoldingState, HoldingSubject, IneligibleReason,
};
