// Library target exists so integration tests can drive the engines directly.
pub mod audit;
pub mod canonical;
pub mod cli;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod envelope;
pub mod escalation;
pub mod holding;
pub mod logging;
pub mod registration;
pub mod runtime;
pub mod sealed;
pub mod secrets;
pub mod transport;
pub mod vendor;
