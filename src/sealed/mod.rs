//! The decrypt boundary. Plaintext provider tokens exist only inside this
//! module, for the duration of one send.

pub mod apns;
pub mod error;
pub mod jwt;
pub mod key;
mod plaintext;
pub mod store;

pub use apns::{APNS_PRODUCTION_URL, APNS_SANDBOX_URL, ApnsEnvironment, SealedPushTransport};
pub use error::SealedError;
pub use jwt::{ApnsCredentials, PROVIDER_TOKEN_LIFETIME, ProviderTokenCache};
pub use key::{SEALING_KEY_BYTES, SealingKey};
pub use store::SealedSecretStore;
