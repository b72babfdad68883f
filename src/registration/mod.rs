pub mod service;
pub mod store;
pub mod types;

pub use service::{DeviceRegistration, RegistrationError, register_device};
pub use store::{REGISTRATION_STORE, RegistrationStore};
pub use types::{PushRegistration, RegistrationRequest, TokenKind};
