use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::{
    audit::error::StoreError,
    delivery::types::TransportKind,
    registration::{
        store::RegistrationStore,
        types::{PushRegistration, RegistrationRequest, TokenKind},
    },
    sealed::{SealedError, SealedSecretStore},
};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Sealed(#[from] SealedError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A device registration as received, raw token included. The token is wiped
/// when this value drops.
#[derive(Deserialize)]
pub struct DeviceRegistration {
    pub circle_id_hash: String,
    pub device_fingerprint_hash: String,
    pub provider_kind: TransportKind,
    pub token_kind: TokenKind,
    pub raw_token: Zeroizing<String>,
}

/// Seals the raw token and records a registration that carries only its hash.
pub fn register_device(
    sealed: &SealedSecretStore,
    registrations: &RegistrationStore,
    device: DeviceRegistration,
) -> Result<PushRegistration, RegistrationError> {
    let token_hash = sealed.store_encrypted(device.raw_token.as_bytes())?;
    let request = RegistrationRequest {
        circle_id_hash: device.circle_id_hash,
        device_fingerprint_hash: device.device_fingerprint_hash,
        provider_kind: device.provider_kind,
        token_kind: device.token_kind,
        token_hash: token_hash.clone(),
    };

    match registrations.register(request) {
        Ok(registration) => Ok(registration),
        Err(err) => {
            // A rejected registration must not leave an orphaned ciphertext,
            // unless another registration already owns the token.
            if !registrations
                .snapshot()
                .iter()
                .any(|record| record.token_hash == token_hash)
            {
                sealed.delete(&token_hash)?;
            }
            Err(err.into())
        }
    }
}
