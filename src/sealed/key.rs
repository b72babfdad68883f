use aes_gcm::{Aes256Gcm, Key, KeyInit};
use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::sealed::error::SealedError;

pub const SEALING_KEY_BYTES: usize = 32;
const DERIVATION_LABEL: &[u8] = b"hush/sealed-token/aes-256-gcm/v1";

/// AES-256-GCM key derived from the externally supplied master key. Key bytes
/// are wiped on drop.
pub struct SealingKey {
    derived: Zeroizing<[u8; SEALING_KEY_BYTES]>,
}

impl SealingKey {
    pub fn from_base64(encoded: &str) -> Result<Self, SealedError> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|_| SealedError::KeyEncoding)?,
        );
        Self::from_bytes(&decoded)
    }

    pub fn from_bytes(master: &[u8]) -> Result<Self, SealedError> {
        if master.len() != SEALING_KEY_BYTES {
            return Err(SealedError::KeyLength {
                actual: master.len(),
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(DERIVATION_LABEL);
        hasher.update([0u8]);
        hasher.update(master);
        let digest = hasher.finalize();

        let mut derived = Zeroizing::new([0u8; SEALING_KEY_BYTES]);
        derived.copy_from_slice(&digest);
        Ok(Self { derived })
    }

    pub(super) fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.derived.as_slice()))
    }
}
