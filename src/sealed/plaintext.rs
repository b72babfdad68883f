use zeroize::Zeroizing;

use crate::sealed::error::SealedError;

/// A decrypted provider token.
///
/// Only the sealed module can build or read one. It has no `Debug`,
/// `Display`, `Clone` or `Serialize`, so it cannot be logged, copied out or
/// persisted, and its bytes are wiped when it drops.
pub struct PlaintextToken {
    bytes: Zeroizing<Vec<u8>>,
}

impl PlaintextToken {
    pub(super) fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub(super) fn as_str(&self) -> Result<&str, SealedError> {
        std::str::from_utf8(&self.bytes).map_err(|_| SealedError::Decrypt)
    }
}
