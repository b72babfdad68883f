use std::path::PathBuf;

use thiserror::Error;

/// Failures at the decrypt boundary. None of these degrade to a weaker mode.
#[derive(Debug, Error)]
pub enum SealedError {
    #[error("sealing key is not configured")]
    KeyMissing,
    #[error("sealing key is not valid base64")]
    KeyEncoding,
    #[error("sealing key must be 32 bytes, got {actual}")]
    KeyLength { actual: usize },
    #[error("token must not be empty")]
    EmptyToken,
    #[error("token hash is not a 64-char hex digest")]
    InvalidTokenHash,
    #[error("no sealed token for the requested hash")]
    NotFound,
    #[error("sealing failed")]
    Encrypt,
    #[error("sealed token could not be opened")]
    Decrypt,
    #[error("sealed store i/o failed at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sealed record at '{path}' is malformed")]
    Malformed { path: PathBuf },
    #[error("provider credentials are invalid: {0}")]
    Credentials(String),
    #[error("sealed store lock poisoned")]
    LockPoisoned,
}

impl SealedError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
