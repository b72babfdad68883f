use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use aes_gcm::{
    Nonce,
    aead::{Aead, Payload},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};

use crate::{
    canonical::{is_content_hash, sha256_hex},
    sealed::{error::SealedError, key::SealingKey, plaintext::PlaintextToken},
};

const NONCE_BYTES: usize = 12;
const SEALED_EXTENSION: &str = "sealed";
const SEALED_VERSION: u64 = 1;

#[derive(Clone)]
struct SealedRecord {
    nonce: [u8; NONCE_BYTES],
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct SealedFile {
    version: u64,
    nonce: String,
    ciphertext: String,
}

/// Ciphertext of provider tokens keyed by the SHA-256 of the raw token.
///
/// There is no API that lists tokens or returns plaintext outside this
/// module.
pub struct SealedSecretStore {
    key: SealingKey,
    data_dir: Option<PathBuf>,
    records: Mutex<HashMap<String, SealedRecord>>,
}

impl SealedSecretStore {
    /// Opens the store, loading any ciphertext files under `data_dir`.
    pub fn open(key: SealingKey, data_dir: Option<PathBuf>) -> Result<Self, SealedError> {
        let mut records = HashMap::new();
        if let Some(dir) = &data_dir {
            create_private_dir(dir)?;
            for entry in fs::read_dir(dir).map_err(|err| SealedError::io(dir, err))? {
                let path = entry.map_err(|err| SealedError::io(dir, err))?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some(SEALED_EXTENSION) {
                    continue;
                }
                let Some(token_hash) = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .filter(|stem| is_content_hash(stem))
                    .map(str::to_string)
                else {
                    continue;
                };
                records.insert(token_hash, read_record(&path)?);
            }
        }

        tracing::info!(
            target: "sealed",
            persistent = data_dir.is_some(),
            sealed_tokens = records.len(),
            "sealed_store_opened"
        );

        Ok(Self {
            key,
            data_dir,
            records: Mutex::new(records),
        })
    }

    /// Seals `raw` and returns its token hash. Sealing the same token again
    /// replaces the ciphertext under the same hash.
    pub fn store_encrypted(&self, raw: &[u8]) -> Result<String, SealedError> {
        if raw.is_empty() {
            return Err(SealedError::EmptyToken);
        }
        let token_hash = sha256_hex(raw);

        let mut nonce = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .key
            .cipher()
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: raw,
                    aad: token_hash.as_bytes(),
                },
            )
            .map_err(|_| SealedError::Encrypt)?;
        let record = SealedRecord { nonce, ciphertext };

        let mut records = self.lock()?;
        if let Some(dir) = &self.data_dir {
            write_record(&record_path(dir, &token_hash), &record)?;
        }
        records.insert(token_hash.clone(), record);

        tracing::debug!(target: "sealed", token_hash = %token_hash, "token_sealed");
        Ok(token_hash)
    }

    pub fn exists(&self, token_hash: &str) -> bool {
        self.lock()
            .map(|records| records.contains_key(token_hash))
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    /// Returns whether anything was deleted.
    pub fn delete(&self, token_hash: &str) -> Result<bool, SealedError> {
        if !is_content_hash(token_hash) {
            return Err(SealedError::InvalidTokenHash);
        }
        let mut records = self.lock()?;
        let removed = records.remove(token_hash).is_some();
        if let Some(dir) = &self.data_dir {
            let path = record_path(dir, token_hash);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(SealedError::io(path, err)),
            }
        }
        Ok(removed)
    }

    pub(super) fn open_token(&self, token_hash: &str) -> Result<PlaintextToken, SealedError> {
        let record = self
            .lock()?
            .get(token_hash)
            .cloned()
            .ok_or(SealedError::NotFound)?;

        let plaintext = self
            .key
            .cipher()
            .decrypt(
                Nonce::from_slice(&record.nonce),
                Payload {
                    msg: &record.ciphertext,
                    aad: token_hash.as_bytes(),
                },
            )
            .map_err(|_| SealedError::Decrypt)?;
        Ok(PlaintextToken::new(plaintext))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SealedRecord>>, SealedError> {
        self.records.lock().map_err(|_| SealedError::LockPoisoned)
    }
}

fn record_path(dir: &Path, token_hash: &str) -> PathBuf {
    dir.join(format!("{token_hash}.{SEALED_EXTENSION}"))
}

fn read_record(path: &Path) -> Result<SealedRecord, SealedError> {
    let content = fs::read_to_string(path).map_err(|err| SealedError::io(path, err))?;
    let malformed = || SealedError::Malformed {
        path: path.to_path_buf(),
    };
    let file: SealedFile = serde_json::from_str(&content).map_err(|_| malformed())?;
    if file.version != SEALED_VERSION {
        return Err(malformed());
    }

    let nonce_bytes = STANDARD.decode(file.nonce).map_err(|_| malformed())?;
    let nonce: [u8; NONCE_BYTES] = nonce_bytes.try_into().map_err(|_| malformed())?;
    let ciphertext = STANDARD.decode(file.ciphertext).map_err(|_| malformed())?;
    Ok(SealedRecord { nonce, ciphertext })
}

fn write_record(path: &Path, record: &SealedRecord) -> Result<(), SealedError> {
    let file = SealedFile {
        version: SEALED_VERSION,
        nonce: STANDARD.encode(record.nonce),
        ciphertext: STANDARD.encode(&record.ciphertext),
    };
    let encoded = serde_json::to_vec(&file).map_err(|_| SealedError::Encrypt)?;

    let tmp_path = path.with_extension("tmp");
    {
        let mut handle = private_file(&tmp_path)?;
        handle
            .write_all(&encoded)
            .map_err(|err| SealedError::io(&tmp_path, err))?;
        handle
            .sync_all()
            .map_err(|err| SealedError::io(&tmp_path, err))?;
    }
    fs::rename(&tmp_path, path).map_err(|err| SealedError::io(path, err))
}

#[cfg(unix)]
fn private_file(path: &Path) -> Result<fs::File, SealedError> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|err| SealedError::io(path, err))
}

#[cfg(not(unix))]
fn private_file(path: &Path) -> Result<fs::File, SealedError> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|err| SealedError::io(path, err))
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<(), SealedError> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|err| SealedError::io(dir, err))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<(), SealedError> {
    fs::create_dir_all(dir).map_err(|err| SealedError::io(dir, err))
}
