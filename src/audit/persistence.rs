use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::audit::error::{StoreError, persistence_error};

const PERSISTENCE_VERSION: u64 = 1;

/// Versioned JSON snapshot of one store, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct AuditPersistence {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PersistedRecords<R> {
    version: u64,
    #[allow(dead_code)]
    store: String,
    records: Vec<R>,
}

#[derive(Serialize)]
struct PersistedRecordsRef<'a, R> {
    version: u64,
    store: &'a str,
    records: &'a [R],
}

impl AuditPersistence {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path, store: &str) -> Self {
        Self::new(dir.join(format!("{store}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load<R: DeserializeOwned>(&self) -> Result<Option<Vec<R>>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(persistence_error(format!(
                    "failed to read audit store '{}': {err}",
                    self.path.display()
                )));
            }
        };

        let parsed: PersistedRecords<R> = serde_json::from_str(&content).map_err(|err| {
            persistence_error(format!(
                "failed to parse audit store '{}': {err}",
                self.path.display()
            ))
        })?;
        if parsed.version != PERSISTENCE_VERSION {
            return Err(persistence_error(format!(
                "unsupported audit store version {} at '{}'",
                parsed.version,
                self.path.display()
            )));
        }

        Ok(Some(parsed.records))
    }

    pub fn save<R: Serialize>(&self, store: &str, records: &[R]) -> Result<(), StoreError> {
        let parent = self.path.parent().ok_or_else(|| {
            persistence_error(format!(
                "audit store path '{}' has no parent",
                self.path.display()
            ))
        })?;
        fs::create_dir_all(parent).map_err(|err| {
            persistence_error(format!(
                "failed to create audit directory '{}': {err}",
                parent.display()
            ))
        })?;

        let persisted = PersistedRecordsRef {
            version: PERSISTENCE_VERSION,
            store,
            records,
        };

        let tmp_path = self.path.with_extension("tmp");
        let file = fs::File::create(&tmp_path).map_err(|err| {
            persistence_error(format!(
                "failed to create audit temp file '{}': {err}",
                tmp_path.display()
            ))
        })?;
        {
            let mut writer = BufWriter::new(&file);
            serde_json::to_writer(&mut writer, &persisted).map_err(|err| {
                persistence_error(format!(
                    "failed to serialize audit store '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            writer.write_all(b"\n").map_err(|err| {
                persistence_error(format!(
                    "failed to finalize audit store '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            writer.flush().map_err(|err| {
                persistence_error(format!(
                    "failed to flush audit store '{}': {err}",
                    tmp_path.display()
                ))
            })?;
        }
        file.sync_all().map_err(|err| {
            persistence_error(format!(
                "failed to sync audit temp file '{}': {err}",
                tmp_path.display()
            ))
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|err| {
            persistence_error(format!(
                "failed to replace audit store '{}' from '{}': {err}",
                self.path.display(),
                tmp_path.display()
            ))
        })?;

        if let Ok(parent_file) = fs::File::open(parent) {
            let _ = parent_file.sync_all();
        }

        Ok(())
    }
}
