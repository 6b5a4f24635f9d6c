//! File-backed stores for a single agreement record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use titlescrow_core::codec::{decode_record, encode_record};
use titlescrow_core::AgreementRecord;

use crate::error::{ClientError, Result};
use crate::Store;

/// Extension selecting the compact binary form.
pub const BINCODE_EXTENSION: &str = "bin";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Picks [`BincodeStore`] for `.bin` paths and [`JsonStore`] otherwise.
pub fn store_for(path: impl AsRef<Path>) -> Box<dyn Store> {
    let path = path.as_ref().to_path_buf();
    match path.extension().and_then(|e| e.to_str()) {
        Some(BINCODE_EXTENSION) => Box::new(BincodeStore::new(path)),
        _ => Box::new(JsonStore::new(path)),
    }
}

/// Pretty-printed JSON record file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Store for JsonStore {
    fn load(&self) -> Result<AgreementRecord> {
        let content = read(&self.path)?;
        let record: AgreementRecord = serde_json::from_slice(&content)?;
        record.validate()?;
        Ok(record)
    }

    fn save(&self, record: &AgreementRecord) -> Result<()> {
        let content = serde_json::to_vec_pretty(record)?;
        write_replace(&self.path, &content)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Bincode record file.
#[derive(Debug, Clone)]
pub struct BincodeStore {
    path: PathBuf,
}

impl BincodeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Store for BincodeStore {
    fn load(&self) -> Result<AgreementRecord> {
        let content = read(&self.path)?;
        Ok(decode_record(&content)?)
    }

    fn save(&self, record: &AgreementRecord) -> Result<()> {
        let content = encode_record(record)?;
        write_replace(&self.path, &content)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ClientError::MissingRecord(path.to_path_buf()),
        _ => ClientError::io(path, e),
    })
}

// Writes next to the target and renames over it, so readers never see a
// partially written record. Each write stages under its own name.
fn write_replace(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ClientError::io(parent, e))?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(format!(
        ".{}-{}.tmp",
        std::process::id(),
        STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    let staging = PathBuf::from(staging);

    std::fs::write(&staging, content).map_err(|e| ClientError::io(&staging, e))?;
    std::fs::rename(&staging, path).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        ClientError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use titlescrow_core::{Action, Identity};

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("titlescrow-store-{}", std::process::id()))
            .join(name)
    }

    fn record() -> AgreementRecord {
        let mut record =
            AgreementRecord::new(Identity::new([1; 20]), "house", 10).unwrap();
        record
            .submit(
                &Identity::new([2; 20]),
                Action::MakeOffer {
                    inspector: Identity::new([3; 20]),
                    appraiser: Identity::new([4; 20]),
                    price: 9,
                },
            )
            .unwrap();
        record
    }

    #[test]
    fn json_store_persists_records() {
        let store = JsonStore::new(scratch("agreement.json"));
        store.save(&record()).unwrap();
        assert_eq!(store.load().unwrap(), record());
    }

    #[test]
    fn bincode_store_persists_records() {
        let store = BincodeStore::new(scratch("agreement.bin"));
        store.save(&record()).unwrap();
        assert_eq!(store.load().unwrap(), record());
    }

    #[test]
    fn store_for_picks_format_by_extension() {
        let path = scratch("picked.bin");
        store_for(&path).save(&record()).unwrap();
        assert!(BincodeStore::new(&path).load().is_ok());
        assert!(JsonStore::new(&path).load().is_err());
    }

    #[test]
    fn staging_files_do_not_linger() {
        let dir = scratch("staging");
        let path = dir.join("agreement.json");
        let store = JsonStore::new(&path);
        store.save(&record()).unwrap();
        store.save(&record()).unwrap();

        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("agreement.json")]);
    }

    #[test]
    fn missing_file_is_reported() {
        let path = scratch("absent.json");
        assert!(matches!(
            JsonStore::new(&path).load(),
            Err(ClientError::MissingRecord(p)) if p == path
        ));
    }
}
