//! JSON (de)serialization of agreement parameters and records.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{AgreementRecord, Identity, Result};

/// Default path to the agreement params template.
pub const AGREEMENT_PARAMS_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../templates/agreement_params.json"
);

/// Parses the JSON document at `path`, typically agreement params or a
/// saved [`AgreementRecord`]. Errors name the offending path.
pub fn load_json<P, T>(path: P) -> anyhow::Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("decoding JSON in {}", path.display()))
}

/// Stores `data` at `path` as indented JSON. Missing parent directories
/// are created first.
pub fn save_json<P, T>(path: P, data: &T) -> anyhow::Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("preparing directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("opening {} for writing", path.display()))?;
    serde_json::to_writer_pretty(file, data)
        .with_context(|| format!("writing JSON to {}", path.display()))
}

/// Loads an [`AgreementRecord`], verifies its audit chain and checks that
/// replaying the chain reproduces the stored agreement.
pub fn load_record<P: AsRef<Path>>(path: P) -> anyhow::Result<AgreementRecord> {
    let path = path.as_ref();
    let record: AgreementRecord = load_json(path)?;
    record
        .validate()
        .with_context(|| format!("checking agreement record {}", path.display()))?;
    Ok(record)
}

/// Parameters required to **create** an agreement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgreementParams {
    /// Seller listing the asset; becomes the owner.
    pub owner: Identity,
    /// Human-readable description of the asset.
    pub description: String,
    /// Initial asking price; must be non-zero.
    pub asking_price: u64,
}

impl AgreementParams {
    pub fn into_record(self) -> Result<AgreementRecord> {
        AgreementRecord::new(self.owner, self.description, self.asking_price)
    }
}
