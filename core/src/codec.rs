//! Compact binary encoding of agreement records.

use crate::{AgreementRecord, EscrowError, Result};

/// Encodes `record` with bincode's standard configuration.
pub fn encode_record(record: &AgreementRecord) -> Result<Vec<u8>> {
    bincode::encode_to_vec(record, bincode::config::standard())
        .map_err(|e| EscrowError::Codec(e.to_string()))
}

/// Decodes a record and checks its invariants and audit chain.
/// Trailing bytes are rejected.
pub fn decode_record(bytes: &[u8]) -> Result<AgreementRecord> {
    let (record, read): (AgreementRecord, usize) =
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| EscrowError::Codec(e.to_string()))?;
    if read != bytes.len() {
        return Err(EscrowError::Codec(format!(
            "{} trailing bytes",
            bytes.len() - read
        )));
    }
    record.validate()?;
    Ok(record)
}
