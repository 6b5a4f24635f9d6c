use std::path::PathBuf;

use titlescrow_core::EscrowError;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("No agreement record at {0:?}")]
    MissingRecord(PathBuf),
    #[error("Agreement record already exists at {0:?}")]
    RecordExists(PathBuf),
}

impl ClientError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
