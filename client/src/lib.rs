use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use error::{ClientError, Result};
use fd_lock::RwLock;
pub use store::{store_for, BincodeStore, JsonStore};
use titlescrow_core::{Action, AgreementParams, AgreementRecord, AuditEntry, Identity};

pub mod error;
pub mod store;

/// Persistence for one agreement record.
///
/// Implementors must return only records that pass
/// [`AgreementRecord::validate`], and must replace a saved record
/// as a whole.
pub trait Store {
    /// Read the current record.
    fn load(&self) -> Result<AgreementRecord>;

    /// Replace the stored record with `record`.
    fn save(&self, record: &AgreementRecord) -> Result<()>;

    /// Where the record lives, for diagnostics.
    fn location(&self) -> &Path;
}

/// Appended to the record path to name its lock file.
pub const LOCK_SUFFIX: &str = ".lock";

/// Drives a stored agreement: each call loads the record, applies one
/// operation and writes the record back. Nothing is written when the
/// operation is rejected.
///
/// Writers hold an exclusive lock on `<record>.lock` from load to save, so
/// clients in other threads or processes see each transition whole.
pub struct EscrowClient {
    /// Backing store for the agreement record
    pub store: Box<dyn Store>,
}

impl EscrowClient {
    pub fn new(store: Box<dyn Store>) -> Self {
        Self { store }
    }

    /// Client over the record file at `path`; see [`store_for`].
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::new(store_for(path))
    }

    /// Lists a new asset. Refuses to replace an existing record unless
    /// `overwrite` is set.
    pub fn create(&self, params: AgreementParams, overwrite: bool) -> Result<AgreementRecord> {
        let lock_path = self.lock_path();
        let mut lock = open_lock(&lock_path)?;
        let _guard = lock.write().map_err(|e| ClientError::io(&lock_path, e))?;

        let location = self.store.location();
        if !overwrite && location.exists() {
            return Err(ClientError::RecordExists(location.to_path_buf()));
        }
        let record = params.into_record()?;
        self.store.save(&record)?;
        tracing::info!(
            record = ?location,
            owner = %record.agreement.owner(),
            "agreement created"
        );
        Ok(record)
    }

    /// Applies `action` on behalf of `caller` and persists the result.
    pub fn submit(&self, caller: &Identity, action: Action) -> Result<AuditEntry> {
        let lock_path = self.lock_path();
        let mut lock = open_lock(&lock_path)?;
        let _guard = lock.write().map_err(|e| ClientError::io(&lock_path, e))?;

        let mut record = self.store.load()?;
        let tag = action.tag();
        let entry = match record.submit(caller, action) {
            Ok(entry) => entry.clone(),
            Err(e) => {
                tracing::warn!(action = tag, caller = %caller, error = %e, "transition rejected");
                return Err(e.into());
            }
        };
        self.store.save(&record)?;
        tracing::info!(
            action = tag,
            caller = %caller,
            from = %entry.event.from,
            to = %entry.event.to,
            "transition applied"
        );
        Ok(entry)
    }

    pub fn record(&self) -> Result<AgreementRecord> {
        self.store.load()
    }

    fn lock_path(&self) -> PathBuf {
        let mut path = self.store.location().as_os_str().to_owned();
        path.push(LOCK_SUFFIX);
        PathBuf::from(path)
    }
}

fn open_lock(path: &Path) -> Result<RwLock<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ClientError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| ClientError::io(path, e))?;
    Ok(RwLock::new(file))
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use titlescrow_core::{AgreementState, EscrowError};

    use super::*;

    const OWNER: Identity = Identity::new([0x0a; 20]);
    const BUYER: Identity = Identity::new([0x0b; 20]);
    const INSPECTOR: Identity = Identity::new([0x0c; 20]);
    const APPRAISER: Identity = Identity::new([0x0d; 20]);

    fn scratch(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("titlescrow-client-{}", std::process::id()))
            .join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn params() -> AgreementParams {
        AgreementParams {
            owner: OWNER,
            description: "house".into(),
            asking_price: 1,
        }
    }

    #[test]
    fn drives_a_sale_through_the_store() {
        let client = EscrowClient::open(scratch("sale.json"));
        client.create(params(), false).unwrap();

        let steps = [
            (
                BUYER,
                Action::MakeOffer {
                    inspector: INSPECTOR,
                    appraiser: APPRAISER,
                    price: 1,
                },
            ),
            (OWNER, Action::AcceptOffer),
            (INSPECTOR, Action::MarkInspected),
            (APPRAISER, Action::MarkAppraised),
            (BUYER, Action::Accept),
            (OWNER, Action::Accept),
        ];
        for (caller, action) in steps {
            client.submit(&caller, action).unwrap();
        }

        let record = client.record().unwrap();
        assert_eq!(record.agreement.state(), AgreementState::Accepted);
        assert_eq!(record.log.len(), 6);
    }

    #[test]
    fn rejected_action_is_not_persisted() {
        let client = EscrowClient::open(scratch("rejected.bin"));
        let created = client.create(params(), false).unwrap();

        let err = client.submit(&OWNER, Action::Accept).unwrap_err();
        assert!(matches!(err, ClientError::Escrow(EscrowError::Precondition(_))));
        assert_eq!(client.record().unwrap(), created);
    }

    #[test]
    fn create_does_not_clobber() {
        let client = EscrowClient::open(scratch("existing.json"));
        client.create(params(), false).unwrap();
        client.submit(&OWNER, Action::Terminate).unwrap();

        assert!(matches!(
            client.create(params(), false),
            Err(ClientError::RecordExists(_))
        ));
        assert_eq!(
            client.record().unwrap().agreement.state(),
            AgreementState::Terminated
        );

        client.create(params(), true).unwrap();
        assert_eq!(
            client.record().unwrap().agreement.state(),
            AgreementState::Active
        );
    }

    #[test]
    fn concurrent_submits_admit_exactly_one() {
        for round in 0..8 {
            let path = scratch(&format!("contended-{round}.json"));
            EscrowClient::open(&path).create(params(), false).unwrap();

            let barrier = Barrier::new(8);
            let results: Vec<_> = std::thread::scope(|s| {
                let handles: Vec<_> = (1..=8u8)
                    .map(|n| {
                        let (path, barrier) = (&path, &barrier);
                        s.spawn(move || {
                            let client = EscrowClient::open(path);
                            let buyer = Identity::new([0x80 | n; 20]);
                            barrier.wait();
                            let offer = Action::MakeOffer {
                                inspector: INSPECTOR,
                                appraiser: APPRAISER,
                                price: n as u64,
                            };
                            client.submit(&buyer, offer).map(|entry| entry.event.caller)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
            assert_eq!(winners.len(), 1, "round {round}");
            assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
                e,
                ClientError::Escrow(EscrowError::Precondition(_))
            )));

            let record = EscrowClient::open(&path).record().unwrap();
            assert_eq!(record.log.len(), 1);
            assert_eq!(record.agreement.buyer(), *winners[0]);
        }
    }
}
