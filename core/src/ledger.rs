//! In-process host for many agreements.
//!
//! Every transition on one agreement runs inside that agreement's own
//! critical section; different agreements never contend. Listeners are
//! notified after the critical section is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::{Action, Agreement, AuditEntry, AuditLog, EscrowError, Genesis, Identity, Result};

/// Host-assigned handle of an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgreementId(pub u64);

impl std::fmt::Display for AgreementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An agreement together with the log of every transition it went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct AgreementRecord {
    pub agreement: Agreement,
    pub log: AuditLog,
}

impl AgreementRecord {
    /// Lists an asset and roots a fresh audit log at its creation
    /// parameters.
    pub fn new(owner: Identity, description: impl Into<String>, asking_price: u64) -> Result<Self> {
        let description = description.into();
        let agreement = Agreement::new(owner, description.clone(), asking_price)?;
        let log = AuditLog::new(Genesis {
            owner,
            description,
            asking_price,
        });
        Ok(Self { agreement, log })
    }

    /// Executes `action` and appends the resulting event. A rejected
    /// action touches neither the agreement nor the log.
    pub fn submit(&mut self, caller: &Identity, action: Action) -> Result<&AuditEntry> {
        let event = self.agreement.execute(caller, action)?;
        Ok(self.log.append(event))
    }

    /// Checks the agreement invariants and the audit chain, then replays
    /// the log and requires it to reproduce the stored agreement exactly.
    pub fn validate(&self) -> Result<()> {
        self.agreement.validate()?;
        self.log.verify()?;
        let replayed = self.log.replay()?;
        if replayed != self.agreement {
            return Err(EscrowError::Corrupted(format!(
                "agreement ({}) disagrees with its audit log ({})",
                self.agreement.state(),
                replayed.state()
            )));
        }
        Ok(())
    }
}

/// Receives every accepted transition.
pub trait Listener: Send + Sync {
    fn notify(&self, id: AgreementId, entry: &AuditEntry);
}

/// Registry of agreements with per-agreement serialization of transitions.
#[derive(Default)]
pub struct Ledger {
    next_id: AtomicU64,
    records: RwLock<HashMap<AgreementId, Arc<Mutex<AgreementRecord>>>>,
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists a new asset on behalf of `owner`.
    pub fn create(
        &self,
        owner: Identity,
        description: impl Into<String>,
        asking_price: u64,
    ) -> Result<AgreementId> {
        let id = self.insert(AgreementRecord::new(owner, description, asking_price)?)?;
        tracing::info!(agreement = %id, owner = %owner, asking_price, "agreement created");
        Ok(id)
    }

    /// Registers a previously persisted record after validating it.
    pub fn insert(&self, record: AgreementRecord) -> Result<AgreementId> {
        record.validate()?;
        let id = AgreementId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.records
            .write()
            .map_err(|_| EscrowError::LockPoisoned)?
            .insert(id, Arc::new(Mutex::new(record)));
        Ok(id)
    }

    /// Applies `action` to agreement `id` on behalf of `caller`.
    pub fn submit(&self, id: AgreementId, caller: &Identity, action: Action) -> Result<AuditEntry> {
        let record = self.record(id)?;
        let entry = {
            let mut record = record.lock().map_err(|_| EscrowError::LockPoisoned)?;
            let state = record.agreement.state();
            let tag = action.tag();
            match record.submit(caller, action) {
                Ok(entry) => {
                    tracing::debug!(
                        agreement = %id,
                        action = tag,
                        caller = %caller,
                        from = %entry.event.from,
                        to = %entry.event.to,
                        "transition applied"
                    );
                    entry.clone()
                }
                Err(e) => {
                    tracing::warn!(
                        agreement = %id,
                        action = tag,
                        caller = %caller,
                        state = %state,
                        error = %e,
                        "transition rejected"
                    );
                    return Err(e);
                }
            }
        };

        let listeners = self
            .listeners
            .read()
            .map_err(|_| EscrowError::LockPoisoned)?
            .clone();
        for listener in listeners {
            listener.notify(id, &entry);
        }
        Ok(entry)
    }

    /// Snapshot of the agreement's current fields.
    pub fn agreement(&self, id: AgreementId) -> Result<Agreement> {
        let record = self.record(id)?;
        let record = record.lock().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(record.agreement.clone())
    }

    pub fn audit_log(&self, id: AgreementId) -> Result<AuditLog> {
        let record = self.record(id)?;
        let record = record.lock().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(record.log.clone())
    }

    /// Ids of all hosted agreements, ascending.
    pub fn ids(&self) -> Result<Vec<AgreementId>> {
        let mut ids: Vec<_> = self
            .records
            .read()
            .map_err(|_| EscrowError::LockPoisoned)?
            .keys()
            .copied()
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn subscribe(&self, listener: Arc<dyn Listener>) -> Result<()> {
        self.listeners
            .write()
            .map_err(|_| EscrowError::LockPoisoned)?
            .push(listener);
        Ok(())
    }

    fn record(&self, id: AgreementId) -> Result<Arc<Mutex<AgreementRecord>>> {
        self.records
            .read()
            .map_err(|_| EscrowError::LockPoisoned)?
            .get(&id)
            .cloned()
            .ok_or(EscrowError::UnknownAgreement(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreconditionViolation;
    use crate::AgreementState;
    use crate::utils::assert_err;

    const OWNER: Identity = Identity::new([0x11; 20]);
    const BUYER: Identity = Identity::new([0x22; 20]);
    const INSPECTOR: Identity = Identity::new([0x33; 20]);
    const APPRAISER: Identity = Identity::new([0x44; 20]);

    fn offer(price: u64) -> Action {
        Action::MakeOffer {
            inspector: INSPECTOR,
            appraiser: APPRAISER,
            price,
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(AgreementId, &'static str)>>,
    }

    impl Listener for Recorder {
        fn notify(&self, id: AgreementId, entry: &AuditEntry) {
            self.seen.lock().unwrap().push((id, entry.event.tag()));
        }
    }

    #[test]
    fn create_and_submit() {
        let ledger = Ledger::new();
        let id = ledger.create(OWNER, "house", 1).unwrap();

        let entry = ledger.submit(id, &BUYER, offer(1)).unwrap();
        assert_eq!(entry.sequence, 0);
        assert_eq!(entry.event.to, AgreementState::OfferPlaced);

        let agreement = ledger.agreement(id).unwrap();
        assert_eq!(agreement.buyer(), BUYER);
        assert_eq!(agreement.offer_price(), 1);
        assert_eq!(ledger.audit_log(id).unwrap().len(), 1);
        assert_eq!(ledger.ids().unwrap(), vec![id]);
    }

    #[test]
    fn rejected_submission_leaves_no_trace() {
        let ledger = Ledger::new();
        let recorder = Arc::new(Recorder::default());
        ledger.subscribe(recorder.clone()).unwrap();
        let id = ledger.create(OWNER, "house", 1).unwrap();

        assert_err(
            ledger.submit(id, &BUYER, offer(0)),
            EscrowError::Precondition(PreconditionViolation::ZeroPrice {
                action: "MakeOffer",
            }),
        );
        assert_eq!(ledger.agreement(id).unwrap().state(), AgreementState::Active);
        assert!(ledger.audit_log(id).unwrap().is_empty());
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn listeners_see_every_accepted_transition() {
        let ledger = Ledger::new();
        let recorder = Arc::new(Recorder::default());
        ledger.subscribe(recorder.clone()).unwrap();
        let id = ledger.create(OWNER, "house", 1).unwrap();

        ledger.submit(id, &BUYER, offer(1)).unwrap();
        ledger.submit(id, &OWNER, Action::Reject).unwrap();
        ledger.submit(id, &OWNER, Action::Terminate).unwrap();

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(id, "MakeOffer"), (id, "Reject"), (id, "Terminate")]
        );
    }

    #[test]
    fn unknown_agreement() {
        let ledger = Ledger::new();
        assert_err(
            ledger.submit(AgreementId(7), &OWNER, Action::Terminate),
            EscrowError::UnknownAgreement(AgreementId(7)),
        );
        assert!(ledger.agreement(AgreementId(7)).is_err());
    }

    #[test]
    fn concurrent_offers_admit_exactly_one() {
        let ledger = Ledger::new();
        let id = ledger.create(OWNER, "house", 1).unwrap();

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (1..=16u8)
                .map(|n| {
                    let ledger = &ledger;
                    s.spawn(move || {
                        let buyer = Identity::new([0x80 | n; 20]);
                        ledger.submit(id, &buyer, offer(n as u64))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(EscrowError::is_precondition_violation));

        let log = ledger.audit_log(id).unwrap();
        assert_eq!(log.len(), 1);
        assert!(log.verify().is_ok());
        let agreement = ledger.agreement(id).unwrap();
        assert_eq!(agreement.buyer(), log.entries()[0].event.caller);
    }

    #[test]
    fn insert_validates_records() {
        let ledger = Ledger::new();
        let mut record = AgreementRecord::new(OWNER, "house", 1).unwrap();
        record.submit(&BUYER, offer(3)).unwrap();
        let id = ledger.insert(record.clone()).unwrap();
        assert_eq!(ledger.agreement(id).unwrap(), record.agreement);

        // A record whose log disagrees with its agreement is refused.
        let stale = AgreementRecord {
            agreement: record.agreement.clone(),
            log: AgreementRecord::new(OWNER, "house", 1).unwrap().log,
        };
        assert!(matches!(
            ledger.insert(stale),
            Err(EscrowError::Corrupted(_))
        ));
    }

    #[test]
    fn fields_must_match_the_replayed_log() {
        let mut record = AgreementRecord::new(OWNER, "house", 1).unwrap();
        record.submit(&BUYER, offer(3)).unwrap();

        // Same state and a valid chain, but a different owner, buyer and price.
        let mut forged = Agreement::new(Identity::new([0x07; 20]), "house", 1).unwrap();
        forged
            .make_offer(&Identity::new([0x09; 20]), INSPECTOR, APPRAISER, 1)
            .unwrap();
        assert_eq!(forged.state(), record.agreement.state());
        let forged = AgreementRecord {
            agreement: forged,
            log: record.log.clone(),
        };
        assert!(forged.agreement.validate().is_ok());
        assert!(forged.log.verify().is_ok());
        assert!(matches!(forged.validate(), Err(EscrowError::Corrupted(_))));

        // Only the listing description differs.
        let mut relisted = AgreementRecord::new(OWNER, "house", 1).unwrap();
        relisted.agreement.modify(&OWNER, "castle", 1).unwrap();
        assert!(matches!(relisted.validate(), Err(EscrowError::Corrupted(_))));

        assert!(record.validate().is_ok());
    }
}
