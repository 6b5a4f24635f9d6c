//! Transition notifications and the hash-chained audit log.

use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;
use sha2::{Digest, Sha256};

use crate::{Action, Agreement, AgreementState, EscrowError, Identity, Result};

/// Parameters an agreement was created with. They root its audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct Genesis {
    pub owner: Identity,
    pub description: String,
    pub asking_price: u64,
}

impl Genesis {
    /// `prev_digest` of the first entry in the log.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.owner.as_bytes());
        hasher.update((self.description.len() as u64).to_be_bytes());
        hasher.update(self.description.as_bytes());
        hasher.update(self.asking_price.to_be_bytes());
        hasher.finalize().into()
    }
}

/// Notification produced by every successful transition.
///
/// Serialized flat, so the JSON form carries `"action": "<operation>"`
/// next to the operation's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct EscrowEvent {
    #[serde(flatten)]
    pub action: Action,
    pub caller: Identity,
    pub from: AgreementState,
    pub to: AgreementState,
}

impl EscrowEvent {
    /// Operation name carried by this notification.
    pub fn tag(&self) -> &'static str {
        self.action.tag()
    }

    // Stable byte encoding fed into the audit chain.
    fn hash_into(&self, hasher: &mut Sha256) {
        let tag = self.tag().as_bytes();
        hasher.update((tag.len() as u64).to_be_bytes());
        hasher.update(tag);
        hasher.update(self.caller.as_bytes());
        hasher.update([self.from.code(), self.to.code()]);

        match &self.action {
            Action::MakeOffer {
                inspector,
                appraiser,
                price,
            } => {
                hasher.update(inspector.as_bytes());
                hasher.update(appraiser.as_bytes());
                hasher.update(price.to_be_bytes());
            }
            Action::ModifyOffer { price } => hasher.update(price.to_be_bytes()),
            Action::Modify { description, price } => {
                hasher.update((description.len() as u64).to_be_bytes());
                hasher.update(description.as_bytes());
                hasher.update(price.to_be_bytes());
            }
            Action::RescindOffer
            | Action::Reject
            | Action::AcceptOffer
            | Action::MarkInspected
            | Action::MarkAppraised
            | Action::Accept
            | Action::Terminate => {}
        }
    }
}

/// A notification as recorded in an [`AuditLog`].
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct AuditEntry {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    pub event: EscrowEvent,
    #[serde_as(as = "Hex")]
    pub prev_digest: [u8; 32],
    /// SHA-256 over `prev_digest`, `sequence` and the event.
    #[serde_as(as = "Hex")]
    pub digest: [u8; 32],
}

/// Append-only, hash-chained record of every transition an agreement went
/// through, rooted at its [`Genesis`]. Each entry commits to its
/// predecessor, so any edit, removal or reordering is caught by
/// [`AuditLog::verify`], and [`AuditLog::replay`] rebuilds the agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct AuditLog {
    genesis: Genesis,
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new(genesis: Genesis) -> Self {
        Self {
            genesis,
            entries: Vec::new(),
        }
    }

    pub fn genesis(&self) -> &Genesis {
        &self.genesis
    }

    pub fn append(&mut self, event: EscrowEvent) -> &AuditEntry {
        let sequence = self.entries.len() as u64;
        let prev_digest = self.head_digest();
        let digest = chain_digest(&prev_digest, sequence, &event);
        self.entries.push(AuditEntry {
            sequence,
            event,
            prev_digest,
            digest,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Digest of the newest entry, or of the genesis for an empty log.
    pub fn head_digest(&self) -> [u8; 32] {
        self.entries
            .last()
            .map_or_else(|| self.genesis.digest(), |e| e.digest)
    }

    /// Recomputes the chain. Also checks that consecutive events connect:
    /// the first starts from `Active` and each one starts where the
    /// previous one ended.
    pub fn verify(&self) -> Result<()> {
        let mut prev_digest = self.genesis.digest();
        let mut prev_state = AgreementState::Active;

        for (i, entry) in self.entries.iter().enumerate() {
            let sequence = i as u64;
            let broken = entry.sequence != sequence
                || entry.prev_digest != prev_digest
                || entry.event.from != prev_state
                || entry.digest != chain_digest(&prev_digest, sequence, &entry.event);
            if broken {
                return Err(EscrowError::AuditChainBroken { sequence });
            }
            prev_digest = entry.digest;
            prev_state = entry.event.to;
        }
        Ok(())
    }

    /// Re-executes every logged action from the genesis parameters and
    /// returns the resulting agreement. Fails if an action is refused or
    /// produces a different event than the one recorded.
    pub fn replay(&self) -> Result<Agreement> {
        let genesis = &self.genesis;
        let mut agreement = Agreement::new(
            genesis.owner,
            genesis.description.clone(),
            genesis.asking_price,
        )
        .map_err(|e| EscrowError::Corrupted(format!("invalid genesis: {e}")))?;

        for entry in &self.entries {
            let event = agreement
                .execute(&entry.event.caller, entry.event.action.clone())
                .map_err(|e| {
                    EscrowError::Corrupted(format!("entry {} does not replay: {e}", entry.sequence))
                })?;
            if event != entry.event {
                return Err(EscrowError::Corrupted(format!(
                    "entry {} records {} -> {} but replays to {} -> {}",
                    entry.sequence, entry.event.from, entry.event.to, event.from, event.to
                )));
            }
        }
        Ok(agreement)
    }
}

fn chain_digest(prev_digest: &[u8; 32], sequence: u64, event: &EscrowEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev_digest);
    hasher.update(sequence.to_be_bytes());
    event.hash_into(&mut hasher);
    hasher.finalize().into()
}
