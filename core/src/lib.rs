//! Role-gated escrow state machine for transferring a real-world asset
//! between a seller and a buyer, certified by an inspector and an appraiser.

/// Operations callers submit, and the roles that may submit them
pub mod action;
/// The agreement state machine
pub mod agreement;
/// Compact binary encoding of records
#[cfg(feature = "bincode")]
pub mod codec;
pub mod error;
/// Transition notifications and the audit log
pub mod event;
/// Identities of parties
pub mod identity;
/// JSON files for agreement params and records
pub mod interface;
/// Host serializing transitions per agreement
pub mod ledger;
pub mod state;

#[cfg(test)]
mod utils;

pub use action::{Action, Role};
pub use agreement::{Agreement, Offer};
pub use error::{EscrowError, IdentityError, PreconditionViolation};
pub use event::{AuditEntry, AuditLog, EscrowEvent, Genesis};
pub use identity::Identity;
pub use interface::AgreementParams;
pub use ledger::{AgreementId, AgreementRecord, Ledger, Listener};
pub use state::AgreementState;

pub type Result<T> = std::result::Result<T, EscrowError>;
