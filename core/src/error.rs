use thiserror::Error;

use crate::action::Role;
use crate::identity::Identity;
use crate::ledger::AgreementId;
use crate::state::AgreementState;

/// Escrow-related errors.
#[derive(Debug, Error, PartialEq)]
pub enum EscrowError {
    /// A transition was rejected. The agreement is left untouched.
    #[error("precondition violated: {0}")]
    Precondition(#[from] PreconditionViolation),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("invalid agreement state code: {0}")]
    InvalidStateCode(u8),

    /// A loaded agreement does not satisfy the lifecycle invariants.
    #[error("corrupted agreement: {0}")]
    Corrupted(String),

    #[error("unknown agreement: {0}")]
    UnknownAgreement(AgreementId),

    #[error("audit chain broken at entry {sequence}")]
    AuditChainBroken { sequence: u64 },

    #[error("agreement lock poisoned")]
    LockPoisoned,

    #[error("codec error: {0}")]
    Codec(String),
}

impl EscrowError {
    /// Whether this error is a rejected transition rather than a host failure.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

/// Reasons a transition may be rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionViolation {
    #[error("{caller} is not permitted to call {action}")]
    Unauthorized {
        action: &'static str,
        caller: Identity,
    },

    #[error("{action} is not allowed in state {state}")]
    InvalidState {
        action: &'static str,
        state: AgreementState,
    },

    #[error("{action} requires a non-zero price")]
    ZeroPrice { action: &'static str },

    #[error("{role} identity must be non-zero")]
    ZeroIdentity { role: Role },
}

/// Errors that might occur while parsing into an `Identity`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentityError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("cannot parse identity from empty string")]
    EmptyIdentity,

    #[error("identity must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
