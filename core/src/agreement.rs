//! Escrow agreement state machine with role-gated transitions.
//!
//! ```text
//!              MakeOffer             AcceptOffer
//!   Active ──────────────▶ OfferPlaced ──────────▶ OfferAccepted
//!     ▲  ◀── Rescind/Reject ──┘                     │         │
//!     │                                 MarkInspected     MarkAppraised
//!   Modify                                          ▼         ▼
//!                                           Inspected     Appraised
//!                                                   │         │
//!                                     MarkAppraised └──▶ ◀────┘ MarkInspected
//!                                                InspectedAndAppraised
//!                                         Accept(buyer) │   │ Accept(owner)
//!                                                       ▼   ▼
//!                                     BuyerAccepted       SellerAccepted
//!                                  Accept(owner) └──▶ Accepted ◀──┘ Accept(buyer)
//!
//!   Terminate (owner): any non-terminal state ──▶ Terminated
//! ```
//!
//! Every operation first checks the caller's role, then the current state,
//! then its arguments. The successor is computed on a copy and committed in
//! a single assignment, so a rejected call leaves the agreement untouched.

use serde::{Deserialize, Serialize};

use crate::error::PreconditionViolation;
use crate::{Action, AgreementState, EscrowError, EscrowEvent, Identity, Result, Role};

/// The outstanding or accepted offer on an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct Offer {
    /// Who made the offer.
    pub buyer: Identity,
    /// Offered price; always non-zero.
    pub price: u64,
    /// Party certifying the inspection.
    pub inspector: Identity,
    /// Party certifying the appraisal.
    pub appraiser: Identity,
}

/// A single escrow deal for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct Agreement {
    owner: Identity,
    description: String,
    asking_price: u64,
    offer: Option<Offer>,
    state: AgreementState,
}

impl Agreement {
    /// Lists an asset. The caller creating the agreement becomes its owner.
    pub fn new(owner: Identity, description: impl Into<String>, asking_price: u64) -> Result<Self> {
        if owner.is_zero() {
            return Err(PreconditionViolation::ZeroIdentity { role: Role::Owner }.into());
        }
        if asking_price == 0 {
            return Err(PreconditionViolation::ZeroPrice { action: "Create" }.into());
        }
        Ok(Self {
            owner,
            description: description.into(),
            asking_price,
            offer: None,
            state: AgreementState::Active,
        })
    }

    pub fn owner(&self) -> Identity {
        self.owner
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn asking_price(&self) -> u64 {
        self.asking_price
    }

    /// Current buyer, or the zero identity when no offer exists.
    pub fn buyer(&self) -> Identity {
        self.offer.as_ref().map_or(Identity::ZERO, |o| o.buyer)
    }

    /// Current offer price, or `0` when no offer exists.
    pub fn offer_price(&self) -> u64 {
        self.offer.as_ref().map_or(0, |o| o.price)
    }

    pub fn inspector(&self) -> Identity {
        self.offer.as_ref().map_or(Identity::ZERO, |o| o.inspector)
    }

    pub fn appraiser(&self) -> Identity {
        self.offer.as_ref().map_or(Identity::ZERO, |o| o.appraiser)
    }

    pub fn offer(&self) -> Option<&Offer> {
        self.offer.as_ref()
    }

    pub fn state(&self) -> AgreementState {
        self.state
    }

    pub fn inspection_passed(&self) -> bool {
        self.state.inspection_passed()
    }

    pub fn appraisal_passed(&self) -> bool {
        self.state.appraisal_passed()
    }

    /// Applies `action` on behalf of `caller`.
    ///
    /// On success the agreement moves to its successor and the returned
    /// event describes the transition. On failure nothing changes and no
    /// event exists.
    pub fn execute(&mut self, caller: &Identity, action: Action) -> Result<EscrowEvent> {
        let next = self.transition(caller, &action)?;
        let event = EscrowEvent {
            action,
            caller: *caller,
            from: self.state,
            to: next.state,
        };
        *self = next;
        Ok(event)
    }

    /// Computes the successor of this agreement without modifying it.
    pub fn transition(&self, caller: &Identity, action: &Action) -> Result<Self> {
        self.authorize(caller, action)?;
        let to = self
            .target_state(caller, action)
            .ok_or(PreconditionViolation::InvalidState {
                action: action.tag(),
                state: self.state,
            })?;
        Self::check_arguments(action)?;

        let mut next = self.clone();
        match action {
            Action::MakeOffer {
                inspector,
                appraiser,
                price,
            } => {
                next.offer = Some(Offer {
                    buyer: *caller,
                    price: *price,
                    inspector: *inspector,
                    appraiser: *appraiser,
                });
            }
            Action::ModifyOffer { price } => {
                if let Some(offer) = next.offer.as_mut() {
                    offer.price = *price;
                }
            }
            Action::RescindOffer | Action::Reject | Action::Terminate => next.offer = None,
            Action::Modify { description, price } => {
                next.description = description.clone();
                next.asking_price = *price;
            }
            Action::AcceptOffer | Action::MarkInspected | Action::MarkAppraised | Action::Accept => {}
        }
        next.state = to;
        Ok(next)
    }

    pub fn make_offer(
        &mut self,
        caller: &Identity,
        inspector: Identity,
        appraiser: Identity,
        price: u64,
    ) -> Result<EscrowEvent> {
        self.execute(
            caller,
            Action::MakeOffer {
                inspector,
                appraiser,
                price,
            },
        )
    }

    pub fn modify_offer(&mut self, caller: &Identity, price: u64) -> Result<EscrowEvent> {
        self.execute(caller, Action::ModifyOffer { price })
    }

    pub fn rescind_offer(&mut self, caller: &Identity) -> Result<EscrowEvent> {
        self.execute(caller, Action::RescindOffer)
    }

    pub fn reject(&mut self, caller: &Identity) -> Result<EscrowEvent> {
        self.execute(caller, Action::Reject)
    }

    pub fn accept_offer(&mut self, caller: &Identity) -> Result<EscrowEvent> {
        self.execute(caller, Action::AcceptOffer)
    }

    pub fn modify(
        &mut self,
        caller: &Identity,
        description: impl Into<String>,
        price: u64,
    ) -> Result<EscrowEvent> {
        self.execute(
            caller,
            Action::Modify {
                description: description.into(),
                price,
            },
        )
    }

    pub fn mark_inspected(&mut self, caller: &Identity) -> Result<EscrowEvent> {
        self.execute(caller, Action::MarkInspected)
    }

    pub fn mark_appraised(&mut self, caller: &Identity) -> Result<EscrowEvent> {
        self.execute(caller, Action::MarkAppraised)
    }

    pub fn accept(&mut self, caller: &Identity) -> Result<EscrowEvent> {
        self.execute(caller, Action::Accept)
    }

    pub fn terminate(&mut self, caller: &Identity) -> Result<EscrowEvent> {
        self.execute(caller, Action::Terminate)
    }

    /// Checks the lifecycle invariants. Agreements built through
    /// [`Agreement::new`] and [`Agreement::execute`] always pass; this is
    /// for values read back from storage.
    pub fn validate(&self) -> Result<()> {
        if self.owner.is_zero() {
            return Err(EscrowError::Corrupted("owner is the zero identity".into()));
        }
        match (&self.offer, self.state.has_offer()) {
            (None, false) => Ok(()),
            (None, true) => Err(EscrowError::Corrupted(format!(
                "state {} requires an offer",
                self.state
            ))),
            (Some(_), false) => Err(EscrowError::Corrupted(format!(
                "state {} cannot carry an offer",
                self.state
            ))),
            (Some(offer), true) => {
                if offer.buyer.is_zero() || offer.inspector.is_zero() || offer.appraiser.is_zero()
                {
                    return Err(EscrowError::Corrupted(
                        "offer names the zero identity".into(),
                    ));
                }
                if offer.price == 0 {
                    return Err(EscrowError::Corrupted("offer price is zero".into()));
                }
                if offer.buyer == self.owner {
                    return Err(EscrowError::Corrupted("owner is also the buyer".into()));
                }
                Ok(())
            }
        }
    }

    fn is_owner(&self, caller: &Identity) -> bool {
        self.owner == *caller
    }

    fn is_buyer(&self, caller: &Identity) -> bool {
        self.offer.as_ref().is_some_and(|o| o.buyer == *caller)
    }

    // Role gate, evaluated before anything else.
    fn authorize(&self, caller: &Identity, action: &Action) -> Result<()> {
        let permitted = !caller.is_zero()
            && match action {
                Action::MakeOffer { .. } => !self.is_owner(caller),
                Action::ModifyOffer { .. } | Action::RescindOffer => self.is_buyer(caller),
                Action::Reject | Action::AcceptOffer | Action::Modify { .. } | Action::Terminate => {
                    self.is_owner(caller)
                }
                Action::MarkInspected => self.offer.as_ref().is_some_and(|o| o.inspector == *caller),
                Action::MarkAppraised => self.offer.as_ref().is_some_and(|o| o.appraiser == *caller),
                Action::Accept => self.is_owner(caller) || self.is_buyer(caller),
            };
        if permitted {
            Ok(())
        } else {
            Err(PreconditionViolation::Unauthorized {
                action: action.tag(),
                caller: *caller,
            }
            .into())
        }
    }

    fn target_state(&self, caller: &Identity, action: &Action) -> Option<AgreementState> {
        use AgreementState as S;

        match (action, self.state) {
            (Action::MakeOffer { .. }, S::Active) => Some(S::OfferPlaced),
            (Action::ModifyOffer { .. }, S::OfferPlaced) => Some(S::OfferPlaced),
            (Action::RescindOffer | Action::Reject, S::OfferPlaced) => Some(S::Active),
            (Action::AcceptOffer, S::OfferPlaced) => Some(S::OfferAccepted),
            (Action::Modify { .. }, S::Active) => Some(S::Active),
            (Action::MarkInspected, S::OfferAccepted) => Some(S::Inspected),
            (Action::MarkInspected, S::Appraised) => Some(S::InspectedAndAppraised),
            (Action::MarkAppraised, S::OfferAccepted) => Some(S::Appraised),
            (Action::MarkAppraised, S::Inspected) => Some(S::InspectedAndAppraised),
            (Action::Accept, state) if self.is_buyer(caller) => buyer_acceptance(state),
            (Action::Accept, state) => seller_acceptance(state),
            (Action::Terminate, state) if !state.is_terminal() => Some(S::Terminated),
            _ => None,
        }
    }

    fn check_arguments(action: &Action) -> Result<()> {
        match action {
            Action::MakeOffer {
                inspector,
                appraiser,
                price,
            } => {
                if *price == 0 {
                    return Err(PreconditionViolation::ZeroPrice {
                        action: action.tag(),
                    }
                    .into());
                }
                if inspector.is_zero() {
                    return Err(PreconditionViolation::ZeroIdentity {
                        role: Role::Inspector,
                    }
                    .into());
                }
                if appraiser.is_zero() {
                    return Err(PreconditionViolation::ZeroIdentity {
                        role: Role::Appraiser,
                    }
                    .into());
                }
                Ok(())
            }
            Action::ModifyOffer { price: 0 } => Err(PreconditionViolation::ZeroPrice {
                action: action.tag(),
            }
            .into()),
            _ => Ok(()),
        }
    }
}

/// `Accept` by the buyer.
fn buyer_acceptance(state: AgreementState) -> Option<AgreementState> {
    match state {
        AgreementState::InspectedAndAppraised => Some(AgreementState::BuyerAccepted),
        AgreementState::SellerAccepted => Some(AgreementState::Accepted),
        _ => None,
    }
}

/// `Accept` by the owner.
fn seller_acceptance(state: AgreementState) -> Option<AgreementState> {
    match state {
        AgreementState::InspectedAndAppraised => Some(AgreementState::SellerAccepted),
        AgreementState::BuyerAccepted => Some(AgreementState::Accepted),
        _ => None,
    }
}
