//! Operations a caller may submit against an agreement.

use serde::{Deserialize, Serialize};

use crate::Identity;

/// One variant per transition operation. The variant name is the
/// notification tag carried by the resulting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[serde(tag = "action")]
pub enum Action {
    /// Place an offer naming the inspector and appraiser for the deal.
    MakeOffer {
        inspector: Identity,
        appraiser: Identity,
        price: u64,
    },
    /// Change the price of the caller's outstanding offer.
    ModifyOffer { price: u64 },
    /// Withdraw the caller's outstanding offer.
    RescindOffer,
    /// Owner declines the outstanding offer.
    Reject,
    /// Owner accepts the outstanding offer.
    AcceptOffer,
    /// Owner updates the listing.
    Modify { description: String, price: u64 },
    MarkInspected,
    MarkAppraised,
    /// Final acceptance by the owner or the buyer.
    Accept,
    /// Owner closes the agreement for good.
    Terminate,
}

impl Action {
    /// The operation name, used as the notification tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MakeOffer { .. } => "MakeOffer",
            Self::ModifyOffer { .. } => "ModifyOffer",
            Self::RescindOffer => "RescindOffer",
            Self::Reject => "Reject",
            Self::AcceptOffer => "AcceptOffer",
            Self::Modify { .. } => "Modify",
            Self::MarkInspected => "MarkInspected",
            Self::MarkAppraised => "MarkAppraised",
            Self::Accept => "Accept",
            Self::Terminate => "Terminate",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parties with a stake in an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Buyer,
    Inspector,
    Appraiser,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Owner => "owner",
            Self::Buyer => "buyer",
            Self::Inspector => "inspector",
            Self::Appraiser => "appraiser",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_carries_action_tag() {
        let action = Action::MakeOffer {
            inspector: Identity::new([1; 20]),
            appraiser: Identity::new([2; 20]),
            price: 7,
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["action"], "MakeOffer");
        assert_eq!(value["price"], 7);
        assert_eq!(value["action"], action.tag());

        let terminate: Action = serde_json::from_str(r#"{"action":"Terminate"}"#).unwrap();
        assert_eq!(terminate, Action::Terminate);
        assert_eq!(terminate.to_string(), "Terminate");
    }
}
