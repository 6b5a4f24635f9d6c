//! Lifecycle states of an agreement.

use crate::EscrowError;

/// Where in the lifecycle an agreement currently is.
///
/// The numeric tags are stable: they are what hosts observe and what the
/// serialized forms carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AgreementState {
    /// No outstanding offer.
    Active = 0,
    /// A buyer has made an offer.
    OfferPlaced = 1,
    /// The owner accepted the offer; certifications pending.
    OfferAccepted = 2,
    /// Inspector certified; appraiser pending.
    Inspected = 3,
    /// Appraiser certified; inspector pending.
    Appraised = 4,
    /// Both certifications complete.
    InspectedAndAppraised = 5,
    /// The buyer gave final acceptance first.
    BuyerAccepted = 6,
    /// The owner gave final acceptance first.
    SellerAccepted = 7,
    /// Both parties accepted. Terminal.
    Accepted = 8,
    /// Closed by the owner. Terminal.
    Terminated = 9,
}

impl AgreementState {
    /// All states, in tag order.
    pub const ALL: [Self; 10] = [
        Self::Active,
        Self::OfferPlaced,
        Self::OfferAccepted,
        Self::Inspected,
        Self::Appraised,
        Self::InspectedAndAppraised,
        Self::BuyerAccepted,
        Self::SellerAccepted,
        Self::Accepted,
        Self::Terminated,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// No operation succeeds from a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Terminated)
    }

    /// Whether an offer is attached in this state, i.e. buyer, inspector,
    /// appraiser and offer price are all set.
    pub fn has_offer(&self) -> bool {
        !matches!(self, Self::Active | Self::Terminated)
    }

    pub fn inspection_passed(&self) -> bool {
        matches!(
            self,
            Self::Inspected
                | Self::InspectedAndAppraised
                | Self::BuyerAccepted
                | Self::SellerAccepted
                | Self::Accepted
        )
    }

    pub fn appraisal_passed(&self) -> bool {
        matches!(
            self,
            Self::Appraised
                | Self::InspectedAndAppraised
                | Self::BuyerAccepted
                | Self::SellerAccepted
                | Self::Accepted
        )
    }
}

impl TryFrom<u8> for AgreementState {
    type Error = EscrowError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(EscrowError::InvalidStateCode(code))
    }
}

impl AsRef<str> for AgreementState {
    fn as_ref(&self) -> &str {
        match self {
            Self::Active => "Active",
            Self::OfferPlaced => "OfferPlaced",
            Self::OfferAccepted => "OfferAccepted",
            Self::Inspected => "Inspected",
            Self::Appraised => "Appraised",
            Self::InspectedAndAppraised => "InspectedAndAppraised",
            Self::BuyerAccepted => "BuyerAccepted",
            Self::SellerAccepted => "SellerAccepted",
            Self::Accepted => "Accepted",
            Self::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for AgreementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.as_ref(), self.code())
    }
}

impl serde::Serialize for AgreementState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> serde::Deserialize<'de> for AgreementState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        Self::try_from(code).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "bincode")]
impl bincode::Encode for AgreementState {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        bincode::Encode::encode(&self.code(), encoder)
    }
}

#[cfg(feature = "bincode")]
impl<Context> bincode::Decode<Context> for AgreementState {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        let code: u8 = bincode::Decode::decode(decoder)?;
        Self::try_from(code).map_err(|e| bincode::error::DecodeError::OtherString(e.to_string()))
    }
}

#[cfg(feature = "bincode")]
bincode::impl_borrow_decode!(AgreementState);
