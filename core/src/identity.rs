//! Party identities as supplied by the host environment.

use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::IdentityError;

/// Width of an identity in bytes.
pub const IDENTITY_LEN: usize = 20;

/// Opaque, host-authenticated identity of a party (owner, buyer,
/// inspector or appraiser).
///
/// The all-zero identity stands for "nobody" and is what the
/// `buyer`/`inspector`/`appraiser` slots read as while no offer exists.
/// Text form is `0x` followed by 40 hex digits; the prefix is optional
/// when parsing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, SerializeDisplay,
    DeserializeFromStr,
)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// The zero identity.
    pub const ZERO: Self = Self([0u8; IDENTITY_LEN]);

    pub const fn new(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; IDENTITY_LEN]
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }
}

impl From<[u8; IDENTITY_LEN]> for Identity {
    fn from(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::str::FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdentityError::EmptyIdentity);
        }
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(digits)?;
        let bytes: [u8; IDENTITY_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| IdentityError::InvalidLength {
                    expected: IDENTITY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use core::str::FromStr as _;

    use super::*;

    #[test]
    fn parse_with_and_without_prefix() {
        let a = Identity::from_str("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045").unwrap();
        let b = Identity::from_str("d8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0xd8da6bf26964af9d7eed9e03e53415d37aa96045");
        assert!(!a.is_zero());
    }

    #[test]
    fn zero_identity() {
        let zero = Identity::from_str("0x0000000000000000000000000000000000000000").unwrap();
        assert_eq!(zero, Identity::ZERO);
        assert!(zero.is_zero());
        assert_eq!(Identity::default(), Identity::ZERO);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Identity::from_str("  "), Err(IdentityError::EmptyIdentity));
        assert_eq!(
            Identity::from_str("0xdeadbeef"),
            Err(IdentityError::InvalidLength {
                expected: IDENTITY_LEN,
                actual: 4
            })
        );
        assert!(matches!(
            Identity::from_str("0xzz"),
            Err(IdentityError::Hex(_))
        ));
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = Identity::new([0xab; IDENTITY_LEN]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(IDENTITY_LEN)));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
