use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Byte length of a principal address.
pub const ADDRESS_LEN: usize = 20;

/// An externally identified actor capable of initiating ledger operations.
///
/// A `Principal` is a 20-byte address. The all-zero address is reserved as
/// the source of minted tokens and the sink of burned ones; it never holds a
/// balance. Principals serialize as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal {
    bytes: [u8; ADDRESS_LEN],
}

impl Principal {
    /// The zero address used as mint source and burn sink.
    pub const ZERO: Principal = Principal {
        bytes: [0; ADDRESS_LEN],
    };

    /// Derive a principal deterministically from a human label.
    ///
    /// The same label always yields the same address, which lets scenario
    /// files and tests refer to accounts by name.
    pub fn derive(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"mtk-principal-v1:");
        hasher.update(label.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest.as_bytes()[..ADDRESS_LEN]);
        Self { bytes }
    }

    /// Returns `true` for [`Principal::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.bytes == [0; ADDRESS_LEN]
    }

    /// Full `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Short identifier (`0x` + first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes[..4]))
    }

    /// Parse from a hex string, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let decoded = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if decoded.len() != ADDRESS_LEN {
            return Err(TypeError::InvalidLength {
                expected: ADDRESS_LEN,
                actual: decoded.len(),
            });
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.short_id())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Principal {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
