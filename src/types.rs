//! 32-byte hash and address newtypes rendered as lowercase hex strings.
//!
//! The teacher's `program_context.rs` hand-rolled `encode_hex`/`decode_hex`
//! helpers over `Vec<u8>`; here the same shape is kept (hex in, hex out) but
//! backed by the `hex` crate and scoped to the fixed 32-byte values this
//! system actually deals in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum HexDecodeError {
    #[error("expected {expected} hex characters, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A 32-byte value rendered as a lowercase hex string of length 64.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash32([u8; 32]);

pub type Hash = Hash32;

impl Hash32 {
    pub const LEN: usize = 32;

    pub fn zero() -> Self {
        Hash32([0u8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash32(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HexDecodeError> {
        if s.len() != 64 {
            return Err(HexDecodeError::WrongLength { expected: 64, got: s.len() });
        }
        let bytes = hex::decode(s)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Hash32(out))
    }

    /// Numerical value as a big-endian unsigned integer, used by the ceiling
    /// check (P4): a hash is "less than" the ceiling when its bytes, compared
    /// most-significant-first, are lexicographically smaller.
    pub fn is_below(&self, ceiling: &[u8; 32]) -> bool {
        self.0.as_slice() < ceiling.as_slice()
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash32 {
    type Err = HexDecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash32::from_hex(s)
    }
}

impl Serialize for Hash32 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash32::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte address, derived as `SHA-256(compressed_public_key)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

impl Address {
    pub fn zero() -> Self {
        Address([0u8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HexDecodeError> {
        if s.len() != 64 {
            return Err(HexDecodeError::WrongLength { expected: 64, got: s.len() });
        }
        let bytes = hex::decode(s)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = HexDecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Lowercase hex encoding of an arbitrary byte slice (kept as a free function
/// for the call sites, such as serializing transactions, that hash bytes
/// which are not fixed-width).
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>, HexDecodeError> {
    Ok(hex::decode(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_through_hex() {
        let h = Hash32::from_bytes([7u8; 32]);
        let hex = h.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Hash32::from_hex(&hex).unwrap(), h);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(Hash32::from_hex("abcd").is_err());
    }

    #[test]
    fn ceiling_compares_big_endian() {
        let below = Hash32::from_bytes([0u8; 32]);
        let mut ceiling = [0u8; 32];
        ceiling[31] = 1;
        assert!(below.is_below(&ceiling));
        let above = Hash32::from_bytes([1u8; 32]);
        assert!(!above.is_below(&ceiling));
    }
}
