//! Covault shared primitives.
//!
//! Identity keys, token amounts, aggregate instance ids, and the error
//! taxonomy every covault crate classifies its errors into.

#![deny(unsafe_code)]

use std::fmt;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Token quantity. All arithmetic on amounts is checked; overflow and
/// underflow surface as typed errors, never as wrapping.
pub type Amount = u128;

/// Fixed-size identity key of an account, owner, or pool.
///
/// For keypair-backed identities this is the Ed25519 verifying key's 32
/// bytes. `Ord` compares byte values and is the canonical signer ordering
/// used by threshold verification.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

impl Address {
    /// The all-zero address. Used as a placeholder, never as a signer.
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from a 64-character lowercase or uppercase hex string.
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let bytes = decode_hex_32(s).ok_or_else(|| AddressParseError(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps assertion output readable.
        write!(
            f,
            "Address({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

// Addresses key JSON maps in snapshots, so they serialize as hex strings.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Malformed hex representation of an [`Address`] or [`InstanceId`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid 32-byte hex identity: {0:?}")]
pub struct AddressParseError(pub String);

/// Identity of one deployed aggregate instance (ledger, pool, sale).
///
/// Bound into every typed-data digest so a signature authorizing an action
/// on one instance can never be replayed against another.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId([u8; 32]);

impl InstanceId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic instance id derived from a human-readable label.
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InstanceId({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl Serialize for InstanceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InstanceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex_32(&s).ok_or_else(|| D::Error::custom(AddressParseError(s)))?;
        Ok(Self(bytes))
    }
}

/// Classification of every covault error.
///
/// Each crate's error enum exposes `class()` mapping its variants onto this
/// taxonomy so embedders can route rejections uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Bad call or constructor parameters.
    Validation,
    /// Caller is not permitted to perform the operation.
    Authorization,
    /// The operation conflicts with the aggregate's current state.
    State,
    /// Overflow, underflow, or an insufficient balance/allowance/ceiling.
    Arithmetic,
    /// Malformed or non-matching signature material.
    Signature,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::State => "state",
            Self::Arithmetic => "arithmetic",
            Self::Signature => "signature",
        };
        f.write_str(name)
    }
}

fn decode_hex_32(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 || !s.is_ascii() {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out[i] = ((hi << 4) | lo) as u8;
    }
    Some(out)
}
