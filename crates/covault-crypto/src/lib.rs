//! Covault cryptographic primitives.
//!
//! Ed25519 keypairs whose verifying keys double as ledger addresses,
//! domain-separated BLAKE3 typed-data digests, and the threshold signature
//! verifier used by the signature pools. The rest of the workspace never
//! touches curve types directly; everything flows through this crate.

#![deny(unsafe_code)]

pub mod digest;
pub mod error;
pub mod keys;
pub mod verify;

pub use digest::{typed_digest, TypedDigest};
pub use error::CryptoError;
pub use keys::{Keypair, SignedApproval};
pub use verify::{verify_signed, verify_threshold};
