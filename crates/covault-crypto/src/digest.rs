use covault_types::InstanceId;
use serde::Serialize;

use crate::error::CryptoError;

/// Domain separator for all covault typed-data digests.
const DOMAIN_TAG: &[u8] = b"COVAULT_TYPED_V1";

/// A 32-byte BLAKE3 digest over a domain-separated, instance-bound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedDigest([u8; 32]);

impl TypedDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

/// Compute the canonical digest of a typed payload.
///
/// The hash material is: domain tag, length-prefixed method name, the
/// aggregate instance id, then the serde_json encoding of the payload.
/// Binding the instance and method prevents a signature authorizing one
/// operation from being replayed against another instance or entry point;
/// the length prefix keeps the concatenation injective.
pub fn typed_digest<T: Serialize>(
    instance: &InstanceId,
    method: &str,
    payload: &T,
) -> Result<TypedDigest, CryptoError> {
    let material = serde_json::to_vec(payload).map_err(|e| CryptoError::Material(e.to_string()))?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN_TAG);
    hasher.update(&(method.len() as u64).to_le_bytes());
    hasher.update(method.as_bytes());
    hasher.update(instance.as_bytes());
    hasher.update(&material);
    Ok(TypedDigest(*hasher.finalize().as_bytes()))
}
