use covault_types::Address;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::digest::TypedDigest;

/// An Ed25519 keypair. The verifying key's 32 bytes are the holder's
/// [`Address`]; there is no separate account-id space.
///
/// Secret material lives in [`SigningKey`], which zeroizes on drop; seed
/// buffers used during construction are wiped as well.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(seed.as_mut());
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Deterministic construction from a seed. Test fixtures use this to get
    /// stable, reproducible addresses.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let seed = Zeroizing::new(seed);
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn address(&self) -> Address {
        Address::new(self.signing.verifying_key().to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Sign a typed digest, producing an approval that carries the signer's
    /// address alongside the signature.
    pub fn sign(&self, digest: &TypedDigest) -> SignedApproval {
        SignedApproval {
            signer: self.address(),
            signature: self.signing.sign(digest.as_bytes()),
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose secret material through Debug.
        write!(f, "Keypair({})", self.address())
    }
}

/// A signature over a typed digest together with the claimed signer.
///
/// Verification parses the verifying key out of `signer` and checks the
/// signature against it, so a valid approval proves the named address
/// authorized the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedApproval {
    pub signer: Address,
    pub signature: Signature,
}
