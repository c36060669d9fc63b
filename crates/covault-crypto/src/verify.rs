use covault_types::Address;
use ed25519_dalek::VerifyingKey;

use crate::digest::TypedDigest;
use crate::error::CryptoError;
use crate::keys::SignedApproval;

/// Verify one approval against a digest, returning the authenticated signer.
pub fn verify_signed(
    digest: &TypedDigest,
    approval: &SignedApproval,
) -> Result<Address, CryptoError> {
    let key = VerifyingKey::from_bytes(approval.signer.as_bytes()).map_err(|_| {
        CryptoError::InvalidSignature {
            signer: approval.signer,
        }
    })?;
    key.verify_strict(digest.as_bytes(), &approval.signature)
        .map_err(|_| CryptoError::InvalidSignature {
            signer: approval.signer,
        })?;
    Ok(approval.signer)
}

/// Verify a threshold bundle of approvals.
///
/// Checks, in order:
/// 1. exactly `required` approvals are presented (not "at least");
/// 2. every signature verifies against its claimed signer;
/// 3. every signer is a member of `owners`;
/// 4. signer addresses are strictly increasing, which forbids duplicates
///    and pins the bundle to one canonical order.
///
/// Each approval is checked against its own digest, so signers that bind
/// per-signer data (a nonce) into the signed material are supported.
pub fn verify_threshold(
    required: u32,
    items: &[(TypedDigest, SignedApproval)],
    owners: &[Address],
) -> Result<Vec<Address>, CryptoError> {
    if items.len() as u32 != required {
        return Err(CryptoError::ThresholdNotMet {
            required,
            presented: items.len() as u32,
        });
    }

    let mut signers = Vec::with_capacity(items.len());
    for (digest, approval) in items {
        signers.push(verify_signed(digest, approval)?);
    }

    for signer in &signers {
        if !owners.contains(signer) {
            return Err(CryptoError::UnauthorizedSigner { signer: *signer });
        }
    }

    if !signers.windows(2).all(|pair| pair[0] < pair[1]) {
        return Err(CryptoError::DuplicateOrUnordered);
    }

    Ok(signers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::typed_digest;
    use crate::keys::Keypair;
    use covault_types::InstanceId;

    fn sorted_keypairs(count: u8) -> Vec<Keypair> {
        let mut pairs: Vec<Keypair> = (0..count).map(|i| Keypair::from_seed([i + 1; 32])).collect();
        pairs.sort_by_key(|kp| kp.address());
        pairs
    }

    fn test_digest() -> TypedDigest {
        typed_digest(&InstanceId::from_label("verify-test"), "transfer", &7u64).unwrap()
    }

    #[test]
    fn accepts_exact_ordered_bundle() {
        let pairs = sorted_keypairs(3);
        let owners: Vec<_> = pairs.iter().map(|kp| kp.address()).collect();
        let digest = test_digest();
        let items: Vec<_> = pairs.iter().map(|kp| (digest, kp.sign(&digest))).collect();

        let signers = verify_threshold(3, &items, &owners).unwrap();
        assert_eq!(signers, owners);
    }

    #[test]
    fn rejects_wrong_count() {
        let pairs = sorted_keypairs(3);
        let owners: Vec<_> = pairs.iter().map(|kp| kp.address()).collect();
        let digest = test_digest();
        let items: Vec<_> = pairs
            .iter()
            .take(2)
            .map(|kp| (digest, kp.sign(&digest)))
            .collect();

        let err = verify_threshold(3, &items, &owners).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::ThresholdNotMet {
                required: 3,
                presented: 2
            }
        ));

        // More than required is the same exactness violation.
        let extra = sorted_keypairs(4);
        let items: Vec<_> = extra.iter().map(|kp| (digest, kp.sign(&digest))).collect();
        let err = verify_threshold(3, &items, &owners).unwrap_err();
        assert!(matches!(err, CryptoError::ThresholdNotMet { .. }));
    }

    #[test]
    fn rejects_non_owner_signer() {
        let pairs = sorted_keypairs(3);
        let owners: Vec<_> = pairs.iter().take(2).map(|kp| kp.address()).collect();
        let digest = test_digest();
        let items: Vec<_> = pairs.iter().map(|kp| (digest, kp.sign(&digest))).collect();

        let err = verify_threshold(3, &items, &owners).unwrap_err();
        assert!(matches!(err, CryptoError::UnauthorizedSigner { .. }));
    }

    #[test]
    fn rejects_descending_order() {
        let pairs = sorted_keypairs(3);
        let owners: Vec<_> = pairs.iter().map(|kp| kp.address()).collect();
        let digest = test_digest();
        let mut items: Vec<_> = pairs.iter().map(|kp| (digest, kp.sign(&digest))).collect();
        items.reverse();

        let err = verify_threshold(3, &items, &owners).unwrap_err();
        assert!(matches!(err, CryptoError::DuplicateOrUnordered));
    }

    #[test]
    fn rejects_duplicate_signer() {
        let pairs = sorted_keypairs(2);
        let owners: Vec<_> = pairs.iter().map(|kp| kp.address()).collect();
        let digest = test_digest();
        let items = vec![
            (digest, pairs[0].sign(&digest)),
            (digest, pairs[0].sign(&digest)),
        ];

        let err = verify_threshold(2, &items, &owners).unwrap_err();
        assert!(matches!(err, CryptoError::DuplicateOrUnordered));
    }

    #[test]
    fn rejects_signature_over_other_digest() {
        let pairs = sorted_keypairs(2);
        let owners: Vec<_> = pairs.iter().map(|kp| kp.address()).collect();
        let digest = test_digest();
        let other = typed_digest(&InstanceId::from_label("verify-test"), "transfer", &8u64).unwrap();

        let items = vec![
            (digest, pairs[0].sign(&digest)),
            (digest, pairs[1].sign(&other)),
        ];
        let err = verify_threshold(2, &items, &owners).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidSignature { .. }));
    }

    #[test]
    fn rejects_zero_address_signer() {
        let digest = test_digest();
        let kp = Keypair::from_seed([9u8; 32]);
        let mut approval = kp.sign(&digest);
        approval.signer = Address::ZERO;

        // The zero address is not a valid curve point carrier for this
        // protocol; verification must fail rather than panic.
        let result = verify_signed(&digest, &approval);
        assert!(result.is_err());
    }
}
