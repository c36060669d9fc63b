use covault_types::Address;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PoolError;

/// The authorized owner set of a pool, with its confirmation threshold and
/// a generation counter.
///
/// Owners are stored sorted and unique. The generation increments on every
/// successful rotation; proposals stamp the generation they were created
/// under and become permanently inert once the registry moves past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerRegistry {
    owners: Vec<Address>,
    threshold: u32,
    generation: u64,
}

impl OwnerRegistry {
    pub fn new(owners: Vec<Address>, threshold: u32) -> Result<Self, PoolError> {
        let owners = Self::validate(owners, threshold)?;
        Ok(Self {
            owners,
            threshold,
            generation: 0,
        })
    }

    /// Constraint check shared by construction and rotation: non-empty, no
    /// duplicates, `1 <= threshold <= len(owners)`. Returns the owners
    /// sorted into canonical order.
    fn validate(mut owners: Vec<Address>, threshold: u32) -> Result<Vec<Address>, PoolError> {
        if owners.is_empty() {
            return Err(PoolError::InvalidOwnerSet("owner set is empty".to_string()));
        }
        owners.sort();
        if let Some(pair) = owners.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(PoolError::InvalidOwnerSet(format!(
                "duplicate owner {}",
                pair[0]
            )));
        }
        if threshold == 0 || threshold as usize > owners.len() {
            return Err(PoolError::InvalidOwnerSet(format!(
                "threshold {} out of range 1..={}",
                threshold,
                owners.len()
            )));
        }
        Ok(owners)
    }

    /// Validate a candidate owner set without building a registry. Used for
    /// eager validation when a set-owners proposal is created.
    pub fn validate_candidate(owners: &[Address], threshold: u32) -> Result<(), PoolError> {
        Self::validate(owners.to_vec(), threshold).map(|_| ())
    }

    /// Atomically replace the owner set, bumping the generation. Rejected
    /// before any mutation if the new set violates the constraints.
    pub fn rotate(&mut self, owners: Vec<Address>, threshold: u32) -> Result<u64, PoolError> {
        let owners = Self::validate(owners, threshold)?;
        self.owners = owners;
        self.threshold = threshold;
        self.generation += 1;
        info!(generation = self.generation, owners = self.owners.len(), threshold, "owner set rotated");
        Ok(self.generation)
    }

    pub fn is_owner(&self, addr: &Address) -> bool {
        self.owners.binary_search(addr).is_ok()
    }

    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 32])
    }

    #[test]
    fn stores_owners_sorted_and_unique() {
        let registry = OwnerRegistry::new(vec![addr(3), addr(1), addr(2)], 2).unwrap();
        assert_eq!(registry.owners(), &[addr(1), addr(2), addr(3)]);
        assert!(registry.is_owner(&addr(2)));
        assert!(!registry.is_owner(&addr(4)));
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn rejects_empty_duplicate_and_bad_threshold() {
        assert!(matches!(
            OwnerRegistry::new(vec![], 1),
            Err(PoolError::InvalidOwnerSet(_))
        ));
        assert!(matches!(
            OwnerRegistry::new(vec![addr(1), addr(1)], 1),
            Err(PoolError::InvalidOwnerSet(_))
        ));
        assert!(matches!(
            OwnerRegistry::new(vec![addr(1)], 0),
            Err(PoolError::InvalidOwnerSet(_))
        ));
        assert!(matches!(
            OwnerRegistry::new(vec![addr(1)], 2),
            Err(PoolError::InvalidOwnerSet(_))
        ));
    }

    #[test]
    fn rotation_bumps_generation() {
        let mut registry = OwnerRegistry::new(vec![addr(1), addr(2)], 2).unwrap();
        registry.rotate(vec![addr(3), addr(4), addr(5)], 2).unwrap();
        assert_eq!(registry.generation(), 1);
        assert!(!registry.is_owner(&addr(1)));
        assert!(registry.is_owner(&addr(4)));
        assert_eq!(registry.threshold(), 2);
    }

    #[test]
    fn failed_rotation_leaves_registry_untouched() {
        let mut registry = OwnerRegistry::new(vec![addr(1), addr(2)], 2).unwrap();
        let err = registry.rotate(vec![addr(3), addr(3)], 1).unwrap_err();
        assert!(matches!(err, PoolError::InvalidOwnerSet(_)));
        assert_eq!(registry.generation(), 0);
        assert!(registry.is_owner(&addr(1)));
    }
}
