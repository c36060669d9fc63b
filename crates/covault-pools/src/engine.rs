use std::collections::{BTreeMap, BTreeSet};

use covault_types::{Address, Amount};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PoolError;
use crate::registry::OwnerRegistry;

/// Action payload of a proposal. One variant per action kind; pools supply
/// the execution behavior for the variants they support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalAction {
    /// Create a vesting grant (contributor pool).
    Give { to: Address, amount: Amount },
    /// Move pool funds immediately on execution.
    Transfer { to: Address, amount: Amount },
    /// Rotate the owner registry, voiding all other pending proposals.
    SetOwners {
        owners: Vec<Address>,
        threshold: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Executed,
}

/// A proposal and its confirmation set.
///
/// There is no rejected state: a proposal that never reaches the threshold
/// simply stays pending, and a proposal from an older registry generation
/// is permanently inert without being deleted. Ids are never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub generation: u64,
    pub proposer: Address,
    pub action: ProposalAction,
    pub confirmations: BTreeSet<Address>,
    pub status: ProposalStatus,
}

/// The propose -> confirm -> execute state machine, generic over the action
/// payload. Owns the owner registry so generation stamps and owner checks
/// stay consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalEngine {
    registry: OwnerRegistry,
    proposals: BTreeMap<u64, Proposal>,
    next_id: u64,
}

impl ProposalEngine {
    pub fn new(registry: OwnerRegistry) -> Self {
        Self {
            registry,
            proposals: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn registry(&self) -> &OwnerRegistry {
        &self.registry
    }

    pub fn proposal(&self, id: u64) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    /// Create a proposal. The proposer must be a current owner and the
    /// payload is validated eagerly; balance-dependent checks wait until
    /// execution.
    pub fn propose(&mut self, proposer: Address, action: ProposalAction) -> Result<u64, PoolError> {
        if !self.registry.is_owner(&proposer) {
            return Err(PoolError::NotOwner { caller: proposer });
        }
        match &action {
            ProposalAction::Give { amount, .. } | ProposalAction::Transfer { amount, .. } => {
                if *amount == 0 {
                    return Err(PoolError::ZeroAmount);
                }
            }
            ProposalAction::SetOwners { owners, threshold } => {
                OwnerRegistry::validate_candidate(owners, *threshold)?;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.proposals.insert(
            id,
            Proposal {
                id,
                generation: self.registry.generation(),
                proposer,
                action,
                confirmations: BTreeSet::new(),
                status: ProposalStatus::Pending,
            },
        );
        debug!(id, proposer = %proposer, "proposal created");
        Ok(id)
    }

    /// Add a confirmation. Returns the new confirmation count.
    ///
    /// Confirmations beyond the threshold are rejected, not ignored: once
    /// the set holds `threshold` owners the proposal is executable and
    /// further confirmations fail with `ThresholdExceeded`.
    pub fn confirm(&mut self, confirmer: Address, id: u64) -> Result<u32, PoolError> {
        let generation = self.registry.generation();
        let threshold = self.registry.threshold();
        let is_owner = self.registry.is_owner(&confirmer);

        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(PoolError::NotFound { id })?;
        if proposal.generation != generation {
            return Err(PoolError::StaleGeneration {
                proposal: proposal.generation,
                current: generation,
            });
        }
        if proposal.status == ProposalStatus::Executed {
            return Err(PoolError::AlreadyExecuted { id });
        }
        if !is_owner {
            return Err(PoolError::NotOwner { caller: confirmer });
        }
        if proposal.confirmations.contains(&confirmer) {
            return Err(PoolError::AlreadyConfirmed {
                id,
                owner: confirmer,
            });
        }
        if proposal.confirmations.len() as u32 >= threshold {
            return Err(PoolError::ThresholdExceeded { id, threshold });
        }
        proposal.confirmations.insert(confirmer);
        debug!(id, confirmer = %confirmer, count = proposal.confirmations.len(), "proposal confirmed");
        Ok(proposal.confirmations.len() as u32)
    }

    /// Execute a proposal that holds the threshold of confirmations.
    ///
    /// `SetOwners` rotates the registry internally; every other action is
    /// handed to `effect`. An effect error aborts the call and leaves the
    /// proposal pending, so execution can be retried after the underlying
    /// condition clears. Returns the executed action.
    pub fn execute<F>(
        &mut self,
        executor: Address,
        id: u64,
        effect: F,
    ) -> Result<ProposalAction, PoolError>
    where
        F: FnOnce(&ProposalAction) -> Result<(), PoolError>,
    {
        let generation = self.registry.generation();
        let threshold = self.registry.threshold();

        let action = {
            let proposal = self.proposals.get(&id).ok_or(PoolError::NotFound { id })?;
            if proposal.generation != generation {
                return Err(PoolError::StaleGeneration {
                    proposal: proposal.generation,
                    current: generation,
                });
            }
            if proposal.status == ProposalStatus::Executed {
                return Err(PoolError::AlreadyExecuted { id });
            }
            if !self.registry.is_owner(&executor) {
                return Err(PoolError::NotOwner { caller: executor });
            }
            let have = proposal.confirmations.len() as u32;
            if have < threshold {
                return Err(PoolError::InsufficientConfirmations {
                    id,
                    have,
                    need: threshold,
                });
            }
            proposal.action.clone()
        };

        match &action {
            ProposalAction::SetOwners { owners, threshold } => {
                self.registry.rotate(owners.clone(), *threshold)?;
            }
            other => effect(other)?,
        }

        self.proposals
            .get_mut(&id)
            .ok_or(PoolError::NotFound { id })?
            .status = ProposalStatus::Executed;
        debug!(id, executor = %executor, "proposal executed");
        Ok(action)
    }
}
