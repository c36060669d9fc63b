use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use covault_crypto::{typed_digest, verify_threshold, SignedApproval, TypedDigest};
use covault_ledger::{ChannelKind, Journal, TokenLedger};
use covault_types::{Address, Amount, InstanceId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PoolError;
use crate::registry::OwnerRegistry;
use crate::scheduled::MintSchedule;
use crate::types::PoolEvent;

/// One owner's approval plus the nonce that owner bound into the signed
/// digest. Nonces are opaque values chosen by the signer and are consumed
/// per signer on success.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoncedApproval {
    pub approval: SignedApproval,
    pub nonce: u64,
}

#[derive(Debug, Serialize)]
struct TransferMessage {
    to: Address,
    value: Amount,
    nonce: u64,
}

#[derive(Debug, Serialize)]
struct SetOwnersMessage<'a> {
    owners: &'a [Address],
    threshold: u32,
    nonce: u64,
}

/// Construction parameters of a user-growth pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGrowthPoolConfig {
    pub instance: InstanceId,
    pub address: Address,
    pub owners: Vec<Address>,
    pub threshold: u32,
    pub mint_at: DateTime<Utc>,
    pub mint_value: Amount,
}

/// Scheduled-mint pool governed by direct threshold signatures.
///
/// Unlike the proposal pools, nothing is stored between approval and
/// execution: owners sign the operation digest off-ledger (each binding a
/// fresh personal nonce) and any caller submits the bundle. The digest
/// helpers are the exact material signers must hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGrowthPool {
    instance: InstanceId,
    address: Address,
    registry: OwnerRegistry,
    consumed_nonces: BTreeMap<Address, BTreeSet<u64>>,
    schedule: MintSchedule,
    journal: Journal<PoolEvent>,
}

impl UserGrowthPool {
    pub fn new(config: UserGrowthPoolConfig) -> Result<Self, PoolError> {
        Ok(Self {
            instance: config.instance,
            address: config.address,
            registry: OwnerRegistry::new(config.owners, config.threshold)?,
            consumed_nonces: BTreeMap::new(),
            schedule: MintSchedule::new(config.mint_at, config.mint_value),
            journal: Journal::new(),
        })
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> &OwnerRegistry {
        &self.registry
    }

    pub fn schedule(&self) -> MintSchedule {
        self.schedule
    }

    pub fn journal(&self) -> &Journal<PoolEvent> {
        &self.journal
    }

    /// Digest an outbound transfer for off-ledger signing.
    pub fn hash_transfer(
        &self,
        to: Address,
        value: Amount,
        nonce: u64,
    ) -> Result<TypedDigest, PoolError> {
        Ok(typed_digest(
            &self.instance,
            "transfer",
            &TransferMessage { to, value, nonce },
        )?)
    }

    /// Digest an owner-set rotation for off-ledger signing.
    pub fn hash_set_owners(
        &self,
        owners: &[Address],
        threshold: u32,
        nonce: u64,
    ) -> Result<TypedDigest, PoolError> {
        Ok(typed_digest(
            &self.instance,
            "set_owners",
            &SetOwnersMessage {
                owners,
                threshold,
                nonce,
            },
        )?)
    }

    /// Fire the scheduled mint into the pool's own ledger balance.
    /// Caller-unrestricted: a pure schedule trigger with no discretion.
    pub fn mint(&mut self, ledger: &mut TokenLedger, now: DateTime<Utc>) -> Result<(), PoolError> {
        self.schedule.ensure_ready(now)?;
        ledger.mint_channel(
            self.address,
            ChannelKind::UserGrowthPools,
            self.address,
            self.schedule.value,
        )?;
        self.schedule.minted = true;
        self.journal.record(PoolEvent::ScheduledMint {
            value: self.schedule.value,
        })?;
        info!(pool = %self.address, value = self.schedule.value, "scheduled mint fired");
        Ok(())
    }

    /// Transfer pool funds under a threshold signature bundle.
    pub fn transfer(
        &mut self,
        approvals: &[NoncedApproval],
        to: Address,
        value: Amount,
        ledger: &mut TokenLedger,
        now: DateTime<Utc>,
    ) -> Result<(), PoolError> {
        if value == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let mut items = Vec::with_capacity(approvals.len());
        for nonced in approvals {
            items.push((self.hash_transfer(to, value, nonced.nonce)?, nonced.approval));
        }
        let signers = verify_threshold(self.registry.threshold(), &items, self.registry.owners())?;
        self.ensure_nonces_fresh(&signers, approvals)?;

        ledger.transfer(self.address, to, value, now)?;
        self.consume_nonces(&signers, approvals);
        self.journal
            .record(PoolEvent::SignedTransfer { to, value })?;
        Ok(())
    }

    /// Rotate the owner set under a threshold signature bundle from the
    /// current owners.
    pub fn set_owners(
        &mut self,
        approvals: &[NoncedApproval],
        new_owners: Vec<Address>,
        new_threshold: u32,
    ) -> Result<(), PoolError> {
        OwnerRegistry::validate_candidate(&new_owners, new_threshold)?;
        let mut items = Vec::with_capacity(approvals.len());
        for nonced in approvals {
            items.push((
                self.hash_set_owners(&new_owners, new_threshold, nonced.nonce)?,
                nonced.approval,
            ));
        }
        let signers = verify_threshold(self.registry.threshold(), &items, self.registry.owners())?;
        self.ensure_nonces_fresh(&signers, approvals)?;

        let generation = self.registry.rotate(new_owners.clone(), new_threshold)?;
        self.consume_nonces(&signers, approvals);
        self.journal.record(PoolEvent::OwnersRotated {
            generation,
            owners: new_owners,
            threshold: new_threshold,
        })?;
        Ok(())
    }

    fn ensure_nonces_fresh(
        &self,
        signers: &[Address],
        approvals: &[NoncedApproval],
    ) -> Result<(), PoolError> {
        for (signer, nonced) in signers.iter().zip(approvals) {
            let used = self
                .consumed_nonces
                .get(signer)
                .map(|set| set.contains(&nonced.nonce))
                .unwrap_or(false);
            if used {
                return Err(PoolError::NonceAlreadyUsed {
                    signer: *signer,
                    nonce: nonced.nonce,
                });
            }
        }
        Ok(())
    }

    fn consume_nonces(&mut self, signers: &[Address], approvals: &[NoncedApproval]) {
        for (signer, nonced) in signers.iter().zip(approvals) {
            self.consumed_nonces
                .entry(*signer)
                .or_default()
                .insert(nonced.nonce);
        }
    }
}
