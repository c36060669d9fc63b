use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use covault_ledger::{Journal, TokenLedger};
use covault_types::{Address, Amount, InstanceId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{ProposalAction, ProposalEngine};
use crate::error::PoolError;
use crate::registry::OwnerRegistry;
use crate::types::PoolEvent;

/// Construction parameters of a contributor pool. The unlock time is fixed
/// here and applies to every grant the pool ever creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributorPoolConfig {
    pub instance: InstanceId,
    pub address: Address,
    pub owners: Vec<Address>,
    pub threshold: u32,
    pub unlock_at: DateTime<Utc>,
}

/// A vesting grant created by an executed give-proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VestingGrant {
    pub recipient: Address,
    pub amount: Amount,
    pub claimed: bool,
}

/// Multisig pool that disburses vesting grants.
///
/// Owners propose `Give` grants; once executed, the recipient claims after
/// the pool-wide unlock time. The pool's ledger balance must cover all
/// unclaimed grants at execution time, so claims can never stall on missing
/// funds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributorPool {
    instance: InstanceId,
    address: Address,
    unlock_at: DateTime<Utc>,
    engine: ProposalEngine,
    grants: BTreeMap<u64, VestingGrant>,
    journal: Journal<PoolEvent>,
}

impl ContributorPool {
    pub fn new(config: ContributorPoolConfig) -> Result<Self, PoolError> {
        let registry = OwnerRegistry::new(config.owners, config.threshold)?;
        Ok(Self {
            instance: config.instance,
            address: config.address,
            unlock_at: config.unlock_at,
            engine: ProposalEngine::new(registry),
            grants: BTreeMap::new(),
            journal: Journal::new(),
        })
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn unlock_at(&self) -> DateTime<Utc> {
        self.unlock_at
    }

    pub fn registry(&self) -> &OwnerRegistry {
        self.engine.registry()
    }

    pub fn grant(&self, id: u64) -> Option<&VestingGrant> {
        self.grants.get(&id)
    }

    pub fn journal(&self) -> &Journal<PoolEvent> {
        &self.journal
    }

    pub fn propose_give(
        &mut self,
        proposer: Address,
        to: Address,
        amount: Amount,
    ) -> Result<u64, PoolError> {
        let id = self
            .engine
            .propose(proposer, ProposalAction::Give { to, amount })?;
        self.journal.record(PoolEvent::GiveProposal {
            id,
            proposer,
            to,
            value: amount,
        })?;
        Ok(id)
    }

    pub fn propose_set_owners(
        &mut self,
        proposer: Address,
        new_owners: Vec<Address>,
        new_threshold: u32,
    ) -> Result<u64, PoolError> {
        let id = self.engine.propose(
            proposer,
            ProposalAction::SetOwners {
                owners: new_owners.clone(),
                threshold: new_threshold,
            },
        )?;
        self.journal.record(PoolEvent::SetOwnersProposal {
            id,
            proposer,
            new_owners,
            new_threshold,
        })?;
        Ok(id)
    }

    pub fn confirm(&mut self, confirmer: Address, id: u64) -> Result<u32, PoolError> {
        let count = self.engine.confirm(confirmer, id)?;
        self.journal
            .record(PoolEvent::ProposalConfirmation { id, confirmer })?;
        Ok(count)
    }

    /// Execute a confirmed proposal. Executing a give creates the grant;
    /// the pool's ledger balance must cover every unclaimed grant plus the
    /// new one, otherwise the proposal stays pending and can be retried
    /// after the pool is topped up.
    pub fn execute(
        &mut self,
        executor: Address,
        id: u64,
        ledger: &TokenLedger,
    ) -> Result<(), PoolError> {
        let address = self.address;
        let grants = &mut self.grants;
        self.engine.execute(executor, id, |action| match action {
            ProposalAction::Give { to, amount } => {
                let committed = grants
                    .values()
                    .filter(|grant| !grant.claimed)
                    .try_fold(0 as Amount, |acc, grant| acc.checked_add(grant.amount))
                    .ok_or(PoolError::Overflow)?;
                let available = ledger.balance_of(&address);
                let needed = committed.checked_add(*amount).ok_or(PoolError::Overflow)?;
                if needed > available {
                    return Err(PoolError::InsufficientPoolFunds {
                        available,
                        committed,
                        requested: *amount,
                    });
                }
                grants.insert(
                    id,
                    VestingGrant {
                        recipient: *to,
                        amount: *amount,
                        claimed: false,
                    },
                );
                Ok(())
            }
            _ => Err(PoolError::UnsupportedAction { id }),
        })?;
        self.journal.record(PoolEvent::ProposalExecution {
            id,
            executer: executor,
        })?;
        Ok(())
    }

    /// Claim an executed grant after the pool unlock time. Transfers
    /// exactly the granted amount from the pool to the recipient.
    pub fn claim(
        &mut self,
        claimant: Address,
        id: u64,
        ledger: &mut TokenLedger,
        now: DateTime<Utc>,
    ) -> Result<(), PoolError> {
        let (recipient, amount) = {
            let grant = self.grants.get(&id).ok_or(PoolError::GrantNotFound { id })?;
            if grant.claimed {
                return Err(PoolError::AlreadyClaimed { id });
            }
            if now < self.unlock_at {
                return Err(PoolError::NotUnlockedYet {
                    unlock_at: self.unlock_at,
                });
            }
            if grant.recipient != claimant {
                return Err(PoolError::WrongClaimant { id, claimant });
            }
            (grant.recipient, grant.amount)
        };

        ledger.transfer(self.address, recipient, amount, now)?;
        self.grants
            .get_mut(&id)
            .ok_or(PoolError::GrantNotFound { id })?
            .claimed = true;
        self.journal.record(PoolEvent::Claimed { id })?;
        info!(id, recipient = %recipient, amount, "grant claimed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covault_ledger::{LedgerConfig, LedgerError};

    fn addr(n: u8) -> Address {
        Address::new([n; 32])
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    const POOL: u8 = 50;

    fn funded_setup(pool_balance: Amount) -> (ContributorPool, TokenLedger) {
        let mut ledger = TokenLedger::new(LedgerConfig {
            instance: InstanceId::from_label("contributor-ledger"),
            name: "Covault".to_string(),
            symbol: "CVT".to_string(),
            decimals: 18,
            initial_holder: addr(1),
            initial_supply: 10_000,
        })
        .expect("ledger created");
        if pool_balance > 0 {
            ledger
                .transfer(addr(1), addr(POOL), pool_balance, t(0))
                .unwrap();
        }
        let pool = ContributorPool::new(ContributorPoolConfig {
            instance: InstanceId::from_label("contributor-pool"),
            address: addr(POOL),
            owners: (1..=5).map(addr).collect(),
            threshold: 3,
            unlock_at: t(1_000),
        })
        .expect("pool created");
        (pool, ledger)
    }

    fn given_executed_grant(
        pool: &mut ContributorPool,
        ledger: &TokenLedger,
        to: Address,
        amount: Amount,
    ) -> u64 {
        let id = pool.propose_give(addr(1), to, amount).unwrap();
        pool.confirm(addr(1), id).unwrap();
        pool.confirm(addr(2), id).unwrap();
        pool.confirm(addr(3), id).unwrap();
        pool.execute(addr(1), id, ledger).unwrap();
        id
    }

    #[test]
    fn give_execute_claim_lifecycle() {
        let (mut pool, mut ledger) = funded_setup(100);
        let id = given_executed_grant(&mut pool, &ledger, addr(9), 10);

        let err = pool.claim(addr(9), id, &mut ledger, t(500)).unwrap_err();
        assert!(matches!(err, PoolError::NotUnlockedYet { .. }));

        pool.claim(addr(9), id, &mut ledger, t(1_000)).unwrap();
        assert_eq!(ledger.balance_of(&addr(9)), 10);
        assert_eq!(ledger.balance_of(&addr(POOL)), 90);
        assert!(pool.grant(id).map(|g| g.claimed).unwrap_or(false));
    }

    #[test]
    fn claim_rejects_wrong_claimant_and_double_claim() {
        let (mut pool, mut ledger) = funded_setup(100);
        let id = given_executed_grant(&mut pool, &ledger, addr(9), 10);

        let err = pool.claim(addr(8), id, &mut ledger, t(2_000)).unwrap_err();
        assert!(matches!(err, PoolError::WrongClaimant { .. }));

        pool.claim(addr(9), id, &mut ledger, t(2_000)).unwrap();
        let err = pool.claim(addr(9), id, &mut ledger, t(2_000)).unwrap_err();
        assert!(matches!(err, PoolError::AlreadyClaimed { .. }));
        assert_eq!(ledger.balance_of(&addr(9)), 10);
    }

    #[test]
    fn claim_of_unexecuted_proposal_is_not_found() {
        let (mut pool, mut ledger) = funded_setup(100);
        let id = pool.propose_give(addr(1), addr(9), 10).unwrap();
        let err = pool.claim(addr(9), id, &mut ledger, t(2_000)).unwrap_err();
        assert!(matches!(err, PoolError::GrantNotFound { .. }));
    }

    #[test]
    fn execute_fails_when_pool_cannot_cover_grants() {
        let (mut pool, ledger) = funded_setup(15);
        let first = pool.propose_give(addr(1), addr(9), 10).unwrap();
        pool.confirm(addr(1), first).unwrap();
        pool.confirm(addr(2), first).unwrap();
        pool.confirm(addr(3), first).unwrap();
        pool.execute(addr(1), first, &ledger).unwrap();

        // 10 of 15 already committed; another 10 cannot be covered.
        let second = pool.propose_give(addr(1), addr(8), 10).unwrap();
        pool.confirm(addr(1), second).unwrap();
        pool.confirm(addr(2), second).unwrap();
        pool.confirm(addr(3), second).unwrap();
        let err = pool.execute(addr(1), second, &ledger).unwrap_err();
        assert!(matches!(
            err,
            PoolError::InsufficientPoolFunds {
                available: 15,
                committed: 10,
                requested: 10
            }
        ));
    }

    #[test]
    fn execute_retries_after_top_up() {
        let (mut pool, mut ledger) = funded_setup(5);
        let id = pool.propose_give(addr(1), addr(9), 10).unwrap();
        pool.confirm(addr(1), id).unwrap();
        pool.confirm(addr(2), id).unwrap();
        pool.confirm(addr(3), id).unwrap();

        let err = pool.execute(addr(1), id, &ledger).unwrap_err();
        assert!(matches!(err, PoolError::InsufficientPoolFunds { .. }));

        ledger.transfer(addr(1), addr(POOL), 5, t(0)).unwrap();
        pool.execute(addr(1), id, &ledger).unwrap();
        assert!(pool.grant(id).is_some());
    }

    #[test]
    fn claimed_grants_release_their_commitment() {
        let (mut pool, mut ledger) = funded_setup(10);
        let id = given_executed_grant(&mut pool, &ledger, addr(9), 10);
        pool.claim(addr(9), id, &mut ledger, t(1_000)).unwrap();

        // Pool is empty now, but the claimed grant no longer counts against
        // new grants once funds return.
        ledger.transfer(addr(1), addr(POOL), 10, t(1_000)).unwrap();
        let next = pool.propose_give(addr(1), addr(8), 10).unwrap();
        pool.confirm(addr(1), next).unwrap();
        pool.confirm(addr(2), next).unwrap();
        pool.confirm(addr(3), next).unwrap();
        pool.execute(addr(1), next, &ledger).unwrap();
    }

    #[test]
    fn set_owners_voids_pending_gives() {
        let (mut pool, ledger) = funded_setup(100);
        let stale = pool.propose_give(addr(1), addr(9), 10).unwrap();

        let rotate = pool
            .propose_set_owners(addr(1), (1..=4).map(addr).collect(), 2)
            .unwrap();
        pool.confirm(addr(1), rotate).unwrap();
        pool.confirm(addr(2), rotate).unwrap();
        pool.confirm(addr(3), rotate).unwrap();
        pool.execute(addr(1), rotate, &ledger).unwrap();
        assert_eq!(pool.registry().generation(), 1);
        assert_eq!(pool.registry().threshold(), 2);

        let err = pool.confirm(addr(1), stale).unwrap_err();
        assert!(matches!(err, PoolError::StaleGeneration { .. }));
    }

    #[test]
    fn pool_claim_error_when_ledger_transfer_fails() {
        // Grant exists but the pool was drained after execution by an
        // out-of-band transfer; the claim surfaces the ledger error.
        let (mut pool, mut ledger) = funded_setup(10);
        let id = given_executed_grant(&mut pool, &ledger, addr(9), 10);
        ledger.transfer(addr(POOL), addr(7), 10, t(0)).unwrap();

        let err = pool.claim(addr(9), id, &mut ledger, t(1_000)).unwrap_err();
        assert!(matches!(
            err,
            PoolError::Ledger(LedgerError::InsufficientBalance { .. })
        ));
        // The grant stays claimable for when funds come back.
        assert!(!pool.grant(id).map(|g| g.claimed).unwrap_or(true));
    }
}
