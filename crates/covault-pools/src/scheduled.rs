use chrono::{DateTime, Utc};
use covault_ledger::{ChannelKind, Journal, TokenLedger};
use covault_types::{Address, Amount, InstanceId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{ProposalAction, ProposalEngine};
use crate::error::PoolError;
use crate::registry::OwnerRegistry;
use crate::types::PoolEvent;

/// A one-shot scheduled mint: fixed value, fixed open time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MintSchedule {
    pub mint_at: DateTime<Utc>,
    pub value: Amount,
    pub minted: bool,
}

impl MintSchedule {
    pub fn new(mint_at: DateTime<Utc>, value: Amount) -> Self {
        Self {
            mint_at,
            value,
            minted: false,
        }
    }

    pub(crate) fn ensure_ready(&self, now: DateTime<Utc>) -> Result<(), PoolError> {
        if self.minted {
            return Err(PoolError::AlreadyMinted);
        }
        if now < self.mint_at {
            return Err(PoolError::TooEarly {
                mint_at: self.mint_at,
            });
        }
        Ok(())
    }
}

/// Construction parameters of a creators pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorsPoolConfig {
    pub instance: InstanceId,
    pub address: Address,
    pub owners: Vec<Address>,
    pub threshold: u32,
    pub mint_at: DateTime<Utc>,
    pub mint_value: Amount,
}

/// Multisig pool funded by a scheduled mint.
///
/// The schedule mints a fixed value into the pool's own balance once the
/// mint time passes; owners then disburse through transfer proposals. The
/// mint trigger takes no caller identity: it carries no discretion, so
/// anyone may fire it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorsPool {
    instance: InstanceId,
    address: Address,
    engine: ProposalEngine,
    schedule: MintSchedule,
    journal: Journal<PoolEvent>,
}

impl CreatorsPool {
    pub fn new(config: CreatorsPoolConfig) -> Result<Self, PoolError> {
        let registry = OwnerRegistry::new(config.owners, config.threshold)?;
        Ok(Self {
            instance: config.instance,
            address: config.address,
            engine: ProposalEngine::new(registry),
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
        self.engine.registry()
    }

    pub fn schedule(&self) -> MintSchedule {
        self.schedule
    }

    pub fn journal(&self) -> &Journal<PoolEvent> {
        &self.journal
    }

    /// Fire the scheduled mint into the pool's own ledger balance.
    pub fn mint(&mut self, ledger: &mut TokenLedger, now: DateTime<Utc>) -> Result<(), PoolError> {
        self.schedule.ensure_ready(now)?;
        ledger.mint_channel(
            self.address,
            ChannelKind::CreatorsPools,
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

    pub fn propose_transfer(
        &mut self,
        proposer: Address,
        to: Address,
        amount: Amount,
    ) -> Result<u64, PoolError> {
        let id = self
            .engine
            .propose(proposer, ProposalAction::Transfer { to, amount })?;
        self.journal.record(PoolEvent::TransferProposal {
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

    /// Execute a confirmed proposal. A transfer that the ledger rejects
    /// (e.g. the scheduled mint has not funded the pool yet) leaves the
    /// proposal pending for retry.
    pub fn execute(
        &mut self,
        executor: Address,
        id: u64,
        ledger: &mut TokenLedger,
        now: DateTime<Utc>,
    ) -> Result<(), PoolError> {
        let address = self.address;
        self.engine.execute(executor, id, |action| match action {
            ProposalAction::Transfer { to, amount } => ledger
                .transfer(address, *to, *amount, now)
                .map_err(|e| PoolError::ActionFailed(e.to_string())),
            _ => Err(PoolError::UnsupportedAction { id }),
        })?;
        self.journal.record(PoolEvent::ProposalExecution {
            id,
            executer: executor,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covault_ledger::LedgerConfig;

    fn addr(n: u8) -> Address {
        Address::new([n; 32])
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    const POOL: u8 = 60;

    fn setup() -> (CreatorsPool, TokenLedger) {
        let mut ledger = TokenLedger::new(LedgerConfig {
            instance: InstanceId::from_label("creators-ledger"),
            name: "Covault".to_string(),
            symbol: "CVT".to_string(),
            decimals: 18,
            initial_holder: addr(1),
            initial_supply: 0,
        })
        .expect("ledger created");
        ledger
            .register_creators_pools(addr(1), &[addr(POOL)], 1_000)
            .unwrap();
        let pool = CreatorsPool::new(CreatorsPoolConfig {
            instance: InstanceId::from_label("creators-pool"),
            address: addr(POOL),
            owners: (1..=3).map(addr).collect(),
            threshold: 2,
            mint_at: t(100),
            mint_value: 500,
        })
        .expect("pool created");
        (pool, ledger)
    }

    #[test]
    fn mint_is_time_gated_and_one_shot() {
        let (mut pool, mut ledger) = setup();

        let err = pool.mint(&mut ledger, t(99)).unwrap_err();
        assert!(matches!(err, PoolError::TooEarly { .. }));
        assert_eq!(ledger.total_supply(), 0);

        pool.mint(&mut ledger, t(100)).unwrap();
        assert_eq!(ledger.balance_of(&addr(POOL)), 500);
        assert_eq!(ledger.total_supply(), 500);

        let err = pool.mint(&mut ledger, t(200)).unwrap_err();
        assert!(matches!(err, PoolError::AlreadyMinted));
        assert_eq!(ledger.total_supply(), 500);
    }

    #[test]
    fn failed_ledger_mint_keeps_schedule_unfired() {
        let mut ledger = TokenLedger::new(LedgerConfig {
            instance: InstanceId::from_label("creators-ledger-2"),
            name: "Covault".to_string(),
            symbol: "CVT".to_string(),
            decimals: 18,
            initial_holder: addr(1),
            initial_supply: 0,
        })
        .expect("ledger created");
        ledger
            .register_creators_pools(addr(1), &[addr(POOL)], 1_000)
            .unwrap();
        let mut pool = CreatorsPool::new(CreatorsPoolConfig {
            instance: InstanceId::from_label("creators-pool-2"),
            address: addr(POOL),
            owners: vec![addr(1)],
            threshold: 1,
            mint_at: t(0),
            // Exceeds the 1_000 channel ceiling, so the ledger rejects it.
            mint_value: 2_000,
        })
        .unwrap();

        let err = pool.mint(&mut ledger, t(0)).unwrap_err();
        assert!(matches!(err, PoolError::Ledger(_)));
        assert!(!pool.schedule().minted);
        assert_eq!(ledger.total_supply(), 0);
    }

    #[test]
    fn transfer_proposal_disburses_after_mint() {
        let (mut pool, mut ledger) = setup();
        pool.mint(&mut ledger, t(100)).unwrap();

        let id = pool.propose_transfer(addr(1), addr(9), 200).unwrap();
        pool.confirm(addr(1), id).unwrap();
        pool.confirm(addr(2), id).unwrap();
        pool.execute(addr(1), id, &mut ledger, t(100)).unwrap();

        assert_eq!(ledger.balance_of(&addr(9)), 200);
        assert_eq!(ledger.balance_of(&addr(POOL)), 300);
    }

    #[test]
    fn transfer_execution_retries_after_funding() {
        let (mut pool, mut ledger) = setup();

        let id = pool.propose_transfer(addr(1), addr(9), 200).unwrap();
        pool.confirm(addr(1), id).unwrap();
        pool.confirm(addr(2), id).unwrap();

        // Pool has no funds until the schedule fires.
        let err = pool.execute(addr(1), id, &mut ledger, t(50)).unwrap_err();
        assert!(matches!(err, PoolError::ActionFailed(_)));

        pool.mint(&mut ledger, t(100)).unwrap();
        pool.execute(addr(1), id, &mut ledger, t(100)).unwrap();
        assert_eq!(ledger.balance_of(&addr(9)), 200);
    }
}
