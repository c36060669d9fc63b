use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use covault_types::{Address, Amount, InstanceId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::journal::Journal;
use crate::receiver::ReceiverRegistry;
use crate::types::{ChannelKind, LedgerEvent, LockRecord, MintChannels};

/// Genesis configuration of a token ledger instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub instance: InstanceId,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Receives the initial supply and starts as the ledger admin.
    pub initial_holder: Address,
    pub initial_supply: Amount,
}

/// The token ledger aggregate.
///
/// Single shared mutable resource of the system: balances, allowances,
/// lock records, mint channels, the delegation switch, and the event
/// journal. Every public operation is one all-or-nothing transaction; a
/// returned error means nothing changed.
///
/// Invariant: `sum(balances) == total_supply` after every operation. The
/// only supply increase path is [`TokenLedger::mint_channel`]; the only
/// decrease path is [`TokenLedger::burn`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    instance: InstanceId,
    name: String,
    symbol: String,
    decimals: u8,
    admin: Address,
    pending_admin: Option<Address>,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    locks: BTreeMap<Address, LockRecord>,
    channels: MintChannels,
    call_whitelist: BTreeSet<Address>,
    delegation_enabled: bool,
    consumed_nonces: BTreeMap<Address, BTreeSet<u64>>,
    journal: Journal<LedgerEvent>,
}

impl TokenLedger {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let mut balances = BTreeMap::new();
        if config.initial_supply > 0 {
            balances.insert(config.initial_holder, config.initial_supply);
        }

        let mut ledger = Self {
            instance: config.instance,
            name: config.name,
            symbol: config.symbol,
            decimals: config.decimals,
            admin: config.initial_holder,
            pending_admin: None,
            total_supply: config.initial_supply,
            balances,
            allowances: BTreeMap::new(),
            locks: BTreeMap::new(),
            channels: MintChannels::default(),
            call_whitelist: BTreeSet::new(),
            delegation_enabled: true,
            consumed_nonces: BTreeMap::new(),
            journal: Journal::new(),
        };
        ledger.journal.record(LedgerEvent::Genesis {
            holder: config.initial_holder,
            supply: config.initial_supply,
        })?;
        info!(instance = %ledger.instance, supply = ledger.total_supply, "ledger created");
        Ok(ledger)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, addr: &Address) -> Amount {
        self.balances.get(addr).copied().unwrap_or(0)
    }

    pub fn balances(&self) -> &BTreeMap<Address, Amount> {
        &self.balances
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn lock_of(&self, addr: &Address) -> Option<LockRecord> {
        self.locks.get(addr).copied()
    }

    /// Balance the account can spend at `now`, honoring an active lock.
    pub fn transferable_of(&self, addr: &Address, now: DateTime<Utc>) -> Amount {
        let balance = self.balance_of(addr);
        match self.locks.get(addr) {
            Some(lock) if now < lock.unlock_at => balance.saturating_sub(lock.amount),
            _ => balance,
        }
    }

    pub fn is_whitelisted(&self, addr: &Address) -> bool {
        self.call_whitelist.contains(addr)
    }

    pub fn delegation_enabled(&self) -> bool {
        self.delegation_enabled
    }

    pub fn channel_remaining(&self, kind: ChannelKind) -> Result<Amount, LedgerError> {
        Ok(self.channels.registration(kind)?.remaining())
    }

    pub fn channel(&self, kind: ChannelKind) -> Result<&crate::types::ChannelRegistration, LedgerError> {
        self.channels.registration(kind)
    }

    pub fn is_channel_address(&self, kind: ChannelKind, addr: &Address) -> bool {
        self.channels.is_authorized(kind, addr)
    }

    pub fn journal(&self) -> &Journal<LedgerEvent> {
        &self.journal
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        self.debit(caller, amount, now)?;
        self.credit(to, amount)?;
        self.journal.record(LedgerEvent::Transfer {
            from: caller,
            to,
            value: amount,
        })?;
        debug!(from = %caller, to = %to, value = amount, "transfer");
        Ok(())
    }

    /// Overwrite (not add to) the spender's allowance.
    pub fn approve(
        &mut self,
        caller: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.allowances
            .entry(caller)
            .or_default()
            .insert(spender, amount);
        self.journal.record(LedgerEvent::Approval {
            owner: caller,
            spender,
            value: amount,
        })?;
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let have = self.allowance(&from, &caller);
        if have < amount {
            return Err(LedgerError::InsufficientAllowance { have, need: amount });
        }
        self.debit(from, amount, now)?;
        self.credit(to, amount)?;
        // Guarded above, so the subtraction cannot underflow.
        self.allowances
            .entry(from)
            .or_default()
            .insert(caller, have - amount);
        self.journal.record(LedgerEvent::Transfer {
            from,
            to,
            value: amount,
        })?;
        debug!(spender = %caller, from = %from, to = %to, value = amount, "transfer_from");
        Ok(())
    }

    /// Atomic multi-recipient transfer: either every recipient is credited
    /// or no balance moves at all.
    pub fn transfer_multiple(
        &mut self,
        caller: Address,
        recipients: &[(Address, Amount)],
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if recipients.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        let mut total: Amount = 0;
        for (_, value) in recipients {
            if *value == 0 {
                return Err(LedgerError::ZeroAmount);
            }
            total = total.checked_add(*value).ok_or(LedgerError::Overflow)?;
        }
        self.debit(caller, total, now)?;
        for (to, value) in recipients {
            self.credit(*to, *value)?;
            self.journal.record(LedgerEvent::Transfer {
                from: caller,
                to: *to,
                value: *value,
            })?;
        }
        debug!(from = %caller, recipients = recipients.len(), total, "transfer_multiple");
        Ok(())
    }

    pub fn burn(
        &mut self,
        caller: Address,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        self.debit(caller, amount, now)?;
        self.total_supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(LedgerError::Underflow)?;
        self.journal.record(LedgerEvent::Burn {
            from: caller,
            value: amount,
        })?;
        debug!(from = %caller, value = amount, "burn");
        Ok(())
    }

    /// Transfer and place a lock on the recipient. Only the registered
    /// crowdsale channel may call this; a new lock replaces any previous
    /// lock record for the recipient.
    pub fn transfer_and_lock(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
        unlock_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if !self.channels.is_authorized(ChannelKind::Crowdsale, &caller) {
            return Err(LedgerError::NotChannelAddress {
                channel: ChannelKind::Crowdsale,
                caller,
            });
        }
        self.debit(caller, amount, now)?;
        self.credit(to, amount)?;
        self.locks.insert(
            to,
            LockRecord {
                amount,
                unlock_at,
            },
        );
        self.journal.record(LedgerEvent::Transfer {
            from: caller,
            to,
            value: amount,
        })?;
        self.journal.record(LedgerEvent::Lock {
            addr: to,
            value: amount,
            unlock_at,
        })?;
        debug!(to = %to, value = amount, unlock_at = %unlock_at, "transfer_and_lock");
        Ok(())
    }

    /// Transfer to a whitelisted receiver, then run its hook. A hook
    /// failure rolls the balance move back and fails the whole call.
    pub fn transfer_and_call(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
        payload: &[u8],
        receivers: &mut ReceiverRegistry,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if !self.call_whitelist.contains(&to) {
            return Err(LedgerError::NotWhitelisted { addr: to });
        }
        let receiver = receivers
            .get_mut(&to)
            .ok_or(LedgerError::ReceiverMissing { addr: to })?;

        self.debit(caller, amount, now)?;
        self.credit(to, amount)?;
        if let Err(rejection) = receiver.on_token_transfer(caller, amount, payload) {
            // Undo the balance move without re-applying lock policy: the
            // rollback must always succeed.
            self.debit_raw(to, amount)?;
            self.credit(caller, amount)?;
            return Err(LedgerError::ReceiverRejected {
                addr: to,
                reason: rejection.to_string(),
            });
        }
        self.journal.record(LedgerEvent::Transfer {
            from: caller,
            to,
            value: amount,
        })?;
        debug!(from = %caller, to = %to, value = amount, "transfer_and_call");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mint channels
    // ------------------------------------------------------------------

    pub fn register_crowdsale(
        &mut self,
        caller: Address,
        addr: Address,
        ceiling: Amount,
    ) -> Result<(), LedgerError> {
        self.register_channel(caller, ChannelKind::Crowdsale, &[addr], ceiling)
    }

    pub fn register_contributor_pool(
        &mut self,
        caller: Address,
        addr: Address,
        ceiling: Amount,
    ) -> Result<(), LedgerError> {
        self.register_channel(caller, ChannelKind::ContributorPool, &[addr], ceiling)
    }

    pub fn register_creators_pools(
        &mut self,
        caller: Address,
        addrs: &[Address],
        ceiling: Amount,
    ) -> Result<(), LedgerError> {
        self.register_channel(caller, ChannelKind::CreatorsPools, addrs, ceiling)
    }

    pub fn register_user_growth_pools(
        &mut self,
        caller: Address,
        addrs: &[Address],
        ceiling: Amount,
    ) -> Result<(), LedgerError> {
        self.register_channel(caller, ChannelKind::UserGrowthPools, addrs, ceiling)
    }

    fn register_channel(
        &mut self,
        caller: Address,
        kind: ChannelKind,
        addrs: &[Address],
        ceiling: Amount,
    ) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        if addrs.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        let addresses: BTreeSet<Address> = addrs.iter().copied().collect();
        self.channels.register(kind, addresses, ceiling)?;
        self.journal.record(LedgerEvent::ChannelRegistered {
            channel: kind,
            addresses: addrs.to_vec(),
            ceiling,
        })?;
        info!(channel = %kind, ceiling, "mint channel registered");
        Ok(())
    }

    /// Mint through a registered channel. The caller must be one of the
    /// channel's registered addresses and the channel ceiling bounds the
    /// cumulative minted amount.
    pub fn mint_channel(
        &mut self,
        caller: Address,
        kind: ChannelKind,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        // Registration errors take precedence over authorization.
        self.channels.registration(kind)?;
        if !self.channels.is_authorized(kind, &caller) {
            return Err(LedgerError::NotChannelAddress {
                channel: kind,
                caller,
            });
        }
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.channels.record_mint(kind, amount)?;
        self.credit(to, amount)?;
        self.total_supply = new_supply;
        self.journal.record(LedgerEvent::Mint {
            channel: kind,
            to,
            value: amount,
        })?;
        debug!(channel = %kind, to = %to, value = amount, "mint");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub fn add_call_whitelist(&mut self, caller: Address, addr: Address) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        if self.call_whitelist.insert(addr) {
            self.journal.record(LedgerEvent::WhitelistAdded { addr })?;
        }
        Ok(())
    }

    pub fn remove_call_whitelist(
        &mut self,
        caller: Address,
        addr: Address,
    ) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        if self.call_whitelist.remove(&addr) {
            self.journal.record(LedgerEvent::WhitelistRemoved { addr })?;
        }
        Ok(())
    }

    /// Toggle acceptance of delegated operations.
    pub fn switch_delegation(&mut self, caller: Address, enabled: bool) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        self.delegation_enabled = enabled;
        self.journal
            .record(LedgerEvent::DelegationSwitched { enabled })?;
        info!(enabled, "delegation switched");
        Ok(())
    }

    /// First step of the two-step admin rotation: name a pending admin.
    pub fn change_owner(&mut self, caller: Address, new_owner: Address) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        self.pending_admin = Some(new_owner);
        Ok(())
    }

    /// Second step: the pending admin claims the role.
    pub fn accept_ownership(&mut self, caller: Address) -> Result<(), LedgerError> {
        if self.pending_admin != Some(caller) {
            return Err(LedgerError::NotPendingAdmin { caller });
        }
        self.admin = caller;
        self.pending_admin = None;
        self.journal
            .record(LedgerEvent::OwnershipChanged { new_owner: caller })?;
        info!(new_owner = %caller, "ledger ownership changed");
        Ok(())
    }

    fn require_admin(&self, caller: Address) -> Result<(), LedgerError> {
        if caller != self.admin {
            return Err(LedgerError::NotAdmin { caller });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Balance plumbing (crate-internal)
    // ------------------------------------------------------------------

    /// Policy-checked debit: sufficient balance and lock floor at `now`.
    pub(crate) fn debit(
        &mut self,
        addr: Address,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let have = self.balance_of(&addr);
        if have < amount {
            return Err(LedgerError::InsufficientBalance { have, need: amount });
        }
        if let Some(lock) = self.locks.get(&addr) {
            if now < lock.unlock_at {
                let transferable = have.saturating_sub(lock.amount);
                if transferable < amount {
                    return Err(LedgerError::BalanceLocked {
                        locked: lock.amount,
                        transferable,
                        need: amount,
                    });
                }
            }
        }
        self.debit_raw(addr, amount)
    }

    /// Unconditional debit, used for rollback paths where policy must not
    /// re-apply.
    pub(crate) fn debit_raw(&mut self, addr: Address, amount: Amount) -> Result<(), LedgerError> {
        let entry = self.balances.entry(addr).or_insert(0);
        *entry = entry.checked_sub(amount).ok_or(LedgerError::Underflow)?;
        Ok(())
    }

    pub(crate) fn credit(&mut self, addr: Address, amount: Amount) -> Result<(), LedgerError> {
        let entry = self.balances.entry(addr).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub(crate) fn nonce_consumed(&self, signer: &Address, nonce: u64) -> bool {
        self.consumed_nonces
            .get(signer)
            .map(|set| set.contains(&nonce))
            .unwrap_or(false)
    }

    pub(crate) fn consume_nonce(&mut self, signer: Address, nonce: u64) {
        self.consumed_nonces.entry(signer).or_default().insert(nonce);
    }

    pub(crate) fn record_event(&mut self, event: LedgerEvent) -> Result<(), LedgerError> {
        self.journal.record(event)?;
        Ok(())
    }
}
