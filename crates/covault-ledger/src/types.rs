use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use covault_types::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// The privileged minting channels. Each kind registers exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Crowdsale,
    ContributorPool,
    CreatorsPools,
    UserGrowthPools,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Crowdsale => "crowdsale",
            Self::ContributorPool => "contributor_pool",
            Self::CreatorsPools => "creators_pools",
            Self::UserGrowthPools => "user_growth_pools",
        };
        f.write_str(name)
    }
}

/// Registration record of one mint channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRegistration {
    pub addresses: BTreeSet<Address>,
    pub ceiling: Amount,
    pub minted: Amount,
}

impl ChannelRegistration {
    pub fn remaining(&self) -> Amount {
        self.ceiling.saturating_sub(self.minted)
    }
}

/// The four channel slots. A `None` slot has not been registered yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MintChannels {
    crowdsale: Option<ChannelRegistration>,
    contributor_pool: Option<ChannelRegistration>,
    creators_pools: Option<ChannelRegistration>,
    user_growth_pools: Option<ChannelRegistration>,
}

impl MintChannels {
    fn slot(&self, kind: ChannelKind) -> &Option<ChannelRegistration> {
        match kind {
            ChannelKind::Crowdsale => &self.crowdsale,
            ChannelKind::ContributorPool => &self.contributor_pool,
            ChannelKind::CreatorsPools => &self.creators_pools,
            ChannelKind::UserGrowthPools => &self.user_growth_pools,
        }
    }

    fn slot_mut(&mut self, kind: ChannelKind) -> &mut Option<ChannelRegistration> {
        match kind {
            ChannelKind::Crowdsale => &mut self.crowdsale,
            ChannelKind::ContributorPool => &mut self.contributor_pool,
            ChannelKind::CreatorsPools => &mut self.creators_pools,
            ChannelKind::UserGrowthPools => &mut self.user_growth_pools,
        }
    }

    /// Register a channel. Each kind registers at most once.
    pub fn register(
        &mut self,
        kind: ChannelKind,
        addresses: BTreeSet<Address>,
        ceiling: Amount,
    ) -> Result<(), LedgerError> {
        let slot = self.slot_mut(kind);
        if slot.is_some() {
            return Err(LedgerError::ChannelAlreadyRegistered { channel: kind });
        }
        *slot = Some(ChannelRegistration {
            addresses,
            ceiling,
            minted: 0,
        });
        Ok(())
    }

    pub fn registration(&self, kind: ChannelKind) -> Result<&ChannelRegistration, LedgerError> {
        self.slot(kind)
            .as_ref()
            .ok_or(LedgerError::ChannelNotRegistered { channel: kind })
    }

    /// Whether `caller` is a registered address of the channel.
    pub fn is_authorized(&self, kind: ChannelKind, caller: &Address) -> bool {
        self.slot(kind)
            .as_ref()
            .map(|reg| reg.addresses.contains(caller))
            .unwrap_or(false)
    }

    /// Account a mint against the channel ceiling.
    pub fn record_mint(&mut self, kind: ChannelKind, amount: Amount) -> Result<(), LedgerError> {
        let reg = self
            .slot_mut(kind)
            .as_mut()
            .ok_or(LedgerError::ChannelNotRegistered { channel: kind })?;
        let minted = reg
            .minted
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        if minted > reg.ceiling {
            return Err(LedgerError::CeilingExceeded {
                channel: kind,
                ceiling: reg.ceiling,
                minted: reg.minted,
                requested: amount,
            });
        }
        reg.minted = minted;
        Ok(())
    }
}

/// A single-override balance floor: while `now < unlock_at` the holder's
/// balance may not drop below `amount`. Replaced wholesale by a new lock,
/// inert (not cleared) once the unlock time passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub amount: Amount,
    pub unlock_at: DateTime<Utc>,
}

/// Events recorded by the token ledger journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    Genesis {
        holder: Address,
        supply: Amount,
    },
    Transfer {
        from: Address,
        to: Address,
        value: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: Amount,
    },
    Lock {
        addr: Address,
        value: Amount,
        unlock_at: DateTime<Utc>,
    },
    Mint {
        channel: ChannelKind,
        to: Address,
        value: Amount,
    },
    Burn {
        from: Address,
        value: Amount,
    },
    ChannelRegistered {
        channel: ChannelKind,
        addresses: Vec<Address>,
        ceiling: Amount,
    },
    WhitelistAdded {
        addr: Address,
    },
    WhitelistRemoved {
        addr: Address,
    },
    DelegationSwitched {
        enabled: bool,
    },
    DelegatedTransfer {
        from: Address,
        relayer: Address,
        reward: Amount,
        nonce: u64,
    },
    OwnershipChanged {
        new_owner: Address,
    },
}
