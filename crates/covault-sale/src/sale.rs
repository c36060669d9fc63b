use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use covault_ledger::{ChannelKind, Journal, LedgerError, TokenLedger};
use covault_types::{Address, Amount, InstanceId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SaleError;

/// Basis points denominator for the referrer bonus.
const BPS_DENOMINATOR: Amount = 10_000;

/// Sale parameters, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Token units minted per unit of base currency paid.
    pub rate: Amount,
    /// Referrer bonus in basis points of the purchased coins.
    pub referrer_bonus_bps: u32,
    /// Unlock time applied to finalized private-fund allocations.
    pub private_fund_unlock_at: DateTime<Utc>,
    /// Whether purchases require prior KYC registration.
    pub kyc_required: bool,
}

/// Events recorded by the sale journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleEvent {
    RegisterKyc {
        addr: Address,
    },
    RegisterReferrer {
        addr: Address,
        referrer: Address,
    },
    Purchase {
        addr: Address,
        base_paid: Amount,
        coins: Amount,
    },
    ReferrerBonus {
        referrer: Address,
        buyer: Address,
        bonus: Amount,
    },
    AddPrivateFund {
        addr: Address,
        value: Amount,
    },
    FinalizePrivateFund,
    Finalize,
}

/// The crowdsale engine.
///
/// Feeds the ledger exclusively through the crowdsale mint channel, so the
/// channel ceiling bounds everything the sale can ever issue: purchases,
/// referrer bonuses, and private-fund allocations alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrowdSale {
    instance: InstanceId,
    /// The registered crowdsale channel address the sale mints through.
    address: Address,
    admin: Address,
    config: SaleConfig,
    kyc: BTreeSet<Address>,
    referrers: BTreeMap<Address, Address>,
    private_allocations: BTreeMap<Address, Amount>,
    private_finalized: bool,
    finalized: bool,
    journal: Journal<SaleEvent>,
}

impl CrowdSale {
    pub fn new(
        instance: InstanceId,
        address: Address,
        admin: Address,
        config: SaleConfig,
    ) -> Self {
        Self {
            instance,
            address,
            admin,
            config,
            kyc: BTreeSet::new(),
            referrers: BTreeMap::new(),
            private_allocations: BTreeMap::new(),
            private_finalized: false,
            finalized: false,
            journal: Journal::new(),
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_kyc_registered(&self, addr: &Address) -> bool {
        self.kyc.contains(addr)
    }

    pub fn referrer_of(&self, addr: &Address) -> Option<Address> {
        self.referrers.get(addr).copied()
    }

    pub fn private_allocation(&self, addr: &Address) -> Amount {
        self.private_allocations.get(addr).copied().unwrap_or(0)
    }

    pub fn journal(&self) -> &Journal<SaleEvent> {
        &self.journal
    }

    pub fn register_kyc(&mut self, caller: Address, addr: Address) -> Result<(), SaleError> {
        self.require_admin(caller)?;
        if self.finalized {
            return Err(SaleError::SaleFinalized);
        }
        if !self.kyc.insert(addr) {
            return Err(SaleError::KycAlreadyRegistered { addr });
        }
        self.journal.record(SaleEvent::RegisterKyc { addr })?;
        debug!(addr = %addr, "kyc registered");
        Ok(())
    }

    pub fn register_referrer(
        &mut self,
        caller: Address,
        addr: Address,
        referrer: Address,
    ) -> Result<(), SaleError> {
        self.require_admin(caller)?;
        if self.finalized {
            return Err(SaleError::SaleFinalized);
        }
        if addr == referrer {
            return Err(SaleError::SelfReferral { addr });
        }
        if self.referrers.contains_key(&addr) {
            return Err(SaleError::ReferrerAlreadyRegistered { addr });
        }
        self.referrers.insert(addr, referrer);
        self.journal
            .record(SaleEvent::RegisterReferrer { addr, referrer })?;
        Ok(())
    }

    /// Exchange base currency for coins at the configured rate, minting
    /// through the crowdsale channel. A registered referrer additionally
    /// receives `coins * bonus_bps / 10_000`, atomically with the purchase.
    pub fn purchase(
        &mut self,
        buyer: Address,
        base_amount: Amount,
        ledger: &mut TokenLedger,
    ) -> Result<(), SaleError> {
        if self.finalized {
            return Err(SaleError::SaleFinalized);
        }
        if base_amount == 0 {
            return Err(SaleError::ZeroAmount);
        }
        if self.config.kyc_required && !self.kyc.contains(&buyer) {
            return Err(SaleError::KycMissing { buyer });
        }

        let coins = base_amount
            .checked_mul(self.config.rate)
            .ok_or(SaleError::Overflow)?;
        let referrer = self.referrers.get(&buyer).copied();
        let bonus = match referrer {
            Some(_) => coins
                .checked_mul(self.config.referrer_bonus_bps as Amount)
                .ok_or(SaleError::Overflow)?
                / BPS_DENOMINATOR,
            None => 0,
        };

        // Pre-check the ceiling across both mints so the purchase and the
        // bonus land atomically or not at all.
        let total = coins.checked_add(bonus).ok_or(SaleError::Overflow)?;
        let registration = ledger.channel(ChannelKind::Crowdsale)?;
        if registration.remaining() < total {
            return Err(SaleError::Ledger(LedgerError::CeilingExceeded {
                channel: ChannelKind::Crowdsale,
                ceiling: registration.ceiling,
                minted: registration.minted,
                requested: total,
            }));
        }

        ledger.mint_channel(self.address, ChannelKind::Crowdsale, buyer, coins)?;
        self.journal.record(SaleEvent::Purchase {
            addr: buyer,
            base_paid: base_amount,
            coins,
        })?;
        if let Some(referrer) = referrer {
            if bonus > 0 {
                ledger.mint_channel(self.address, ChannelKind::Crowdsale, referrer, bonus)?;
                self.journal.record(SaleEvent::ReferrerBonus {
                    referrer,
                    buyer,
                    bonus,
                })?;
            }
        }
        debug!(buyer = %buyer, base_amount, coins, bonus, "purchase");
        Ok(())
    }

    /// Accumulate a private-fund allocation ahead of finalization.
    pub fn add_private_fund(
        &mut self,
        caller: Address,
        addr: Address,
        value: Amount,
    ) -> Result<(), SaleError> {
        self.require_admin(caller)?;
        if self.private_finalized {
            return Err(SaleError::PrivateFundFinalized);
        }
        if value == 0 {
            return Err(SaleError::ZeroAmount);
        }
        let entry = self.private_allocations.entry(addr).or_insert(0);
        *entry = entry.checked_add(value).ok_or(SaleError::Overflow)?;
        self.journal
            .record(SaleEvent::AddPrivateFund { addr, value })?;
        Ok(())
    }

    /// One-shot: mint every private allocation and hand it out under the
    /// configured lock, so investors cannot move the funds before the
    /// unlock time.
    pub fn finalize_private_fund(
        &mut self,
        caller: Address,
        ledger: &mut TokenLedger,
        now: DateTime<Utc>,
    ) -> Result<(), SaleError> {
        self.require_admin(caller)?;
        if self.private_finalized {
            return Err(SaleError::PrivateFundFinalized);
        }

        let total = self
            .private_allocations
            .values()
            .try_fold(0 as Amount, |acc, value| acc.checked_add(*value))
            .ok_or(SaleError::Overflow)?;
        let registration = ledger.channel(ChannelKind::Crowdsale)?;
        if registration.remaining() < total {
            return Err(SaleError::Ledger(LedgerError::CeilingExceeded {
                channel: ChannelKind::Crowdsale,
                ceiling: registration.ceiling,
                minted: registration.minted,
                requested: total,
            }));
        }

        if total > 0 {
            ledger.mint_channel(self.address, ChannelKind::Crowdsale, self.address, total)?;
            for (addr, value) in &self.private_allocations {
                ledger.transfer_and_lock(
                    self.address,
                    *addr,
                    *value,
                    self.config.private_fund_unlock_at,
                    now,
                )?;
            }
        }
        self.private_finalized = true;
        self.journal.record(SaleEvent::FinalizePrivateFund)?;
        info!(total, investors = self.private_allocations.len(), "private fund finalized");
        Ok(())
    }

    /// Close the sale. Subsequent purchases and registrations fail.
    pub fn finalize(&mut self, caller: Address) -> Result<(), SaleError> {
        self.require_admin(caller)?;
        if self.finalized {
            return Err(SaleError::AlreadyFinalized);
        }
        self.finalized = true;
        self.journal.record(SaleEvent::Finalize)?;
        info!("sale finalized");
        Ok(())
    }

    fn require_admin(&self, caller: Address) -> Result<(), SaleError> {
        if caller != self.admin {
            return Err(SaleError::NotAdmin { caller });
        }
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

    const SALE: u8 = 80;

    fn setup(ceiling: Amount) -> (CrowdSale, TokenLedger) {
        let mut ledger = TokenLedger::new(LedgerConfig {
            instance: InstanceId::from_label("sale-ledger"),
            name: "Covault".to_string(),
            symbol: "CVT".to_string(),
            decimals: 18,
            initial_holder: addr(1),
            initial_supply: 0,
        })
        .expect("ledger created");
        ledger.register_crowdsale(addr(1), addr(SALE), ceiling).unwrap();

        let sale = CrowdSale::new(
            InstanceId::from_label("sale"),
            addr(SALE),
            addr(1),
            SaleConfig {
                rate: 100,
                referrer_bonus_bps: 500,
                private_fund_unlock_at: t(10_000),
                kyc_required: true,
            },
        );
        (sale, ledger)
    }

    #[test]
    fn purchase_requires_kyc_when_configured() {
        let (mut sale, mut ledger) = setup(1_000_000);
        let err = sale.purchase(addr(2), 10, &mut ledger).unwrap_err();
        assert!(matches!(err, SaleError::KycMissing { .. }));

        sale.register_kyc(addr(1), addr(2)).unwrap();
        sale.purchase(addr(2), 10, &mut ledger).unwrap();
        assert_eq!(ledger.balance_of(&addr(2)), 1_000);
        assert_eq!(ledger.total_supply(), 1_000);
    }

    #[test]
    fn kyc_registration_is_admin_only_and_unique() {
        let (mut sale, _ledger) = setup(1_000_000);
        assert!(matches!(
            sale.register_kyc(addr(2), addr(3)),
            Err(SaleError::NotAdmin { .. })
        ));
        sale.register_kyc(addr(1), addr(3)).unwrap();
        assert!(matches!(
            sale.register_kyc(addr(1), addr(3)),
            Err(SaleError::KycAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn referrer_bonus_is_floor_of_bps() {
        let (mut sale, mut ledger) = setup(1_000_000);
        sale.register_kyc(addr(1), addr(2)).unwrap();
        sale.register_referrer(addr(1), addr(2), addr(3)).unwrap();

        // 10 base * rate 100 = 1_000 coins; 5% bonus = 50.
        sale.purchase(addr(2), 10, &mut ledger).unwrap();
        assert_eq!(ledger.balance_of(&addr(2)), 1_000);
        assert_eq!(ledger.balance_of(&addr(3)), 50);
        assert_eq!(ledger.total_supply(), 1_050);
    }

    #[test]
    fn referrer_registration_rejects_self_and_duplicates() {
        let (mut sale, _ledger) = setup(1_000_000);
        assert!(matches!(
            sale.register_referrer(addr(1), addr(2), addr(2)),
            Err(SaleError::SelfReferral { .. })
        ));
        sale.register_referrer(addr(1), addr(2), addr(3)).unwrap();
        assert!(matches!(
            sale.register_referrer(addr(1), addr(2), addr(4)),
            Err(SaleError::ReferrerAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn purchase_with_bonus_is_atomic_under_the_ceiling() {
        // Ceiling covers the coins but not coins + bonus.
        let (mut sale, mut ledger) = setup(1_020);
        sale.register_kyc(addr(1), addr(2)).unwrap();
        sale.register_referrer(addr(1), addr(2), addr(3)).unwrap();

        let err = sale.purchase(addr(2), 10, &mut ledger).unwrap_err();
        assert!(matches!(
            err,
            SaleError::Ledger(LedgerError::CeilingExceeded { .. })
        ));
        // Nothing minted at all.
        assert_eq!(ledger.total_supply(), 0);
        assert_eq!(ledger.balance_of(&addr(2)), 0);
    }

    #[test]
    fn finalize_stops_purchases() {
        let (mut sale, mut ledger) = setup(1_000_000);
        sale.register_kyc(addr(1), addr(2)).unwrap();
        sale.finalize(addr(1)).unwrap();

        assert!(matches!(
            sale.purchase(addr(2), 10, &mut ledger),
            Err(SaleError::SaleFinalized)
        ));
        assert!(matches!(
            sale.finalize(addr(1)),
            Err(SaleError::AlreadyFinalized)
        ));
    }

    #[test]
    fn private_fund_allocations_accumulate_and_lock() {
        let (mut sale, mut ledger) = setup(1_000_000);
        sale.add_private_fund(addr(1), addr(5), 300).unwrap();
        sale.add_private_fund(addr(1), addr(5), 200).unwrap();
        sale.add_private_fund(addr(1), addr(6), 100).unwrap();
        assert_eq!(sale.private_allocation(&addr(5)), 500);

        sale.finalize_private_fund(addr(1), &mut ledger, t(0)).unwrap();
        assert_eq!(ledger.balance_of(&addr(5)), 500);
        assert_eq!(ledger.balance_of(&addr(6)), 100);

        // Locked until the configured unlock time.
        assert!(matches!(
            ledger.transfer(addr(5), addr(7), 1, t(100)),
            Err(LedgerError::BalanceLocked { .. })
        ));
        ledger.transfer(addr(5), addr(7), 1, t(10_000)).unwrap();

        assert!(matches!(
            sale.add_private_fund(addr(1), addr(5), 1),
            Err(SaleError::PrivateFundFinalized)
        ));
        assert!(matches!(
            sale.finalize_private_fund(addr(1), &mut ledger, t(0)),
            Err(SaleError::PrivateFundFinalized)
        ));
    }
}
