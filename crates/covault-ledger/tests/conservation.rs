//! Supply conservation under arbitrary operation sequences.

use chrono::{DateTime, Utc};
use covault_ledger::{ChannelKind, LedgerConfig, TokenLedger};
use covault_types::{Address, Amount, InstanceId};
use proptest::collection::vec;
use proptest::prelude::*;

fn addr(n: u8) -> Address {
    Address::new([n + 1; 32])
}

fn t(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("valid timestamp")
}

const ACCOUNTS: u8 = 5;
const MINTER: u8 = 9;

#[derive(Debug, Clone)]
enum Op {
    Transfer { from: u8, to: u8, value: u64 },
    Approve { owner: u8, spender: u8, value: u64 },
    TransferFrom { spender: u8, from: u8, to: u8, value: u64 },
    Burn { from: u8, value: u64 },
    Mint { to: u8, value: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let account = 0..ACCOUNTS;
    let value = 0u64..5_000;
    prop_oneof![
        (account.clone(), account.clone(), value.clone())
            .prop_map(|(from, to, value)| Op::Transfer { from, to, value }),
        (account.clone(), account.clone(), value.clone())
            .prop_map(|(owner, spender, value)| Op::Approve {
                owner,
                spender,
                value
            }),
        (account.clone(), account.clone(), account.clone(), value.clone()).prop_map(
            |(spender, from, to, value)| Op::TransferFrom {
                spender,
                from,
                to,
                value
            }
        ),
        (account.clone(), value.clone()).prop_map(|(from, value)| Op::Burn { from, value }),
        (account, value).prop_map(|(to, value)| Op::Mint { to, value }),
    ]
}

fn fresh_ledger() -> TokenLedger {
    let mut ledger = TokenLedger::new(LedgerConfig {
        instance: InstanceId::from_label("conservation-test"),
        name: "Covault".to_string(),
        symbol: "CVT".to_string(),
        decimals: 18,
        initial_holder: addr(0),
        initial_supply: 10_000,
    })
    .expect("ledger created");
    ledger
        .register_crowdsale(addr(0), addr(MINTER), 1_000_000)
        .expect("channel registered");
    ledger
}

fn sum_of_balances(ledger: &TokenLedger) -> Amount {
    ledger.balances().values().sum()
}

proptest! {
    #[test]
    fn supply_equals_sum_of_balances_at_every_step(ops in vec(op_strategy(), 0..60)) {
        let mut ledger = fresh_ledger();
        let now = t(0);

        for op in ops {
            // Rejected operations must leave the ledger untouched, so the
            // invariant is checked after every attempt, not only successes.
            let before = (sum_of_balances(&ledger), ledger.total_supply());
            let result = match op {
                Op::Transfer { from, to, value } => {
                    ledger.transfer(addr(from), addr(to), value.into(), now)
                }
                Op::Approve { owner, spender, value } => {
                    ledger.approve(addr(owner), addr(spender), value.into())
                }
                Op::TransferFrom { spender, from, to, value } => {
                    ledger.transfer_from(addr(spender), addr(from), addr(to), value.into(), now)
                }
                Op::Burn { from, value } => ledger.burn(addr(from), value.into(), now),
                Op::Mint { to, value } => ledger.mint_channel(
                    addr(MINTER),
                    ChannelKind::Crowdsale,
                    addr(to),
                    value.into(),
                ),
            };

            let after = (sum_of_balances(&ledger), ledger.total_supply());
            prop_assert_eq!(after.0, after.1);
            if result.is_err() {
                prop_assert_eq!(before, after);
            }
        }

        prop_assert!(ledger.journal().verify_chain());
    }
}
