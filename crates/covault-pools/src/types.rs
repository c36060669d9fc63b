use covault_types::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Events recorded by pool journals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolEvent {
    GiveProposal {
        id: u64,
        proposer: Address,
        to: Address,
        value: Amount,
    },
    TransferProposal {
        id: u64,
        proposer: Address,
        to: Address,
        value: Amount,
    },
    SetOwnersProposal {
        id: u64,
        proposer: Address,
        new_owners: Vec<Address>,
        new_threshold: u32,
    },
    ProposalConfirmation {
        id: u64,
        confirmer: Address,
    },
    ProposalExecution {
        id: u64,
        executer: Address,
    },
    Claimed {
        id: u64,
    },
    ScheduledMint {
        value: Amount,
    },
    SignedTransfer {
        to: Address,
        value: Amount,
    },
    OwnersRotated {
        generation: u64,
        owners: Vec<Address>,
        threshold: u32,
    },
}
