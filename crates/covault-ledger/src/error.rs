use covault_crypto::CryptoError;
use covault_types::{Address, Amount, ErrorClass};
use thiserror::Error;

use crate::journal::JournalError;
use crate::types::ChannelKind;

/// Token ledger errors. Every rejected operation leaves the ledger
/// untouched; the variant carries the condition that triggered it.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("zero amount not allowed")]
    ZeroAmount,

    #[error("empty recipient batch")]
    EmptyBatch,

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("balance locked: {locked} locked, {transferable} transferable, need {need}")]
    BalanceLocked {
        locked: Amount,
        transferable: Amount,
        need: Amount,
    },

    #[error("insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: Amount, need: Amount },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("caller {caller} is not the ledger admin")]
    NotAdmin { caller: Address },

    #[error("caller {caller} is not the pending admin")]
    NotPendingAdmin { caller: Address },

    #[error("channel {channel} is already registered")]
    ChannelAlreadyRegistered { channel: ChannelKind },

    #[error("channel {channel} is not registered")]
    ChannelNotRegistered { channel: ChannelKind },

    #[error("caller {caller} is not a registered {channel} address")]
    NotChannelAddress {
        channel: ChannelKind,
        caller: Address,
    },

    #[error(
        "channel {channel} ceiling exceeded: ceiling {ceiling}, minted {minted}, requested {requested}"
    )]
    CeilingExceeded {
        channel: ChannelKind,
        ceiling: Amount,
        minted: Amount,
        requested: Amount,
    },

    #[error("recipient {addr} is not on the transfer-and-call whitelist")]
    NotWhitelisted { addr: Address },

    #[error("no receiver registered for whitelisted address {addr}")]
    ReceiverMissing { addr: Address },

    #[error("receiver {addr} rejected the transfer: {reason}")]
    ReceiverRejected { addr: Address, reason: String },

    #[error("delegated operations are disabled")]
    DelegationDisabled,

    #[error("claimed reward {claimed} exceeds authorized maximum {max_reward}")]
    RewardExceedsMax { max_reward: Amount, claimed: Amount },

    #[error("delegation order signed by {signer}, expected {expected}")]
    DelegateMismatch { expected: Address, signer: Address },

    #[error("nonce {nonce} already consumed by {signer}")]
    NonceAlreadyUsed { signer: Address, nonce: u64 },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("snapshot store failure: {0}")]
    Snapshot(String),
}

impl LedgerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ZeroAmount | Self::EmptyBatch | Self::RewardExceedsMax { .. } => {
                ErrorClass::Validation
            }
            Self::NotAdmin { .. }
            | Self::NotPendingAdmin { .. }
            | Self::NotChannelAddress { .. }
            | Self::NotWhitelisted { .. }
            | Self::DelegateMismatch { .. } => ErrorClass::Authorization,
            Self::BalanceLocked { .. }
            | Self::ChannelAlreadyRegistered { .. }
            | Self::ChannelNotRegistered { .. }
            | Self::ReceiverMissing { .. }
            | Self::ReceiverRejected { .. }
            | Self::DelegationDisabled
            | Self::NonceAlreadyUsed { .. }
            | Self::Journal(_)
            | Self::Snapshot(_) => ErrorClass::State,
            Self::InsufficientBalance { .. }
            | Self::InsufficientAllowance { .. }
            | Self::Overflow
            | Self::Underflow
            | Self::CeilingExceeded { .. } => ErrorClass::Arithmetic,
            Self::Crypto(inner) => inner.class(),
        }
    }
}
