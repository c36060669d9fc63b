use chrono::{DateTime, Utc};
use covault_crypto::CryptoError;
use covault_ledger::{JournalError, LedgerError};
use covault_types::{Address, Amount, ErrorClass};
use thiserror::Error;

/// Multisig pool errors.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid owner set: {0}")]
    InvalidOwnerSet(String),

    #[error("caller {caller} is not a current owner")]
    NotOwner { caller: Address },

    #[error("proposal {id} not found")]
    NotFound { id: u64 },

    #[error("proposal is stale: created under generation {proposal}, registry is at {current}")]
    StaleGeneration { proposal: u64, current: u64 },

    #[error("proposal {id} already executed")]
    AlreadyExecuted { id: u64 },

    #[error("owner {owner} already confirmed proposal {id}")]
    AlreadyConfirmed { id: u64, owner: Address },

    #[error("proposal {id} already holds the threshold of {threshold} confirmations")]
    ThresholdExceeded { id: u64, threshold: u32 },

    #[error("proposal {id} has {have} of {need} required confirmations")]
    InsufficientConfirmations { id: u64, have: u32, need: u32 },

    #[error("zero amount not allowed")]
    ZeroAmount,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("proposal {id} carries an action this pool does not execute")]
    UnsupportedAction { id: u64 },

    #[error(
        "pool funds insufficient: {available} available, {committed} committed to unclaimed grants, {requested} requested"
    )]
    InsufficientPoolFunds {
        available: Amount,
        committed: Amount,
        requested: Amount,
    },

    #[error("proposal action failed: {0}")]
    ActionFailed(String),

    #[error("no executed grant for proposal {id}")]
    GrantNotFound { id: u64 },

    #[error("grant {id} already claimed")]
    AlreadyClaimed { id: u64 },

    #[error("grants unlock at {unlock_at}")]
    NotUnlockedYet { unlock_at: DateTime<Utc> },

    #[error("claimant {claimant} is not the recipient of grant {id}")]
    WrongClaimant { id: u64, claimant: Address },

    #[error("scheduled mint opens at {mint_at}")]
    TooEarly { mint_at: DateTime<Utc> },

    #[error("scheduled mint already performed")]
    AlreadyMinted,

    #[error("nonce {nonce} already consumed by {signer}")]
    NonceAlreadyUsed { signer: Address, nonce: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

impl PoolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidOwnerSet(_) | Self::ZeroAmount => ErrorClass::Validation,
            Self::NotOwner { .. } | Self::WrongClaimant { .. } => ErrorClass::Authorization,
            Self::NotFound { .. }
            | Self::StaleGeneration { .. }
            | Self::AlreadyExecuted { .. }
            | Self::AlreadyConfirmed { .. }
            | Self::ThresholdExceeded { .. }
            | Self::InsufficientConfirmations { .. }
            | Self::UnsupportedAction { .. }
            | Self::ActionFailed(_)
            | Self::GrantNotFound { .. }
            | Self::AlreadyClaimed { .. }
            | Self::NotUnlockedYet { .. }
            | Self::TooEarly { .. }
            | Self::AlreadyMinted
            | Self::NonceAlreadyUsed { .. }
            | Self::Journal(_) => ErrorClass::State,
            Self::Overflow | Self::InsufficientPoolFunds { .. } => ErrorClass::Arithmetic,
            Self::Ledger(inner) => inner.class(),
            Self::Crypto(inner) => inner.class(),
        }
    }
}
