use covault_ledger::{JournalError, LedgerError};
use covault_types::{Address, ErrorClass};
use thiserror::Error;

/// Crowdsale engine errors.
#[derive(Debug, Error)]
pub enum SaleError {
    #[error("caller {caller} is not the sale admin")]
    NotAdmin { caller: Address },

    #[error("sale is finalized")]
    SaleFinalized,

    #[error("sale already finalized")]
    AlreadyFinalized,

    #[error("private fund already finalized")]
    PrivateFundFinalized,

    #[error("buyer {buyer} has not passed KYC")]
    KycMissing { buyer: Address },

    #[error("{addr} is already KYC-registered")]
    KycAlreadyRegistered { addr: Address },

    #[error("{addr} already has a referrer")]
    ReferrerAlreadyRegistered { addr: Address },

    #[error("{addr} cannot refer itself")]
    SelfReferral { addr: Address },

    #[error("zero amount not allowed")]
    ZeroAmount,

    #[error("arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

impl SaleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ZeroAmount | Self::SelfReferral { .. } => ErrorClass::Validation,
            Self::NotAdmin { .. } | Self::KycMissing { .. } => ErrorClass::Authorization,
            Self::SaleFinalized
            | Self::AlreadyFinalized
            | Self::PrivateFundFinalized
            | Self::KycAlreadyRegistered { .. }
            | Self::ReferrerAlreadyRegistered { .. }
            | Self::Journal(_) => ErrorClass::State,
            Self::Overflow => ErrorClass::Arithmetic,
            Self::Ledger(inner) => inner.class(),
        }
    }
}
