//! Covault crowdsale engine.
//!
//! KYC-gated purchases, referrer bonuses, private-fund allocations locked
//! until a fixed unlock time, and one-shot finalization. All supply the
//! sale issues flows through the ledger's crowdsale mint channel and is
//! therefore bounded by the channel ceiling.

#![deny(unsafe_code)]

pub mod error;
pub mod sale;

pub use error::SaleError;
pub use sale::{CrowdSale, SaleConfig, SaleEvent};
