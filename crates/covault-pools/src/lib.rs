//! Covault multisig pools.
//!
//! N-of-M governance over ledger funds: a rotating owner registry, the
//! propose/confirm/execute proposal engine, the contributor vesting pool,
//! the scheduled-mint creators pool, and the signature-driven user-growth
//! pool.

#![deny(unsafe_code)]

pub mod contributor;
pub mod engine;
pub mod error;
pub mod registry;
pub mod scheduled;
pub mod signature_pool;
pub mod types;

pub use contributor::{ContributorPool, ContributorPoolConfig, VestingGrant};
pub use engine::{Proposal, ProposalAction, ProposalEngine, ProposalStatus};
pub use error::PoolError;
pub use registry::OwnerRegistry;
pub use scheduled::{CreatorsPool, CreatorsPoolConfig, MintSchedule};
pub use signature_pool::{NoncedApproval, UserGrowthPool, UserGrowthPoolConfig};
pub use types::PoolEvent;
