//! Covault token ledger.
//!
//! The single shared mutable resource of the system: account balances,
//! allowances, time-locks, bounded mint channels, the transfer-and-call
//! whitelist, and the delegation switch, all mutated through synchronous
//! all-or-nothing operations that append to a hash-chained event journal.

#![deny(unsafe_code)]

pub mod delegation;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod receiver;
pub mod storage;
pub mod types;

pub use delegation::{CallTransferOrder, MultiTransferOrder, TransferOrder};
pub use error::LedgerError;
pub use journal::{Journal, JournalEntry, JournalError};
pub use ledger::{LedgerConfig, TokenLedger};
pub use receiver::{ReceiverError, ReceiverRegistry, TransferReceiver};
pub use storage::SnapshotStore;
pub use types::{ChannelKind, ChannelRegistration, LedgerEvent, LockRecord, MintChannels};
