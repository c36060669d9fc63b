use std::collections::BTreeMap;

use covault_types::{Address, Amount};
use thiserror::Error;

/// Rejection raised by a transfer receiver hook. Any rejection rolls the
/// triggering transfer back.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ReceiverError(pub String);

impl ReceiverError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Hook invoked after a `transfer_and_call` credits a whitelisted address.
pub trait TransferReceiver {
    fn on_token_transfer(
        &mut self,
        from: Address,
        value: Amount,
        payload: &[u8],
    ) -> Result<(), ReceiverError>;
}

/// Receiver hooks by address. The registry is supplied by the embedder per
/// call; the ledger itself only persists the whitelist, never the hooks.
#[derive(Default)]
pub struct ReceiverRegistry {
    receivers: BTreeMap<Address, Box<dyn TransferReceiver>>,
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, addr: Address, receiver: Box<dyn TransferReceiver>) {
        self.receivers.insert(addr, receiver);
    }

    pub fn get_mut(&mut self, addr: &Address) -> Option<&mut Box<dyn TransferReceiver>> {
        self.receivers.get_mut(addr)
    }
}
