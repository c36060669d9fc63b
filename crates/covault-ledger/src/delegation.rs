//! Signature-authorized delegated transfers.
//!
//! A signer authorizes an order off-ledger; any relayer may submit it and
//! claim a reward bounded by the signer's `max_reward`. The order digest
//! binds the ledger instance, the entry-point name, every payload field,
//! and the nonce, so an authorization can never be replayed across
//! instances, methods, or calls.

use chrono::{DateTime, Utc};
use covault_crypto::{typed_digest, verify_signed, SignedApproval, TypedDigest};
use covault_types::{Address, Amount};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::TokenLedger;
use crate::receiver::ReceiverRegistry;
use crate::types::LedgerEvent;

/// Order for a delegated single-recipient transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOrder {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub max_reward: Amount,
    pub nonce: u64,
}

/// Order for a delegated multi-recipient transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTransferOrder {
    pub from: Address,
    pub recipients: Vec<(Address, Amount)>,
    pub max_reward: Amount,
    pub nonce: u64,
}

/// Order for a delegated transfer-and-call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTransferOrder {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub payload: Vec<u8>,
    pub max_reward: Amount,
    pub nonce: u64,
}

impl TokenLedger {
    /// Digest a [`TransferOrder`] for off-ledger signing.
    pub fn hash_transfer_order(&self, order: &TransferOrder) -> Result<TypedDigest, LedgerError> {
        Ok(typed_digest(&self.instance(), "transfer_delegated", order)?)
    }

    /// Digest a [`MultiTransferOrder`] for off-ledger signing.
    pub fn hash_multi_transfer_order(
        &self,
        order: &MultiTransferOrder,
    ) -> Result<TypedDigest, LedgerError> {
        Ok(typed_digest(
            &self.instance(),
            "transfer_multiple_delegated",
            order,
        )?)
    }

    /// Digest a [`CallTransferOrder`] for off-ledger signing.
    pub fn hash_call_transfer_order(
        &self,
        order: &CallTransferOrder,
    ) -> Result<TypedDigest, LedgerError> {
        Ok(typed_digest(
            &self.instance(),
            "transfer_and_call_delegated",
            order,
        )?)
    }

    /// Execute a signed transfer order on behalf of its signer, paying the
    /// relaying caller `claimed_reward` out of the signer's balance.
    pub fn transfer_delegated(
        &mut self,
        relayer: Address,
        order: &TransferOrder,
        claimed_reward: Amount,
        approval: &SignedApproval,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if order.amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let digest = self.hash_transfer_order(order)?;
        self.ensure_delegation(order.from, order.max_reward, claimed_reward, order.nonce, &digest, approval)?;

        let total = order
            .amount
            .checked_add(claimed_reward)
            .ok_or(LedgerError::Overflow)?;
        self.debit(order.from, total, now)?;
        self.credit(order.to, order.amount)?;
        if claimed_reward > 0 {
            self.credit(relayer, claimed_reward)?;
        }
        self.consume_nonce(order.from, order.nonce);

        self.record_event(LedgerEvent::Transfer {
            from: order.from,
            to: order.to,
            value: order.amount,
        })?;
        if claimed_reward > 0 {
            self.record_event(LedgerEvent::Transfer {
                from: order.from,
                to: relayer,
                value: claimed_reward,
            })?;
        }
        self.record_event(LedgerEvent::DelegatedTransfer {
            from: order.from,
            relayer,
            reward: claimed_reward,
            nonce: order.nonce,
        })?;
        debug!(from = %order.from, relayer = %relayer, value = order.amount, reward = claimed_reward, "delegated transfer");
        Ok(())
    }

    /// Delegated variant of `transfer_multiple`, same atomicity.
    pub fn transfer_multiple_delegated(
        &mut self,
        relayer: Address,
        order: &MultiTransferOrder,
        claimed_reward: Amount,
        approval: &SignedApproval,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if order.recipients.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        let mut principal: Amount = 0;
        for (_, value) in &order.recipients {
            if *value == 0 {
                return Err(LedgerError::ZeroAmount);
            }
            principal = principal.checked_add(*value).ok_or(LedgerError::Overflow)?;
        }
        let digest = self.hash_multi_transfer_order(order)?;
        self.ensure_delegation(order.from, order.max_reward, claimed_reward, order.nonce, &digest, approval)?;

        let total = principal
            .checked_add(claimed_reward)
            .ok_or(LedgerError::Overflow)?;
        self.debit(order.from, total, now)?;
        for (to, value) in &order.recipients {
            self.credit(*to, *value)?;
        }
        if claimed_reward > 0 {
            self.credit(relayer, claimed_reward)?;
        }
        self.consume_nonce(order.from, order.nonce);

        for (to, value) in &order.recipients {
            self.record_event(LedgerEvent::Transfer {
                from: order.from,
                to: *to,
                value: *value,
            })?;
        }
        if claimed_reward > 0 {
            self.record_event(LedgerEvent::Transfer {
                from: order.from,
                to: relayer,
                value: claimed_reward,
            })?;
        }
        self.record_event(LedgerEvent::DelegatedTransfer {
            from: order.from,
            relayer,
            reward: claimed_reward,
            nonce: order.nonce,
        })?;
        Ok(())
    }

    /// Delegated variant of `transfer_and_call`. A hook rejection reverts
    /// the balance move and leaves the nonce unconsumed.
    pub fn transfer_and_call_delegated(
        &mut self,
        relayer: Address,
        order: &CallTransferOrder,
        claimed_reward: Amount,
        approval: &SignedApproval,
        receivers: &mut ReceiverRegistry,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if order.amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if !self.is_whitelisted(&order.to) {
            return Err(LedgerError::NotWhitelisted { addr: order.to });
        }
        let digest = self.hash_call_transfer_order(order)?;
        self.ensure_delegation(order.from, order.max_reward, claimed_reward, order.nonce, &digest, approval)?;

        let receiver = receivers
            .get_mut(&order.to)
            .ok_or(LedgerError::ReceiverMissing { addr: order.to })?;

        let total = order
            .amount
            .checked_add(claimed_reward)
            .ok_or(LedgerError::Overflow)?;
        self.debit(order.from, total, now)?;
        self.credit(order.to, order.amount)?;
        if let Err(rejection) = receiver.on_token_transfer(order.from, order.amount, &order.payload)
        {
            self.debit_raw(order.to, order.amount)?;
            self.credit(order.from, total)?;
            return Err(LedgerError::ReceiverRejected {
                addr: order.to,
                reason: rejection.to_string(),
            });
        }
        if claimed_reward > 0 {
            self.credit(relayer, claimed_reward)?;
        }
        self.consume_nonce(order.from, order.nonce);

        self.record_event(LedgerEvent::Transfer {
            from: order.from,
            to: order.to,
            value: order.amount,
        })?;
        if claimed_reward > 0 {
            self.record_event(LedgerEvent::Transfer {
                from: order.from,
                to: relayer,
                value: claimed_reward,
            })?;
        }
        self.record_event(LedgerEvent::DelegatedTransfer {
            from: order.from,
            relayer,
            reward: claimed_reward,
            nonce: order.nonce,
        })?;
        Ok(())
    }

    /// Shared prelude for every delegated entry point: switch, reward
    /// bound, signature, and nonce freshness, in that order.
    fn ensure_delegation(
        &self,
        from: Address,
        max_reward: Amount,
        claimed_reward: Amount,
        nonce: u64,
        digest: &TypedDigest,
        approval: &SignedApproval,
    ) -> Result<(), LedgerError> {
        if !self.delegation_enabled() {
            return Err(LedgerError::DelegationDisabled);
        }
        if claimed_reward > max_reward {
            return Err(LedgerError::RewardExceedsMax {
                max_reward,
                claimed: claimed_reward,
            });
        }
        let signer = verify_signed(digest, approval)?;
        if signer != from {
            return Err(LedgerError::DelegateMismatch {
                expected: from,
                signer,
            });
        }
        if self.nonce_consumed(&from, nonce) {
            return Err(LedgerError::NonceAlreadyUsed {
                signer: from,
                nonce,
            });
        }
        Ok(())
    }
}
