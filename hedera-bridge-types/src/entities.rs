// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persistent entity records for the transfer state machine.
//!
//! `Transfer` is the aggregate root; `Fee`, `Schedule` and `Message` rows
//! reference it by transfer id and are persisted independently through the
//! repository contracts. Status strings are stable identifiers — they are
//! persisted and used as metric labels, so they must never change.

use crate::base_types::Timestamp;
use serde::{Deserialize, Serialize};

/// Lifecycle of a transfer: created `Initial`, finalized exactly once to
/// `Completed` (quorum reached or receiver paid) or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Initial,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Initial => "INITIAL",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Initial)
    }
}

/// Lifecycle of a submitted scheduled operation (and of its fee rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Submitted,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Submitted => "SUBMITTED",
            OperationStatus::Completed => "COMPLETED",
            OperationStatus::Failed => "FAILED",
        }
    }
}

/// The kind of deferred native-ledger operation a `Schedule` row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleOperation {
    Transfer,
    Mint,
    Burn,
    Approve,
}

impl ScheduleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleOperation::Transfer => "TRANSFER",
            ScheduleOperation::Mint => "MINT",
            ScheduleOperation::Burn => "BURN",
            ScheduleOperation::Approve => "APPROVE",
        }
    }
}

/// One cross-chain transfer attempt. Exactly one row per transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Natural key: `{payer}-{seconds}-{nanos}` or `{txHash}-{logIndex}`.
    pub transaction_id: String,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    /// Which of source/target is the asset's native chain.
    pub native_chain_id: u64,
    pub source_asset: String,
    pub target_asset: String,
    pub native_asset: String,
    pub receiver: String,
    /// Decimal string, arbitrary precision.
    pub amount: String,
    /// Decimal string; empty until the fee is computed.
    pub fee: String,
    pub status: TransferStatus,
    pub is_nft: bool,
    /// NFT-only.
    pub serial_number: i64,
    /// NFT-only.
    pub metadata: String,
    pub originator: String,
    pub timestamp: Timestamp,
}

impl Transfer {
    /// Whether the asset is native to the chain this transfer leaves from.
    pub fn is_native(&self) -> bool {
        self.source_chain_id == self.native_chain_id
    }
}

/// A per-recipient share of a computed bridge fee, carried by a scheduled
/// fee-disbursing transaction. `transaction_id` names that scheduled
/// transaction, not the parent transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub transaction_id: String,
    pub schedule_id: String,
    /// Signed decimal string.
    pub amount: String,
    pub status: OperationStatus,
    pub transfer_id: Option<String>,
}

/// A record of any scheduled transaction submitted to the native ledger.
///
/// Serves recovery (resume watching `SUBMITTED` rows after restart) and
/// idempotence: the schedule memo equals the originating transfer id, which
/// lets the poller match an observed execution back to its intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub transaction_id: String,
    pub schedule_id: String,
    pub operation: ScheduleOperation,
    /// Whether this schedule pays the end receiver (terminal leg) as opposed
    /// to an intermediate/bridge account.
    pub has_receiver: bool,
    pub status: OperationStatus,
    pub transfer_id: Option<String>,
}

/// One validator's signature over one transfer's authorization payload.
/// `(transfer_id, signature)` is de-duplicated before insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub transfer_id: String,
    /// Hex-encoded digest of the canonical payload.
    pub hash: String,
    /// Hex-encoded recoverable signature.
    pub signature: String,
    /// Recovered signer identity (EVM address).
    pub signer: String,
    pub transaction_timestamp: i64,
}
