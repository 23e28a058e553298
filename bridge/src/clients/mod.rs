// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Capability traits for the node's external collaborators.
//!
//! Chain-specific SDK/RPC details stay behind these seams: the core only
//! needs to submit scheduled operations and topic messages, await their
//! outcomes, read the mirror node, and query the target-chain contracts for
//! membership and quorum.

pub mod mirror;

use crate::error::BridgeResult;
use async_trait::async_trait;
use ethers::types::Address as EthAddress;
use hedera_bridge_types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};

/// Result code the mirror node reports for a successful transaction.
pub const TRANSACTION_RESULT_SUCCESS: &str = "SUCCESS";

/// One entry of a transaction's transfer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTransferEntry {
    pub account: String,
    pub amount: i64,
    #[serde(default)]
    pub token_id: Option<String>,
}

/// One entry of a transaction's NFT transfer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorNftTransferEntry {
    pub sender_account_id: Option<String>,
    pub receiver_account_id: Option<String>,
    pub serial_number: i64,
    pub token_id: String,
}

/// A transaction as the mirror node reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTransaction {
    pub transaction_id: String,
    pub consensus_timestamp: String,
    pub result: String,
    #[serde(default)]
    pub scheduled: bool,
    /// Base64 transaction memo.
    #[serde(default, rename = "memo_base64")]
    pub memo_base64: Option<String>,
    /// For schedule-create transactions, the created schedule entity.
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub transfers: Vec<MirrorTransferEntry>,
    #[serde(default)]
    pub nft_transfers: Vec<MirrorNftTransferEntry>,
}

impl MirrorTransaction {
    pub fn is_successful(&self) -> bool {
        self.result == TRANSACTION_RESULT_SUCCESS
    }
}

/// A schedule entity; `memo` carries the originating transfer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSchedule {
    pub schedule_id: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub executed_timestamp: Option<String>,
}

/// Read-only access to the eventually-consistent mirror/indexer.
#[async_trait]
pub trait MirrorClient: Send + Sync {
    /// Transactions touching `account` strictly after `after`, oldest first.
    async fn account_transactions_after(
        &self,
        account: &EntityId,
        after: Timestamp,
    ) -> BridgeResult<Vec<MirrorTransaction>>;

    /// The executed scheduled transaction submitted under `transaction_id`,
    /// if it has been executed and is visible yet.
    async fn scheduled_transaction(
        &self,
        transaction_id: &str,
    ) -> BridgeResult<Option<MirrorTransaction>>;

    /// The schedule entity, for its memo.
    async fn schedule(&self, schedule_id: &str) -> BridgeResult<MirrorSchedule>;

    /// Transactions moving a specific NFT serial.
    async fn nft_transactions(
        &self,
        token_id: &str,
        serial_number: i64,
    ) -> BridgeResult<Vec<MirrorTransaction>>;
}

/// A credit or debit of a scheduled transfer. Negative amounts debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAmount {
    pub account: EntityId,
    pub amount: i64,
}

/// Outcome of submitting a scheduled operation to the native ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSubmission {
    /// Client-generated id of the inner scheduled transaction.
    pub transaction_id: String,
    pub schedule_id: String,
}

/// Submission of deferred (scheduled, multi-sig) operations to the native
/// ledger, plus the ledger's own wait-for-receipt mechanism.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Schedules a multi-party transfer. `memo` must be the transfer id it
    /// serves; the poller relies on that cross-reference.
    async fn submit_scheduled_transfer(
        &self,
        entries: &[AccountAmount],
        token_id: Option<&str>,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission>;

    async fn submit_scheduled_mint(
        &self,
        token_id: &str,
        amount: i64,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission>;

    async fn submit_scheduled_burn(
        &self,
        token_id: &str,
        amount: i64,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission>;

    async fn submit_scheduled_nft_transfer(
        &self,
        token_id: &str,
        serial_number: i64,
        sender: &EntityId,
        receiver: &EntityId,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission>;

    async fn submit_scheduled_nft_approve(
        &self,
        token_id: &str,
        serial_number: i64,
        spender: &EntityId,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission>;

    /// Blocks until the scheduled transaction is executed and mined.
    /// `Ok(())` means executed successfully; `ScheduleExecutionFailed` means
    /// it was mined but did not succeed.
    async fn await_scheduled_execution(&self, transaction_id: &str) -> BridgeResult<()>;
}

/// Publication on the shared consensus topic. `submit_message` returns only
/// after ledger-level receipt confirmation, so return-without-error means
/// "durably broadcast".
#[async_trait]
pub trait TopicClient: Send + Sync {
    async fn submit_message(&self, payload: Vec<u8>) -> BridgeResult<String>;
}

/// The target chains' bridge contract surface the core consumes. Quorum
/// arithmetic lives in the contract, not here.
#[async_trait]
pub trait BridgeContracts: Send + Sync {
    async fn is_member(&self, chain_id: u64, signer: EthAddress) -> BridgeResult<bool>;

    /// `HasValidSignaturesLength`: whether `count` signatures reach quorum.
    async fn reaches_quorum(&self, chain_id: u64, count: usize) -> BridgeResult<bool>;

    async fn members_count(&self, chain_id: u64) -> BridgeResult<usize>;
}

/// Stand-in for the deployment-supplied SDK clients.
///
/// Every operation reports the capability as unavailable, which puts a node
/// wired with it into read-only mode: mirror polling, recovery and the
/// paged listing work, while submission and signing paths surface
/// `UpstreamUnavailable` and are retried or dropped by their callers.
pub struct UnconfiguredClient;

impl UnconfiguredClient {
    fn unavailable<T>(capability: &str) -> crate::error::BridgeResult<T> {
        Err(crate::error::BridgeError::UpstreamUnavailable(format!(
            "{} client is not configured for this deployment",
            capability
        )))
    }
}

#[async_trait]
impl LedgerClient for UnconfiguredClient {
    async fn submit_scheduled_transfer(
        &self,
        _entries: &[AccountAmount],
        _token_id: Option<&str>,
        _memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        Self::unavailable("ledger")
    }

    async fn submit_scheduled_mint(
        &self,
        _token_id: &str,
        _amount: i64,
        _memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        Self::unavailable("ledger")
    }

    async fn submit_scheduled_burn(
        &self,
        _token_id: &str,
        _amount: i64,
        _memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        Self::unavailable("ledger")
    }

    async fn submit_scheduled_nft_transfer(
        &self,
        _token_id: &str,
        _serial_number: i64,
        _sender: &EntityId,
        _receiver: &EntityId,
        _memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        Self::unavailable("ledger")
    }

    async fn submit_scheduled_nft_approve(
        &self,
        _token_id: &str,
        _serial_number: i64,
        _spender: &EntityId,
        _memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        Self::unavailable("ledger")
    }

    async fn await_scheduled_execution(&self, _transaction_id: &str) -> BridgeResult<()> {
        Self::unavailable("ledger")
    }
}

#[async_trait]
impl TopicClient for UnconfiguredClient {
    async fn submit_message(&self, _payload: Vec<u8>) -> BridgeResult<String> {
        Self::unavailable("topic")
    }
}

#[async_trait]
impl BridgeContracts for UnconfiguredClient {
    async fn is_member(&self, _chain_id: u64, _signer: EthAddress) -> BridgeResult<bool> {
        Self::unavailable("contracts")
    }

    async fn reaches_quorum(&self, _chain_id: u64, _count: usize) -> BridgeResult<bool> {
        Self::unavailable("contracts")
    }

    async fn members_count(&self, _chain_id: u64) -> BridgeResult<usize> {
        Self::unavailable("contracts")
    }
}
