// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Repository contracts for the persistent entities.
//!
//! The storage engine is replaceable; correctness rests on these semantics:
//! creates are idempotent on the natural key, status updates are atomic
//! single-row transitions guarded against terminal states, and status
//! updates on absent rows succeed as logged no-ops (idempotent replays race
//! with data that is not yet visible).

pub mod memory;

use crate::error::BridgeResult;
use async_trait::async_trait;
use hedera_bridge_types::entities::{Fee, Message, Schedule, Transfer, TransferStatus};

/// A transfer plus its owned records, loaded in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferWithRecords {
    pub transfer: Transfer,
    pub fees: Vec<Fee>,
    pub schedules: Vec<Schedule>,
    pub messages: Vec<Message>,
}

/// Filtered, paged transfer listing.
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub originator: Option<String>,
    /// Zero-based page index.
    pub page: usize,
    pub per_page: usize,
}

#[derive(Debug, Clone)]
pub struct TransferPage {
    pub items: Vec<Transfer>,
    pub total: usize,
}

#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn get_by_transaction_id(&self, transaction_id: &str)
        -> BridgeResult<Option<Transfer>>;

    /// Creates the row if absent; returns the already-stored row unchanged
    /// if present. Never overwrites.
    async fn create(&self, transfer: Transfer) -> BridgeResult<Transfer>;

    async fn update_fee(&self, transaction_id: &str, fee: &str) -> BridgeResult<()>;

    async fn update_status_completed(&self, transaction_id: &str) -> BridgeResult<()>;

    async fn update_status_failed(&self, transaction_id: &str) -> BridgeResult<()>;

    async fn get_with_preloads(
        &self,
        transaction_id: &str,
    ) -> BridgeResult<Option<TransferWithRecords>>;

    async fn paged(&self, filter: TransferFilter) -> BridgeResult<TransferPage>;
}

#[async_trait]
pub trait FeeRepository: Send + Sync {
    async fn get(&self, transaction_id: &str) -> BridgeResult<Option<Fee>>;

    async fn create(&self, fee: Fee) -> BridgeResult<()>;

    async fn update_status_completed(&self, transaction_id: &str) -> BridgeResult<()>;

    async fn update_status_failed(&self, transaction_id: &str) -> BridgeResult<()>;

    /// All rows still in SUBMITTED, for the startup recovery pass.
    async fn get_all_submitted(&self) -> BridgeResult<Vec<Fee>>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn get(&self, transaction_id: &str) -> BridgeResult<Option<Schedule>>;

    async fn create(&self, schedule: Schedule) -> BridgeResult<()>;

    async fn update_status_completed(&self, transaction_id: &str) -> BridgeResult<()>;

    async fn update_status_failed(&self, transaction_id: &str) -> BridgeResult<()>;

    /// All rows still in SUBMITTED, for the startup recovery pass.
    async fn get_all_submitted(&self) -> BridgeResult<Vec<Schedule>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Inserts unless `(transfer_id, signature)` already exists; the
    /// duplicate case is a logged no-op, not an error.
    async fn create(&self, message: Message) -> BridgeResult<()>;

    async fn exist(&self, transfer_id: &str, signature: &str) -> BridgeResult<bool>;

    async fn get_by_transfer_id(&self, transfer_id: &str) -> BridgeResult<Vec<Message>>;
}
