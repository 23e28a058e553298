// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory repository implementation.
//!
//! Backs tests and single-process deployments; a relational backend can
//! replace it behind the same traits. Transitions are guarded so terminal
//! statuses never regress, matching the single-row conditional updates the
//! contracts require.

use crate::error::BridgeResult;
use crate::storage::{
    FeeRepository, MessageRepository, ScheduleRepository, TransferFilter, TransferPage,
    TransferRepository, TransferWithRecords,
};
use async_trait::async_trait;
use hedera_bridge_types::entities::{
    Fee, Message, OperationStatus, Schedule, Transfer, TransferStatus,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct InMemoryStore {
    transfers: RwLock<HashMap<String, Transfer>>,
    fees: RwLock<HashMap<String, Fee>>,
    schedules: RwLock<HashMap<String, Schedule>>,
    messages: RwLock<Vec<Message>>,
    message_keys: RwLock<HashSet<(String, String)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferRepository for InMemoryStore {
    async fn get_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> BridgeResult<Option<Transfer>> {
        Ok(self.transfers.read().await.get(transaction_id).cloned())
    }

    async fn create(&self, transfer: Transfer) -> BridgeResult<Transfer> {
        let mut rows = self.transfers.write().await;
        if let Some(existing) = rows.get(&transfer.transaction_id) {
            debug!(
                "[Store] Transfer {} already exists, returning stored row",
                transfer.transaction_id
            );
            return Ok(existing.clone());
        }
        info!(
            "[Store] Transfer created: id={}, status={}",
            transfer.transaction_id,
            transfer.status.as_str()
        );
        rows.insert(transfer.transaction_id.clone(), transfer.clone());
        Ok(transfer)
    }

    async fn update_fee(&self, transaction_id: &str, fee: &str) -> BridgeResult<()> {
        let mut rows = self.transfers.write().await;
        match rows.get_mut(transaction_id) {
            Some(row) => {
                row.fee = fee.to_string();
                Ok(())
            }
            None => {
                warn!(
                    "[Store] update_fee on missing transfer {}, skipping",
                    transaction_id
                );
                Ok(())
            }
        }
    }

    async fn update_status_completed(&self, transaction_id: &str) -> BridgeResult<()> {
        let mut rows = self.transfers.write().await;
        match rows.get_mut(transaction_id) {
            Some(row) if row.status == TransferStatus::Initial => {
                row.status = TransferStatus::Completed;
                info!("[Store] Transfer {} -> COMPLETED", transaction_id);
                Ok(())
            }
            Some(row) => {
                debug!(
                    "[Store] Transfer {} already {}, skipping COMPLETED",
                    transaction_id,
                    row.status.as_str()
                );
                Ok(())
            }
            None => {
                warn!(
                    "[Store] update_status_completed on missing transfer {}, skipping",
                    transaction_id
                );
                Ok(())
            }
        }
    }

    async fn update_status_failed(&self, transaction_id: &str) -> BridgeResult<()> {
        let mut rows = self.transfers.write().await;
        match rows.get_mut(transaction_id) {
            Some(row) if row.status == TransferStatus::Initial => {
                row.status = TransferStatus::Failed;
                info!("[Store] Transfer {} -> FAILED", transaction_id);
                Ok(())
            }
            Some(row) => {
                debug!(
                    "[Store] Transfer {} already {}, skipping FAILED",
                    transaction_id,
                    row.status.as_str()
                );
                Ok(())
            }
            None => {
                warn!(
                    "[Store] update_status_failed on missing transfer {}, skipping",
                    transaction_id
                );
                Ok(())
            }
        }
    }

    async fn get_with_preloads(
        &self,
        transaction_id: &str,
    ) -> BridgeResult<Option<TransferWithRecords>> {
        let transfer = match self.transfers.read().await.get(transaction_id) {
            Some(t) => t.clone(),
            None => return Ok(None),
        };
        let fees = self
            .fees
            .read()
            .await
            .values()
            .filter(|f| f.transfer_id.as_deref() == Some(transaction_id))
            .cloned()
            .collect();
        let schedules = self
            .schedules
            .read()
            .await
            .values()
            .filter(|s| s.transfer_id.as_deref() == Some(transaction_id))
            .cloned()
            .collect();
        let messages = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.transfer_id == transaction_id)
            .cloned()
            .collect();
        Ok(Some(TransferWithRecords {
            transfer,
            fees,
            schedules,
            messages,
        }))
    }

    async fn paged(&self, filter: TransferFilter) -> BridgeResult<TransferPage> {
        let rows = self.transfers.read().await;
        let mut items: Vec<Transfer> = rows
            .values()
            .filter(|t| filter.status.map(|s| t.status == s).unwrap_or(true))
            .filter(|t| {
                filter
                    .originator
                    .as_ref()
                    .map(|o| &t.originator == o)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        let total = items.len();
        let per_page = filter.per_page.max(1);
        let items = items
            .into_iter()
            .skip(filter.page * per_page)
            .take(per_page)
            .collect();
        Ok(TransferPage { items, total })
    }
}

#[async_trait]
impl FeeRepository for InMemoryStore {
    async fn get(&self, transaction_id: &str) -> BridgeResult<Option<Fee>> {
        Ok(self.fees.read().await.get(transaction_id).cloned())
    }

    async fn create(&self, fee: Fee) -> BridgeResult<()> {
        let mut rows = self.fees.write().await;
        if rows.contains_key(&fee.transaction_id) {
            debug!("[Store] Fee {} already exists, skipping", fee.transaction_id);
            return Ok(());
        }
        rows.insert(fee.transaction_id.clone(), fee);
        Ok(())
    }

    async fn update_status_completed(&self, transaction_id: &str) -> BridgeResult<()> {
        update_operation_status(&self.fees, transaction_id, OperationStatus::Completed, "Fee")
            .await
    }

    async fn update_status_failed(&self, transaction_id: &str) -> BridgeResult<()> {
        update_operation_status(&self.fees, transaction_id, OperationStatus::Failed, "Fee").await
    }

    async fn get_all_submitted(&self) -> BridgeResult<Vec<Fee>> {
        Ok(self
            .fees
            .read()
            .await
            .values()
            .filter(|f| f.status == OperationStatus::Submitted)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn get(&self, transaction_id: &str) -> BridgeResult<Option<Schedule>> {
        Ok(self.schedules.read().await.get(transaction_id).cloned())
    }

    async fn create(&self, schedule: Schedule) -> BridgeResult<()> {
        let mut rows = self.schedules.write().await;
        if rows.contains_key(&schedule.transaction_id) {
            debug!(
                "[Store] Schedule {} already exists, skipping",
                schedule.transaction_id
            );
            return Ok(());
        }
        rows.insert(schedule.transaction_id.clone(), schedule);
        Ok(())
    }

    async fn update_status_completed(&self, transaction_id: &str) -> BridgeResult<()> {
        update_schedule_status(
            &self.schedules,
            transaction_id,
            OperationStatus::Completed,
        )
        .await
    }

    async fn update_status_failed(&self, transaction_id: &str) -> BridgeResult<()> {
        update_schedule_status(&self.schedules, transaction_id, OperationStatus::Failed).await
    }

    async fn get_all_submitted(&self) -> BridgeResult<Vec<Schedule>> {
        Ok(self
            .schedules
            .read()
            .await
            .values()
            .filter(|s| s.status == OperationStatus::Submitted)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, message: Message) -> BridgeResult<()> {
        let key = (message.transfer_id.clone(), message.signature.clone());
        let mut keys = self.message_keys.write().await;
        if keys.contains(&key) {
            debug!(
                "[Store] Message for transfer {} already stored, skipping",
                message.transfer_id
            );
            return Ok(());
        }
        keys.insert(key);
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn exist(&self, transfer_id: &str, signature: &str) -> BridgeResult<bool> {
        Ok(self
            .message_keys
            .read()
            .await
            .contains(&(transfer_id.to_string(), signature.to_string())))
    }

    async fn get_by_transfer_id(&self, transfer_id: &str) -> BridgeResult<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.transfer_id == transfer_id)
            .cloned()
            .collect())
    }
}

async fn update_operation_status(
    rows: &RwLock<HashMap<String, Fee>>,
    transaction_id: &str,
    status: OperationStatus,
    entity: &str,
) -> BridgeResult<()> {
    let mut rows = rows.write().await;
    match rows.get_mut(transaction_id) {
        Some(row) if row.status == OperationStatus::Submitted => {
            row.status = status;
            info!(
                "[Store] {} {} -> {}",
                entity,
                transaction_id,
                status.as_str()
            );
            Ok(())
        }
        Some(row) => {
            debug!(
                "[Store] {} {} already {}, skipping {}",
                entity,
                transaction_id,
                row.status.as_str(),
                status.as_str()
            );
            Ok(())
        }
        None => {
            warn!(
                "[Store] {} status update on missing row {}, skipping",
                entity, transaction_id
            );
            Ok(())
        }
    }
}

async fn update_schedule_status(
    rows: &RwLock<HashMap<String, Schedule>>,
    transaction_id: &str,
    status: OperationStatus,
) -> BridgeResult<()> {
    let mut rows = rows.write().await;
    match rows.get_mut(transaction_id) {
        Some(row) if row.status == OperationStatus::Submitted => {
            row.status = status;
            info!(
                "[Store] Schedule {} -> {}",
                transaction_id,
                status.as_str()
            );
            Ok(())
        }
        Some(row) => {
            debug!(
                "[Store] Schedule {} already {}, skipping {}",
                transaction_id,
                row.status.as_str(),
                status.as_str()
            );
            Ok(())
        }
        None => {
            warn!(
                "[Store] Schedule status update on missing row {}, skipping",
                transaction_id
            );
            Ok(())
        }
    }
}
