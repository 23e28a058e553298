// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-transfer orchestration.
//!
//! Entered once per unique transaction id. Idempotent ingestion is the
//! single most important correctness property here: chain watchers deliver
//! at-least-once, and a redelivered event must neither create a second row
//! nor replay side effects. After ingestion the workflow branches on
//! native-vs-wrapped and fungible-vs-NFT, drives the required scheduled
//! operations, then signs and durably broadcasts the authorization.

use crate::clients::{AccountAmount, TopicClient};
use crate::config::RuntimeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::fee::{convert_decimals, FeeCalculator, FeeDistributor};
use crate::metrics::BridgeMetrics;
use crate::retry_with_max_elapsed_time;
use crate::service::MessageService;
use crate::storage::TransferRepository;
use crate::tracker::ScheduleTracker;
use ethers::types::U256;
use hedera_bridge_types::base_types::is_valid_transfer_id;
use hedera_bridge_types::entities::{Transfer, TransferStatus};
use hedera_bridge_types::{EntityId, Timestamp};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

const BROADCAST_MAX_ELAPSED: Duration = Duration::from_secs(60);

/// A transfer event as delivered by a chain watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub transaction_id: String,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub native_chain_id: u64,
    pub source_asset: String,
    pub target_asset: String,
    pub native_asset: String,
    pub receiver: String,
    pub amount: String,
    pub originator: String,
    pub timestamp: Timestamp,
    pub is_nft: bool,
    pub serial_number: i64,
    pub metadata: String,
}

impl TransferEvent {
    fn into_transfer(self) -> Transfer {
        Transfer {
            transaction_id: self.transaction_id,
            source_chain_id: self.source_chain_id,
            target_chain_id: self.target_chain_id,
            native_chain_id: self.native_chain_id,
            source_asset: self.source_asset,
            target_asset: self.target_asset,
            native_asset: self.native_asset,
            receiver: self.receiver,
            amount: self.amount,
            fee: String::new(),
            status: TransferStatus::Initial,
            is_nft: self.is_nft,
            serial_number: self.serial_number,
            metadata: self.metadata,
            originator: self.originator,
            timestamp: self.timestamp,
        }
    }
}

pub struct TransferService {
    cfg: Arc<RuntimeConfig>,
    transfers: Arc<dyn TransferRepository>,
    tracker: Arc<ScheduleTracker>,
    calculator: FeeCalculator,
    distributor: FeeDistributor,
    messages: Arc<MessageService>,
    topic: Arc<dyn TopicClient>,
    metrics: Arc<BridgeMetrics>,
    broadcast_max_elapsed: Duration,
    /// Transfers currently being processed by this node; closes the window
    /// between the existence check and the row insert under concurrent
    /// redelivery.
    in_flight: Mutex<HashSet<String>>,
}

impl TransferService {
    pub fn new(
        cfg: Arc<RuntimeConfig>,
        transfers: Arc<dyn TransferRepository>,
        tracker: Arc<ScheduleTracker>,
        messages: Arc<MessageService>,
        topic: Arc<dyn TopicClient>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        let calculator = FeeCalculator::new(cfg.assets.clone());
        let distributor = FeeDistributor::new(
            cfg.members.clone(),
            cfg.treasury_account,
            cfg.bridge_account,
            cfg.max_schedule_entries,
        );
        Self {
            cfg,
            transfers,
            tracker,
            calculator,
            distributor,
            messages,
            topic,
            metrics,
            broadcast_max_elapsed: BROADCAST_MAX_ELAPSED,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_broadcast_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.broadcast_max_elapsed = max_elapsed;
        self
    }

    /// Looks the transfer up by transaction id; creates it with
    /// Status=Initial only when absent. Returns the stored row and whether
    /// this call created it.
    pub async fn initiate_new_transfer(
        &self,
        event: &TransferEvent,
    ) -> BridgeResult<(Transfer, bool)> {
        if !is_valid_transfer_id(&event.transaction_id) {
            return Err(BridgeError::InvalidInput(format!(
                "malformed transaction id {}",
                event.transaction_id
            )));
        }
        if let Some(existing) = self
            .transfers
            .get_by_transaction_id(&event.transaction_id)
            .await?
        {
            self.metrics.transfers_duplicate.inc();
            info!(
                "[TransferService] Transfer {} already ingested (status={}), returning stored row",
                event.transaction_id,
                existing.status.as_str()
            );
            return Ok((existing, false));
        }
        let created = self.transfers.create(event.clone().into_transfer()).await?;
        self.metrics.transfers_ingested.inc();
        info!(
            "[TransferService] Transfer {} ingested: {} {} -> chain {}",
            created.transaction_id, created.amount, created.source_asset, created.target_chain_id
        );
        Ok((created, true))
    }

    /// The per-transfer workflow. Safe to call on every delivery of the
    /// event; only the delivery that first creates the row runs side
    /// effects.
    pub async fn process_transfer(&self, event: TransferEvent) -> BridgeResult<()> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(event.transaction_id.clone()) {
                self.metrics.transfers_duplicate.inc();
                info!(
                    "[TransferService] Transfer {} already in flight, skipping",
                    event.transaction_id
                );
                return Ok(());
            }
        }
        let result = self.process_claimed(&event).await;
        self.in_flight.lock().await.remove(&event.transaction_id);
        result
    }

    async fn process_claimed(&self, event: &TransferEvent) -> BridgeResult<()> {
        let (record, created) = self.initiate_new_transfer(event).await?;
        if !created {
            return Ok(());
        }
        if record.status != TransferStatus::Initial {
            info!(
                "[TransferService] Transfer {} already {}, nothing to do",
                record.transaction_id,
                record.status.as_str()
            );
            return Ok(());
        }

        if record.target_chain_id == self.cfg.native_chain_id {
            return self.process_inbound(&record).await;
        }
        if record.is_nft {
            if record.is_native() {
                return self.process_native_nft(&record).await;
            }
            warn!(
                "[TransferService] Wrapped NFT return {} is not supported, marking failed",
                record.transaction_id
            );
            return self.mark_failed(&record.transaction_id).await;
        }
        if record.is_native() {
            self.process_native_fungible(&record).await
        } else {
            self.process_wrapped_fungible(&record).await
        }
    }

    /// Native fungible: compute and persist the fee, fan the fee out
    /// asynchronously, sign the fee-reduced amount and broadcast.
    async fn process_native_fungible(&self, transfer: &Transfer) -> BridgeResult<()> {
        let (fee, net) = self
            .calculator
            .calculate_fee(&transfer.native_asset, &transfer.amount)?;
        self.transfers
            .update_fee(&transfer.transaction_id, &fee.to_string())
            .await?;
        self.metrics.fees_computed.inc();

        self.spawn_fee_distribution(&transfer.transaction_id, as_i64(fee)?)?;

        let payload = self.messages.sign_fungible(transfer, &net.to_string())?;
        self.broadcast(&transfer.transaction_id, payload).await
    }

    /// Native NFT: custody first, strictly gated, then the flat fee and the
    /// signature. Minting on the target chain must never race ahead of
    /// custody.
    async fn process_native_nft(&self, transfer: &Transfer) -> BridgeResult<()> {
        let originator = EntityId::from_str(&transfer.originator).map_err(|e| {
            BridgeError::InvalidInput(format!(
                "nft originator {}: {}",
                transfer.originator, e
            ))
        })?;

        let custody = self
            .tracker
            .execute_nft_transfer(
                &transfer.transaction_id,
                &transfer.native_asset,
                transfer.serial_number,
                &originator,
                &self.cfg.bridge_account,
                false,
            )
            .await;
        if !custody.successful {
            warn!(
                "[TransferService] NFT custody move for {} failed, marking failed",
                transfer.transaction_id
            );
            return self.mark_failed(&transfer.transaction_id).await;
        }

        let fee = self.calculator.nft_fee(&transfer.native_asset)?;
        self.transfers
            .update_fee(&transfer.transaction_id, &fee.to_string())
            .await?;
        self.metrics.fees_computed.inc();
        self.spawn_fee_distribution(&transfer.transaction_id, fee)?;

        let payload = self.messages.sign_nft(transfer)?;
        self.broadcast(&transfer.transaction_id, payload).await
    }

    /// Wrapped (return) fungible: convert precision, burn the wrapped
    /// amount on this side gated on its mined result, then sign and
    /// broadcast the converted amount.
    async fn process_wrapped_fungible(&self, transfer: &Transfer) -> BridgeResult<()> {
        let native_entry = self
            .cfg
            .assets
            .native_for_wrapped(transfer.source_chain_id, &transfer.source_asset)
            .ok_or_else(|| {
                BridgeError::NotFound(format!(
                    "no native mapping for {} on chain {}",
                    transfer.source_asset, transfer.source_chain_id
                ))
            })?;
        let wrapped_decimals = native_entry
            .wrapped
            .get(&transfer.source_chain_id)
            .map(|w| w.decimals)
            .ok_or_else(|| {
                BridgeError::NotFound(format!(
                    "no wrapped decimals for {}",
                    transfer.source_asset
                ))
            })?;

        let amount = U256::from_dec_str(&transfer.amount)
            .map_err(|e| BridgeError::InvalidInput(format!("amount: {}", e)))?;
        let converted = convert_decimals(amount, wrapped_decimals, native_entry.decimals)?;
        if converted.is_zero() {
            warn!(
                "[TransferService] Wrapped return {} converts to zero, marking failed",
                transfer.transaction_id
            );
            return self.mark_failed(&transfer.transaction_id).await;
        }

        let burn = self
            .tracker
            .execute_burn(
                &transfer.transaction_id,
                &transfer.source_asset,
                as_i64(amount)?,
            )
            .await;
        if !burn.successful {
            warn!(
                "[TransferService] Burn for {} failed, marking failed",
                transfer.transaction_id
            );
            return self.mark_failed(&transfer.transaction_id).await;
        }

        let payload = self
            .messages
            .sign_fungible(transfer, &converted.to_string())?;
        self.broadcast(&transfer.transaction_id, payload).await
    }

    /// Inbound release: the target chain is the native ledger, so there is
    /// no signature round - the scheduled payout itself is the multi-party
    /// authorization. Wrapped-on-ledger assets are minted before release.
    async fn process_inbound(&self, transfer: &Transfer) -> BridgeResult<()> {
        let receiver = EntityId::from_str(&transfer.receiver).map_err(|e| {
            BridgeError::InvalidInput(format!("receiver {}: {}", transfer.receiver, e))
        })?;

        let (fee, net) = self
            .calculator
            .calculate_fee(&transfer.native_asset, &transfer.amount)?;
        self.transfers
            .update_fee(&transfer.transaction_id, &fee.to_string())
            .await?;
        self.metrics.fees_computed.inc();
        self.spawn_fee_distribution(&transfer.transaction_id, as_i64(fee)?)?;

        let net = as_i64(net)?;
        if transfer.native_chain_id != self.cfg.native_chain_id {
            // Asset native to the other side: mint the wrapped supply first.
            let mint = self
                .tracker
                .execute_mint(&transfer.transaction_id, &transfer.target_asset, net)
                .await;
            if !mint.successful {
                warn!(
                    "[TransferService] Mint for {} failed, marking failed",
                    transfer.transaction_id
                );
                return self.mark_failed(&transfer.transaction_id).await;
            }
        }

        let token = (transfer.target_asset != "HBAR").then_some(transfer.target_asset.as_str());
        let entries = [
            AccountAmount {
                account: receiver,
                amount: net,
            },
            AccountAmount {
                account: self.cfg.bridge_account,
                amount: -net,
            },
        ];
        // has_receiver: this is the terminal leg, its outcome cascades.
        let outcome = self
            .tracker
            .execute_transfer(&transfer.transaction_id, &entries, token, true)
            .await;
        info!(
            "[TransferService] Inbound release for {} {}",
            transfer.transaction_id,
            if outcome.successful { "completed" } else { "failed" }
        );
        Ok(())
    }

    fn spawn_fee_distribution(&self, transfer_id: &str, fee: i64) -> BridgeResult<()> {
        let groups = self.distributor.fee_transfer_groups(fee)?;
        let tracker = self.tracker.clone();
        let transfer_id = transfer_id.to_string();
        tokio::spawn(async move {
            let successful = tracker.execute_fee_distribution(&transfer_id, groups).await;
            if !successful {
                warn!(
                    "[TransferService] Fee distribution for {} did not fully succeed",
                    transfer_id
                );
            }
        });
        Ok(())
    }

    /// Submits the signed authorization to the shared topic and waits for
    /// its own finality; returning without error means the signature is
    /// durably broadcast.
    async fn broadcast(&self, transfer_id: &str, payload: Vec<u8>) -> BridgeResult<()> {
        let result = retry_with_max_elapsed_time!(
            self.topic.submit_message(payload.clone()),
            self.broadcast_max_elapsed
        );
        match result {
            Ok(Ok(submission_id)) => {
                info!(
                    "[TransferService] Signature for {} broadcast in {}",
                    transfer_id, submission_id
                );
                Ok(())
            }
            Ok(Err(e)) | Err(e) => {
                self.metrics.record_error(&e);
                warn!(
                    "[TransferService] Broadcast for {} failed: {}",
                    transfer_id, e
                );
                Err(e)
            }
        }
    }

    async fn mark_failed(&self, transfer_id: &str) -> BridgeResult<()> {
        self.transfers.update_status_failed(transfer_id).await?;
        self.metrics.transfers_failed.inc();
        Ok(())
    }
}

fn as_i64(value: U256) -> BridgeResult<i64> {
    if value > U256::from(i64::MAX as u64) {
        return Err(BridgeError::InvalidInput(format!(
            "amount {} exceeds the ledger's 64-bit range",
            value
        )));
    }
    Ok(value.as_u64() as i64)
}
