// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quorum/majority handler.
//!
//! On each newly persisted signature the collected count is checked against
//! the target chain's contract, which owns the quorum arithmetic. Crossing
//! the threshold finalizes the transfer; repeat triggers are no-ops because
//! the status transition is guarded.

use crate::clients::BridgeContracts;
use crate::error::BridgeResult;
use crate::metrics::BridgeMetrics;
use crate::storage::{MessageRepository, TransferRepository};
use hedera_bridge_types::entities::TransferStatus;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct QuorumHandler {
    transfers: Arc<dyn TransferRepository>,
    messages: Arc<dyn MessageRepository>,
    contracts: Arc<dyn BridgeContracts>,
    metrics: Arc<BridgeMetrics>,
}

impl QuorumHandler {
    pub fn new(
        transfers: Arc<dyn TransferRepository>,
        messages: Arc<dyn MessageRepository>,
        contracts: Arc<dyn BridgeContracts>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            transfers,
            messages,
            contracts,
            metrics,
        }
    }

    /// Recomputes collected-vs-required for `transfer_id` and completes the
    /// transfer when the majority is reached.
    pub async fn on_new_signature(
        &self,
        transfer_id: &str,
        target_chain_id: u64,
    ) -> BridgeResult<()> {
        let Some(transfer) = self.transfers.get_by_transaction_id(transfer_id).await? else {
            debug!(
                "[QuorumHandler] No transfer row for {} yet, skipping check",
                transfer_id
            );
            return Ok(());
        };

        let collected = self.messages.get_by_transfer_id(transfer_id).await?.len();

        // Observability side-effect, not part of the correctness path.
        match self.contracts.members_count(target_chain_id).await {
            Ok(total) if total > 0 => {
                self.metrics
                    .participation_rate
                    .with_label_values(&[&target_chain_id.to_string()])
                    .set(collected as f64 / total as f64);
            }
            Ok(_) => {}
            Err(e) => warn!(
                "[QuorumHandler] Failed to read member count for chain {}: {}",
                target_chain_id, e
            ),
        }

        if !self
            .contracts
            .reaches_quorum(target_chain_id, collected)
            .await?
        {
            debug!(
                "[QuorumHandler] Transfer {} has {} signatures, majority not reached",
                transfer_id, collected
            );
            return Ok(());
        }

        if transfer.status == TransferStatus::Completed {
            debug!(
                "[QuorumHandler] Transfer {} already completed, nothing to do",
                transfer_id
            );
            return Ok(());
        }

        self.transfers.update_status_completed(transfer_id).await?;
        self.metrics.quorum_reached.inc();
        self.metrics.transfers_completed.inc();
        info!(
            "[QuorumHandler] Transfer {} completed with {} signatures",
            transfer_id, collected
        );
        Ok(())
    }
}
