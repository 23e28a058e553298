// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Read-only confirmation poller.
//!
//! Watches the mirror node for evidence that a previously-submitted
//! scheduled transaction executed, and classifies the outcome. The
//! deterministic cross-reference between an observed execution and the
//! logical transfer it serves is the schedule memo: it carries the transfer
//! id the submitter stamped on it.
//!
//! Per watched intent the state machine is Polling -> Found -> terminal.
//! Fetch errors are never fatal: the loop logs and retries at a fixed
//! interval until found or cancelled, and the single returned outcome is
//! applied exactly once by the caller.

use crate::clients::{MirrorClient, MirrorTransaction};
use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use hedera_bridge_types::entities::OperationStatus;
use hedera_bridge_types::{EntityId, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One expected leg of the scheduled transfer's asset movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedTransfer {
    pub account: String,
    pub amount: i64,
    pub token_id: Option<String>,
}

/// What kind of scheduled operation is being confirmed, and what its asset
/// movement must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchIntent {
    /// Generic or fee-split transfer. An empty expectation set (recovery
    /// mode, where the original legs are no longer known) matches on the
    /// schedule memo alone.
    Transfer { expected: Vec<ExpectedTransfer> },
    /// An NFT moving to a specific receiver.
    Nft {
        token_id: String,
        serial_number: i64,
        receiver: String,
    },
    /// An NFT allowance approval; carries no transfer list to match.
    Approve,
}

/// The confirmed outcome of a watched scheduled transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub transaction_id: String,
    pub schedule_id: String,
    pub status: OperationStatus,
}

pub struct SchedulePoller {
    mirror: Arc<dyn MirrorClient>,
    bridge_account: EntityId,
    poll_interval: Duration,
    metrics: Arc<BridgeMetrics>,
}

impl SchedulePoller {
    pub fn new(
        mirror: Arc<dyn MirrorClient>,
        bridge_account: EntityId,
        poll_interval: Duration,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            mirror,
            bridge_account,
            poll_interval,
            metrics,
        }
    }

    /// Polls until the scheduled transaction serving `transfer_id` is
    /// observed executed, then returns its outcome once. Returns `None` only
    /// on cancellation.
    pub async fn await_confirmation(
        &self,
        transfer_id: &str,
        start_after: Timestamp,
        intent: &WatchIntent,
        cancel: &CancellationToken,
    ) -> Option<PollOutcome> {
        loop {
            match self.poll_once(transfer_id, start_after, intent).await {
                Ok(Some(outcome)) => {
                    info!(
                        "[SchedulePoller] Found execution for {}: tx={}, schedule={}, status={}",
                        transfer_id,
                        outcome.transaction_id,
                        outcome.schedule_id,
                        outcome.status.as_str()
                    );
                    return Some(outcome);
                }
                Ok(None) => {
                    debug!("[SchedulePoller] No execution for {} yet", transfer_id);
                }
                Err(e) => {
                    self.metrics.record_error(&e);
                    warn!(
                        "[SchedulePoller] Mirror fetch for {} failed: {}, retrying in {:?}",
                        transfer_id, e, self.poll_interval
                    );
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[SchedulePoller] Cancelled while watching {}", transfer_id);
                    return None;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn poll_once(
        &self,
        transfer_id: &str,
        start_after: Timestamp,
        intent: &WatchIntent,
    ) -> BridgeResult<Option<PollOutcome>> {
        let candidates = match intent {
            WatchIntent::Nft {
                token_id,
                serial_number,
                ..
            } => self.mirror.nft_transactions(token_id, *serial_number).await?,
            _ => {
                self.mirror
                    .account_transactions_after(&self.bridge_account, start_after)
                    .await?
            }
        };

        for candidate in candidates {
            if !candidate.scheduled {
                continue;
            }
            let Some(schedule_id) = candidate.entity_id.clone() else {
                continue;
            };
            let schedule = match self.mirror.schedule(&schedule_id).await {
                Ok(schedule) => schedule,
                Err(BridgeError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if schedule.memo != transfer_id {
                continue;
            }
            if !matches_intent(&candidate, intent) {
                debug!(
                    "[SchedulePoller] Schedule {} memo matches {} but movement differs, skipping",
                    schedule_id, transfer_id
                );
                continue;
            }

            let status = if candidate.is_successful() {
                OperationStatus::Completed
            } else {
                OperationStatus::Failed
            };
            return Ok(Some(PollOutcome {
                transaction_id: candidate.transaction_id,
                schedule_id,
                status,
            }));
        }
        Ok(None)
    }
}

/// Exact match of the expected transfer set against the observed movement.
fn matches_intent(tx: &MirrorTransaction, intent: &WatchIntent) -> bool {
    match intent {
        WatchIntent::Transfer { expected } => expected.iter().all(|e| {
            tx.transfers.iter().any(|t| {
                t.account == e.account && t.amount == e.amount && t.token_id == e.token_id
            })
        }),
        WatchIntent::Nft {
            token_id,
            serial_number,
            receiver,
        } => tx.nft_transfers.iter().any(|n| {
            n.token_id == *token_id
                && n.serial_number == *serial_number
                && n.receiver_account_id.as_deref() == Some(receiver.as_str())
        }),
        WatchIntent::Approve => true,
    }
}
