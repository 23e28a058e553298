// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Validator node wiring.
//!
//! Two intake loops feed the services: transfer events from the (external)
//! chain watchers and raw messages from the shared consensus topic. A
//! startup recovery pass re-scans SUBMITTED schedule rows and re-attaches
//! the read-only poller so a crash mid-flight is eventually corrected
//! without manual intervention.

use crate::clients::{BridgeContracts, LedgerClient, MirrorClient, TopicClient};
use crate::config::RuntimeConfig;
use crate::encoding::{fungible_auth_digest, nft_auth_digest};
use crate::error::BridgeError;
use crate::metrics::BridgeMetrics;
use crate::poller::{SchedulePoller, WatchIntent};
use crate::service::{MessageService, QuorumHandler, TransferEvent, TransferService};
use crate::storage::memory::InMemoryStore;
use crate::storage::{
    FeeRepository, MessageRepository, ScheduleRepository, TransferRepository,
};
use crate::tracker::ScheduleTracker;
use hedera_bridge_types::entities::{OperationStatus, Schedule, ScheduleOperation};
use hedera_bridge_types::topic::TopicMessage;
use hedera_bridge_types::Timestamp;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const INTAKE_CHANNEL_CAPACITY: usize = 1024;

/// The per-entity repository handles the node runs against.
#[derive(Clone)]
pub struct Repositories {
    pub transfers: Arc<dyn TransferRepository>,
    pub fees: Arc<dyn FeeRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            transfers: store.clone(),
            fees: store.clone(),
            schedules: store.clone(),
            messages: store,
        }
    }
}

/// A raw message received from the shared topic, with its consensus time.
#[derive(Debug, Clone)]
pub struct ReceivedTopicMessage {
    pub bytes: Vec<u8>,
    pub consensus_timestamp: Timestamp,
}

/// Senders the external watchers feed.
#[derive(Clone)]
pub struct NodeChannels {
    pub transfer_events: mpsc::Sender<TransferEvent>,
    pub topic_messages: mpsc::Sender<ReceivedTopicMessage>,
}

struct NodeInner {
    cfg: Arc<RuntimeConfig>,
    transfers_service: Arc<TransferService>,
    messages_service: Arc<MessageService>,
    quorum: Arc<QuorumHandler>,
    poller: Arc<SchedulePoller>,
    repos: Repositories,
    metrics: Arc<BridgeMetrics>,
    cancel: CancellationToken,
}

pub struct ValidatorNode {
    inner: Arc<NodeInner>,
    transfer_rx: mpsc::Receiver<TransferEvent>,
    topic_rx: mpsc::Receiver<ReceivedTopicMessage>,
}

impl ValidatorNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Arc<RuntimeConfig>,
        mirror: Arc<dyn MirrorClient>,
        ledger: Arc<dyn LedgerClient>,
        topic: Arc<dyn TopicClient>,
        contracts: Arc<dyn BridgeContracts>,
        repos: Repositories,
        metrics: Arc<BridgeMetrics>,
        cancel: CancellationToken,
    ) -> (Self, NodeChannels) {
        let tracker = Arc::new(ScheduleTracker::new(
            ledger,
            repos.transfers.clone(),
            repos.fees.clone(),
            repos.schedules.clone(),
            metrics.clone(),
        ));
        let messages_service = Arc::new(MessageService::new(
            cfg.clone(),
            repos.transfers.clone(),
            repos.messages.clone(),
            contracts.clone(),
            metrics.clone(),
        ));
        let transfers_service = Arc::new(TransferService::new(
            cfg.clone(),
            repos.transfers.clone(),
            tracker,
            messages_service.clone(),
            topic,
            metrics.clone(),
        ));
        let quorum = Arc::new(QuorumHandler::new(
            repos.transfers.clone(),
            repos.messages.clone(),
            contracts,
            metrics.clone(),
        ));
        let poller = Arc::new(SchedulePoller::new(
            mirror,
            cfg.bridge_account,
            cfg.poll_interval,
            metrics.clone(),
        ));

        let (transfer_tx, transfer_rx) = mpsc::channel(INTAKE_CHANNEL_CAPACITY);
        let (topic_tx, topic_rx) = mpsc::channel(INTAKE_CHANNEL_CAPACITY);

        let node = Self {
            inner: Arc::new(NodeInner {
                cfg,
                transfers_service,
                messages_service,
                quorum,
                poller,
                repos,
                metrics,
                cancel,
            }),
            transfer_rx,
            topic_rx,
        };
        let channels = NodeChannels {
            transfer_events: transfer_tx,
            topic_messages: topic_tx,
        };
        (node, channels)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Spawns the recovery pass and both intake loops.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let ValidatorNode {
            inner,
            transfer_rx,
            topic_rx,
        } = self;
        info!(
            "[ValidatorNode] Starting: bridge account {}, topic {}",
            inner.cfg.bridge_account, inner.cfg.topic_id
        );
        vec![
            tokio::spawn(run_recovery_pass(inner.clone())),
            tokio::spawn(run_transfer_intake(inner.clone(), transfer_rx)),
            tokio::spawn(run_topic_intake(inner, topic_rx)),
        ]
    }
}

async fn run_transfer_intake(inner: Arc<NodeInner>, mut rx: mpsc::Receiver<TransferEvent>) {
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                let inner = inner.clone();
                // Transfers are independent; each gets its own task.
                tokio::spawn(async move {
                    let transaction_id = event.transaction_id.clone();
                    if let Err(e) = inner.transfers_service.process_transfer(event).await {
                        inner.metrics.record_error(&e);
                        error!(
                            "[ValidatorNode] Processing transfer {} failed: {}",
                            transaction_id, e
                        );
                    }
                });
            }
        }
    }
    info!("[ValidatorNode] Transfer intake stopped");
}

async fn run_topic_intake(inner: Arc<NodeInner>, mut rx: mpsc::Receiver<ReceivedTopicMessage>) {
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            received = rx.recv() => {
                let Some(received) = received else { break };
                let inner = inner.clone();
                tokio::spawn(async move {
                    handle_topic_message(inner, received).await;
                });
            }
        }
    }
    info!("[ValidatorNode] Topic intake stopped");
}

async fn handle_topic_message(inner: Arc<NodeInner>, received: ReceivedTopicMessage) {
    let message = match TopicMessage::from_bytes(&received.bytes) {
        Ok(message) => message,
        Err(e) => {
            let e = BridgeError::from(e);
            inner.metrics.record_error(&e);
            warn!("[ValidatorNode] Undecodable topic message dropped: {}", e);
            return;
        }
    };

    let timestamp = received.consensus_timestamp.as_nanos();
    let result = match &message {
        TopicMessage::Fungible(payload) => {
            match inner
                .messages_service
                .sanity_check_fungible(payload, &inner.cancel)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        "[ValidatorNode] Signature for {} failed sanity check, dropped",
                        payload.transfer_id
                    );
                    return;
                }
                Err(_) => return, // shutting down
            }
            let digest = match fungible_auth_digest(
                payload.source_chain_id,
                payload.target_chain_id,
                &payload.transfer_id,
                &payload.asset,
                &payload.recipient,
                &payload.amount,
            ) {
                Ok(digest) => digest,
                Err(e) => {
                    inner.metrics.record_error(&e);
                    warn!(
                        "[ValidatorNode] Cannot reconstruct payload for {}: {}",
                        payload.transfer_id, e
                    );
                    return;
                }
            };
            inner
                .messages_service
                .process_signature(
                    &payload.transfer_id,
                    &payload.signature,
                    payload.target_chain_id,
                    timestamp,
                    digest,
                )
                .await
                .map(|stored| (stored, payload.transfer_id.clone(), payload.target_chain_id))
        }
        TopicMessage::Nft(payload) => {
            match inner
                .messages_service
                .sanity_check_nft(payload, &inner.cancel)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        "[ValidatorNode] NFT signature for {} failed sanity check, dropped",
                        payload.transfer_id
                    );
                    return;
                }
                Err(_) => return,
            }
            let digest = match nft_auth_digest(
                payload.source_chain_id,
                payload.target_chain_id,
                &payload.transfer_id,
                &payload.asset,
                payload.serial_number,
                &payload.metadata,
                &payload.recipient,
            ) {
                Ok(digest) => digest,
                Err(e) => {
                    inner.metrics.record_error(&e);
                    warn!(
                        "[ValidatorNode] Cannot reconstruct NFT payload for {}: {}",
                        payload.transfer_id, e
                    );
                    return;
                }
            };
            inner
                .messages_service
                .process_signature(
                    &payload.transfer_id,
                    &payload.signature,
                    payload.target_chain_id,
                    timestamp,
                    digest,
                )
                .await
                .map(|stored| (stored, payload.transfer_id.clone(), payload.target_chain_id))
        }
    };

    match result {
        Ok((true, transfer_id, target_chain_id)) => {
            if let Err(e) = inner
                .quorum
                .on_new_signature(&transfer_id, target_chain_id)
                .await
            {
                inner.metrics.record_error(&e);
                error!(
                    "[ValidatorNode] Quorum check for {} failed: {}",
                    transfer_id, e
                );
            }
        }
        Ok((false, _, _)) => {} // benign duplicate
        Err(e) => {
            inner.metrics.record_error(&e);
            warn!("[ValidatorNode] Rejected topic signature: {}", e);
        }
    }
}

/// Re-attach confirmation watching for every scheduled transaction still in
/// SUBMITTED after a restart.
async fn run_recovery_pass(inner: Arc<NodeInner>) {
    let submitted = match inner.repos.schedules.get_all_submitted().await {
        Ok(rows) => rows,
        Err(e) => {
            inner.metrics.record_error(&e);
            error!("[ValidatorNode] Recovery scan failed: {}", e);
            return;
        }
    };
    if submitted.is_empty() {
        info!("[ValidatorNode] Recovery pass found no unresolved schedules");
        return;
    }
    info!(
        "[ValidatorNode] Recovery pass re-attaching {} unresolved schedules",
        submitted.len()
    );
    for row in submitted {
        let Some(transfer_id) = row.transfer_id.clone() else {
            warn!(
                "[ValidatorNode] Schedule {} has no transfer reference, skipping",
                row.transaction_id
            );
            continue;
        };
        tokio::spawn(watch_recovered_schedule(inner.clone(), row, transfer_id));
    }
}

async fn watch_recovered_schedule(inner: Arc<NodeInner>, row: Schedule, transfer_id: String) {
    // The original expected transfer set is gone; the schedule memo is the
    // surviving deterministic cross-reference.
    let intent = match row.operation {
        ScheduleOperation::Approve => WatchIntent::Approve,
        _ => WatchIntent::Transfer { expected: vec![] },
    };
    let Some(outcome) = inner
        .poller
        .await_confirmation(&transfer_id, Timestamp::from_nanos(0), &intent, &inner.cancel)
        .await
    else {
        return;
    };

    let successful = outcome.status == OperationStatus::Completed;
    let result = if successful {
        inner
            .repos
            .schedules
            .update_status_completed(&row.transaction_id)
            .await
    } else {
        inner
            .repos
            .schedules
            .update_status_failed(&row.transaction_id)
            .await
    };
    if let Err(e) = result {
        inner.metrics.record_error(&e);
        error!(
            "[ValidatorNode] Recovery update for schedule {} failed: {}",
            row.transaction_id, e
        );
        return;
    }
    if successful {
        inner.metrics.schedules_confirmed.inc();
    } else {
        inner.metrics.schedules_failed.inc();
    }

    // A fee row submitted together with the schedule shares its id.
    if let Ok(Some(_)) = inner.repos.fees.get(&row.transaction_id).await {
        let _ = if successful {
            inner
                .repos
                .fees
                .update_status_completed(&row.transaction_id)
                .await
        } else {
            inner
                .repos
                .fees
                .update_status_failed(&row.transaction_id)
                .await
        };
    }

    if row.has_receiver {
        let result = if successful {
            inner.metrics.transfers_completed.inc();
            inner
                .repos
                .transfers
                .update_status_completed(&transfer_id)
                .await
        } else {
            inner.metrics.transfers_failed.inc();
            inner
                .repos
                .transfers
                .update_status_failed(&transfer_id)
                .await
        };
        if let Err(e) = result {
            inner.metrics.record_error(&e);
            error!(
                "[ValidatorNode] Recovery cascade for transfer {} failed: {}",
                transfer_id, e
            );
        }
    }
    info!(
        "[ValidatorNode] Recovered schedule {} as {}",
        row.transaction_id,
        outcome.status.as_str()
    );
}
