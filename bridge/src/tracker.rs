// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scheduled-transaction execution tracker.
//!
//! Drives one deferred native-ledger operation from submission through its
//! mined result, keeping the Schedule/Fee/Transfer rows in step at each
//! stage. Outcomes are explicit values returned to the caller; multi-leg
//! fee fan-outs are awaited collectively and reduced to a single aggregate
//! result. No leg is ever abandoned early: partial completion without
//! accounting would leave orphaned on-chain funds state.

use crate::clients::{AccountAmount, LedgerClient, ScheduleSubmission};
use crate::error::BridgeResult;
use crate::metrics::BridgeMetrics;
use crate::storage::{FeeRepository, ScheduleRepository, TransferRepository};
use futures::future::join_all;
use hedera_bridge_types::entities::{Fee, OperationStatus, Schedule, ScheduleOperation};
use hedera_bridge_types::EntityId;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one scheduled operation, submission through mined receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub transaction_id: Option<String>,
    pub schedule_id: Option<String>,
    pub successful: bool,
}

impl ExecutionOutcome {
    fn failed_before_submission() -> Self {
        Self {
            transaction_id: None,
            schedule_id: None,
            successful: false,
        }
    }
}

pub struct ScheduleTracker {
    ledger: Arc<dyn LedgerClient>,
    transfers: Arc<dyn TransferRepository>,
    fees: Arc<dyn FeeRepository>,
    schedules: Arc<dyn ScheduleRepository>,
    metrics: Arc<BridgeMetrics>,
}

impl ScheduleTracker {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        transfers: Arc<dyn TransferRepository>,
        fees: Arc<dyn FeeRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            ledger,
            transfers,
            fees,
            schedules,
            metrics,
        }
    }

    /// A scheduled multi-party transfer. `has_receiver` marks the terminal
    /// leg that pays the end receiver; its outcome cascades to the Transfer.
    pub async fn execute_transfer(
        &self,
        transfer_id: &str,
        entries: &[AccountAmount],
        token_id: Option<&str>,
        has_receiver: bool,
    ) -> ExecutionOutcome {
        self.run_scheduled(
            transfer_id,
            ScheduleOperation::Transfer,
            has_receiver,
            None,
            "transfer",
            self.ledger
                .submit_scheduled_transfer(entries, token_id, transfer_id),
        )
        .await
    }

    /// One leg of a fee fan-out; also writes a Fee row sized to the leg's
    /// credited total.
    pub async fn execute_fee_transfer(
        &self,
        transfer_id: &str,
        entries: &[AccountAmount],
        leg: usize,
    ) -> ExecutionOutcome {
        let credited: i64 = entries.iter().map(|e| e.amount.max(0)).sum();
        let tag = format!("fee-{}", leg);
        self.run_scheduled(
            transfer_id,
            ScheduleOperation::Transfer,
            false,
            Some(credited),
            &tag,
            self.ledger
                .submit_scheduled_transfer(entries, None, transfer_id),
        )
        .await
    }

    /// Runs every fee leg to completion and reduces to "all legs succeeded".
    /// A failed leg flips the aggregate but never cancels its siblings.
    pub async fn execute_fee_distribution(
        &self,
        transfer_id: &str,
        groups: Vec<Vec<AccountAmount>>,
    ) -> bool {
        if groups.is_empty() {
            return true;
        }
        let legs = groups
            .iter()
            .enumerate()
            .map(|(leg, entries)| self.execute_fee_transfer(transfer_id, entries, leg));
        let outcomes = join_all(legs).await;

        let successful = outcomes.iter().all(|o| o.successful);
        info!(
            "[ScheduleTracker] Fee distribution for {}: {}/{} legs succeeded",
            transfer_id,
            outcomes.iter().filter(|o| o.successful).count(),
            outcomes.len()
        );
        successful
    }

    pub async fn execute_mint(
        &self,
        transfer_id: &str,
        token_id: &str,
        amount: i64,
    ) -> ExecutionOutcome {
        self.run_scheduled(
            transfer_id,
            ScheduleOperation::Mint,
            false,
            None,
            "mint",
            self.ledger.submit_scheduled_mint(token_id, amount, transfer_id),
        )
        .await
    }

    /// Burn is a terminal source-side step for wrapped returns: its failure
    /// fails the transfer, but its success alone does not complete it.
    pub async fn execute_burn(
        &self,
        transfer_id: &str,
        token_id: &str,
        amount: i64,
    ) -> ExecutionOutcome {
        self.run_scheduled(
            transfer_id,
            ScheduleOperation::Burn,
            false,
            None,
            "burn",
            self.ledger.submit_scheduled_burn(token_id, amount, transfer_id),
        )
        .await
    }

    pub async fn execute_nft_transfer(
        &self,
        transfer_id: &str,
        token_id: &str,
        serial_number: i64,
        sender: &EntityId,
        receiver: &EntityId,
        has_receiver: bool,
    ) -> ExecutionOutcome {
        self.run_scheduled(
            transfer_id,
            ScheduleOperation::Transfer,
            has_receiver,
            None,
            "nft-transfer",
            self.ledger.submit_scheduled_nft_transfer(
                token_id,
                serial_number,
                sender,
                receiver,
                transfer_id,
            ),
        )
        .await
    }

    pub async fn execute_nft_approve(
        &self,
        transfer_id: &str,
        token_id: &str,
        serial_number: i64,
        spender: &EntityId,
    ) -> ExecutionOutcome {
        self.run_scheduled(
            transfer_id,
            ScheduleOperation::Approve,
            false,
            None,
            "approve",
            self.ledger.submit_scheduled_nft_approve(
                token_id,
                serial_number,
                spender,
                transfer_id,
            ),
        )
        .await
    }

    /// Submission and mined-result stages for one scheduled operation.
    ///
    /// Execution stage: persist a Submitted Schedule (and Fee) row, or a
    /// Failed one when the scheduling call itself fails. Mined stage:
    /// promote the rows to Completed/Failed once the ledger reports the
    /// scheduled transaction's actual result.
    async fn run_scheduled<F>(
        &self,
        transfer_id: &str,
        operation: ScheduleOperation,
        has_receiver: bool,
        fee_amount: Option<i64>,
        tag: &str,
        submit: F,
    ) -> ExecutionOutcome
    where
        F: Future<Output = BridgeResult<ScheduleSubmission>>,
    {
        let submission = match submit.await {
            Ok(submission) => submission,
            Err(e) => {
                self.metrics.record_error(&e);
                self.metrics.schedules_failed.inc();
                error!(
                    "[ScheduleTracker] Submission of {} for {} failed: {}",
                    operation.as_str(),
                    transfer_id,
                    e
                );
                // No ledger-assigned id exists; record the attempt under a
                // synthetic one so the failure is still visible.
                let failed_id = format!("{}-{}", transfer_id, tag);
                self.persist_rows(
                    transfer_id,
                    &failed_id,
                    "",
                    operation,
                    has_receiver,
                    fee_amount,
                    OperationStatus::Failed,
                )
                .await;
                if has_receiver {
                    self.fail_transfer(transfer_id).await;
                }
                return ExecutionOutcome::failed_before_submission();
            }
        };

        self.metrics.schedules_submitted.inc();
        info!(
            "[ScheduleTracker] Submitted {} for {}: tx={}, schedule={}",
            operation.as_str(),
            transfer_id,
            submission.transaction_id,
            submission.schedule_id
        );
        self.persist_rows(
            transfer_id,
            &submission.transaction_id,
            &submission.schedule_id,
            operation,
            has_receiver,
            fee_amount,
            OperationStatus::Submitted,
        )
        .await;

        match self
            .ledger
            .await_scheduled_execution(&submission.transaction_id)
            .await
        {
            Ok(()) => {
                self.metrics.schedules_confirmed.inc();
                self.promote_rows(&submission.transaction_id, fee_amount.is_some(), true)
                    .await;
                if has_receiver {
                    self.complete_transfer(transfer_id).await;
                }
                ExecutionOutcome {
                    transaction_id: Some(submission.transaction_id),
                    schedule_id: Some(submission.schedule_id),
                    successful: true,
                }
            }
            Err(e) => {
                self.metrics.record_error(&e);
                self.metrics.schedules_failed.inc();
                warn!(
                    "[ScheduleTracker] Scheduled {} for {} was not executed successfully: {}",
                    operation.as_str(),
                    transfer_id,
                    e
                );
                self.promote_rows(&submission.transaction_id, fee_amount.is_some(), false)
                    .await;
                if has_receiver {
                    self.fail_transfer(transfer_id).await;
                }
                ExecutionOutcome {
                    transaction_id: Some(submission.transaction_id),
                    schedule_id: Some(submission.schedule_id),
                    successful: false,
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_rows(
        &self,
        transfer_id: &str,
        transaction_id: &str,
        schedule_id: &str,
        operation: ScheduleOperation,
        has_receiver: bool,
        fee_amount: Option<i64>,
        status: OperationStatus,
    ) {
        let schedule = Schedule {
            transaction_id: transaction_id.to_string(),
            schedule_id: schedule_id.to_string(),
            operation,
            has_receiver,
            status,
            transfer_id: Some(transfer_id.to_string()),
        };
        if let Err(e) = self.schedules.create(schedule).await {
            self.metrics.record_error(&e);
            error!(
                "[ScheduleTracker] Failed to persist schedule row {}: {}",
                transaction_id, e
            );
        }
        if let Some(amount) = fee_amount {
            let fee = Fee {
                transaction_id: transaction_id.to_string(),
                schedule_id: schedule_id.to_string(),
                amount: amount.to_string(),
                status,
                transfer_id: Some(transfer_id.to_string()),
            };
            if let Err(e) = self.fees.create(fee).await {
                self.metrics.record_error(&e);
                error!(
                    "[ScheduleTracker] Failed to persist fee row {}: {}",
                    transaction_id, e
                );
            }
        }
    }

    async fn promote_rows(&self, transaction_id: &str, has_fee: bool, successful: bool) {
        let result = if successful {
            self.schedules.update_status_completed(transaction_id).await
        } else {
            self.schedules.update_status_failed(transaction_id).await
        };
        if let Err(e) = result {
            self.metrics.record_error(&e);
            error!(
                "[ScheduleTracker] Failed to promote schedule row {}: {}",
                transaction_id, e
            );
        }
        if has_fee {
            let result = if successful {
                self.fees.update_status_completed(transaction_id).await
            } else {
                self.fees.update_status_failed(transaction_id).await
            };
            if let Err(e) = result {
                self.metrics.record_error(&e);
                error!(
                    "[ScheduleTracker] Failed to promote fee row {}: {}",
                    transaction_id, e
                );
            }
        }
    }

    async fn complete_transfer(&self, transfer_id: &str) {
        if let Err(e) = self.transfers.update_status_completed(transfer_id).await {
            self.metrics.record_error(&e);
            error!(
                "[ScheduleTracker] Failed to complete transfer {}: {}",
                transfer_id, e
            );
            return;
        }
        self.metrics.transfers_completed.inc();
    }

    async fn fail_transfer(&self, transfer_id: &str) {
        if let Err(e) = self.transfers.update_status_failed(transfer_id).await {
            self.metrics.record_error(&e);
            error!(
                "[ScheduleTracker] Failed to fail transfer {}: {}",
                transfer_id, e
            );
            return;
        }
        self.metrics.transfers_failed.inc();
    }
}
