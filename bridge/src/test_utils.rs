// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hand-rolled mock capability implementations for tests.

use crate::clients::{
    AccountAmount, BridgeContracts, LedgerClient, MirrorClient, MirrorSchedule, MirrorTransaction,
    ScheduleSubmission, TopicClient,
};
use crate::config::{AssetConfig, AssetTable, RuntimeConfig, WrappedAssetConfig};
use crate::crypto::AuthoritySigner;
use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use ethers::types::Address as EthAddress;
use hedera_bridge_types::entities::{Transfer, TransferStatus};
use hedera_bridge_types::{EntityId, Timestamp};
use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const TEST_SIGNER_KEY: &str =
    "e42c82337ce12d4a7ad6cd65876d91b2ab6594fd50cdab1737c91773ba7451db";

pub const TEST_EVM_CHAIN: u64 = 80001;
pub const TEST_WRAPPED_HBAR: &str = "0x0000000000000000000000000000000000000001";
pub const TEST_EVM_NATIVE_ASSET: &str = "0x00000000000000000000000000000000000000aa";
pub const TEST_HEDERA_WRAPPED_TOKEN: &str = "0.0.7777";
/// An EVM-native asset with fewer decimals than its Hedera wrapping, so
/// small return amounts truncate to zero.
pub const TEST_EVM_LOW_DECIMALS_ASSET: &str = "0x00000000000000000000000000000000000000cc";
pub const TEST_HEDERA_WRAPPED_DUST: &str = "0.0.8888";

pub fn test_runtime_config() -> RuntimeConfig {
    RuntimeConfig {
        native_chain_id: 0,
        mirror_base_url: "https://mirror.test".to_string(),
        bridge_account: EntityId::from_str("0.0.800").unwrap(),
        treasury_account: EntityId::from_str("0.0.50").unwrap(),
        topic_id: EntityId::from_str("0.0.600").unwrap(),
        members: vec![
            EntityId::from_str("0.0.10").unwrap(),
            EntityId::from_str("0.0.11").unwrap(),
            EntityId::from_str("0.0.12").unwrap(),
        ],
        max_schedule_entries: 10,
        poll_interval: Duration::from_millis(10),
        consistency_wait: Duration::from_millis(10),
        assets: AssetTable::new(vec![
            AssetConfig {
                native_asset: "HBAR".to_string(),
                decimals: 8,
                fee_percentage: 1_000, // 1%
                nft_fee: None,
                wrapped: [(
                    TEST_EVM_CHAIN,
                    WrappedAssetConfig {
                        asset: TEST_WRAPPED_HBAR.to_string(),
                        decimals: 8,
                    },
                )]
                .into_iter()
                .collect(),
            },
            AssetConfig {
                // Native to the EVM side, wrapped on Hedera.
                native_asset: TEST_EVM_NATIVE_ASSET.to_string(),
                decimals: 18,
                fee_percentage: 1_000,
                nft_fee: None,
                wrapped: [(
                    0,
                    WrappedAssetConfig {
                        asset: TEST_HEDERA_WRAPPED_TOKEN.to_string(),
                        decimals: 8,
                    },
                )]
                .into_iter()
                .collect(),
            },
            AssetConfig {
                // Native to the EVM side with 6 decimals against 8 wrapped.
                native_asset: TEST_EVM_LOW_DECIMALS_ASSET.to_string(),
                decimals: 6,
                fee_percentage: 1_000,
                nft_fee: None,
                wrapped: [(
                    0,
                    WrappedAssetConfig {
                        asset: TEST_HEDERA_WRAPPED_DUST.to_string(),
                        decimals: 8,
                    },
                )]
                .into_iter()
                .collect(),
            },
            AssetConfig {
                // An NFT collection.
                native_asset: "0.0.5005".to_string(),
                decimals: 0,
                fee_percentage: 0,
                nft_fee: Some(600),
                wrapped: [(
                    TEST_EVM_CHAIN,
                    WrappedAssetConfig {
                        asset: "0x00000000000000000000000000000000000000bb".to_string(),
                        decimals: 0,
                    },
                )]
                .into_iter()
                .collect(),
            },
        ]),
        signer: AuthoritySigner::from_hex(TEST_SIGNER_KEY).unwrap(),
        metrics_port: 0,
    }
}

pub fn sample_transfer(id: &str) -> Transfer {
    Transfer {
        transaction_id: id.to_string(),
        source_chain_id: 0,
        target_chain_id: TEST_EVM_CHAIN,
        native_chain_id: 0,
        source_asset: "HBAR".to_string(),
        target_asset: TEST_WRAPPED_HBAR.to_string(),
        native_asset: "HBAR".to_string(),
        receiver: "0x0000000000000000000000000000000000000002".to_string(),
        amount: "1000000000".to_string(),
        fee: String::new(),
        status: TransferStatus::Initial,
        is_nft: false,
        serial_number: 0,
        metadata: String::new(),
        originator: "0.0.999".to_string(),
        timestamp: Timestamp::from_nanos(1),
    }
}

// ---------------------------------------------------------------- mirror --

pub struct MockMirrorClient {
    account_responses: Mutex<VecDeque<BridgeResult<Vec<MirrorTransaction>>>>,
    nft_responses: Mutex<VecDeque<Vec<MirrorTransaction>>>,
    schedules: Mutex<HashMap<String, MirrorSchedule>>,
    account_calls: AtomicUsize,
}

impl MockMirrorClient {
    pub fn new() -> Self {
        Self {
            account_responses: Mutex::new(VecDeque::new()),
            nft_responses: Mutex::new(VecDeque::new()),
            schedules: Mutex::new(HashMap::new()),
            account_calls: AtomicUsize::new(0),
        }
    }

    pub async fn push_account_transactions(&self, txs: Vec<MirrorTransaction>) {
        self.account_responses.lock().await.push_back(Ok(txs));
    }

    pub async fn fail_next_account_transactions(&self) {
        self.account_responses
            .lock()
            .await
            .push_back(Err(BridgeError::UpstreamUnavailable(
                "simulated mirror outage".to_string(),
            )));
    }

    pub async fn push_nft_transactions(&self, txs: Vec<MirrorTransaction>) {
        self.nft_responses.lock().await.push_back(txs);
    }

    pub async fn insert_schedule(&self, schedule: MirrorSchedule) {
        self.schedules
            .lock()
            .await
            .insert(schedule.schedule_id.clone(), schedule);
    }

    pub fn account_transaction_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MirrorClient for MockMirrorClient {
    async fn account_transactions_after(
        &self,
        _account: &EntityId,
        _after: Timestamp,
    ) -> BridgeResult<Vec<MirrorTransaction>> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        match self.account_responses.lock().await.pop_front() {
            Some(response) => response,
            None => Ok(vec![]),
        }
    }

    async fn scheduled_transaction(
        &self,
        _transaction_id: &str,
    ) -> BridgeResult<Option<MirrorTransaction>> {
        Ok(None)
    }

    async fn schedule(&self, schedule_id: &str) -> BridgeResult<MirrorSchedule> {
        self.schedules
            .lock()
            .await
            .get(schedule_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("schedule {}", schedule_id)))
    }

    async fn nft_transactions(
        &self,
        _token_id: &str,
        _serial_number: i64,
    ) -> BridgeResult<Vec<MirrorTransaction>> {
        match self.nft_responses.lock().await.pop_front() {
            Some(txs) => Ok(txs),
            None => Ok(vec![]),
        }
    }
}

// ---------------------------------------------------------------- ledger --

#[derive(Debug, Clone)]
pub struct RecordedOp {
    pub kind: &'static str,
    pub memo: String,
    pub entries: Vec<AccountAmount>,
    pub token_id: Option<String>,
    pub should_fail: bool,
}

pub struct MockLedgerClient {
    next: AtomicUsize,
    executed: AtomicUsize,
    ops: Mutex<HashMap<String, RecordedOp>>,
    order: Mutex<Vec<String>>,
    fail_submit_accounts: Mutex<HashSet<String>>,
    fail_exec_accounts: Mutex<HashSet<String>>,
    fail_exec_kinds: Mutex<HashSet<&'static str>>,
    execution_delay: Mutex<Duration>,
}

impl MockLedgerClient {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
            executed: AtomicUsize::new(0),
            ops: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
            fail_submit_accounts: Mutex::new(HashSet::new()),
            fail_exec_accounts: Mutex::new(HashSet::new()),
            fail_exec_kinds: Mutex::new(HashSet::new()),
            execution_delay: Mutex::new(Duration::from_millis(0)),
        }
    }

    pub async fn fail_submissions_for_account(&self, account: &str) {
        self.fail_submit_accounts
            .lock()
            .await
            .insert(account.to_string());
    }

    pub async fn fail_execution_for_account(&self, account: &str) {
        self.fail_exec_accounts
            .lock()
            .await
            .insert(account.to_string());
    }

    pub async fn fail_execution_for_kind(&self, kind: &'static str) {
        self.fail_exec_kinds.lock().await.insert(kind);
    }

    pub async fn set_execution_delay(&self, delay: Duration) {
        *self.execution_delay.lock().await = delay;
    }

    pub fn executed_count(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    /// Kinds of the submitted operations, in submission order.
    pub async fn submission_kinds(&self) -> Vec<&'static str> {
        let ops = self.ops.lock().await;
        self.order
            .lock()
            .await
            .iter()
            .filter_map(|id| ops.get(id).map(|op| op.kind))
            .collect()
    }

    pub async fn recorded_op(&self, transaction_id: &str) -> Option<RecordedOp> {
        self.ops.lock().await.get(transaction_id).cloned()
    }

    async fn record(
        &self,
        kind: &'static str,
        memo: &str,
        entries: Vec<AccountAmount>,
        token_id: Option<String>,
    ) -> BridgeResult<ScheduleSubmission> {
        let fail_submit = {
            let fail = self.fail_submit_accounts.lock().await;
            entries.iter().any(|e| fail.contains(&e.account.to_string()))
        };
        if fail_submit {
            return Err(BridgeError::UpstreamUnavailable(
                "simulated submission failure".to_string(),
            ));
        }

        let should_fail = {
            let by_account = self.fail_exec_accounts.lock().await;
            let by_kind = self.fail_exec_kinds.lock().await;
            by_kind.contains(kind)
                || entries
                    .iter()
                    .any(|e| by_account.contains(&e.account.to_string()))
        };

        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let transaction_id = format!("sched-{}", n);
        let schedule_id = format!("0.0.9{:03}", n);
        self.ops.lock().await.insert(
            transaction_id.clone(),
            RecordedOp {
                kind,
                memo: memo.to_string(),
                entries,
                token_id,
                should_fail,
            },
        );
        self.order.lock().await.push(transaction_id.clone());
        Ok(ScheduleSubmission {
            transaction_id,
            schedule_id,
        })
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn submit_scheduled_transfer(
        &self,
        entries: &[AccountAmount],
        token_id: Option<&str>,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        self.record(
            "transfer",
            memo,
            entries.to_vec(),
            token_id.map(|t| t.to_string()),
        )
        .await
    }

    async fn submit_scheduled_mint(
        &self,
        token_id: &str,
        amount: i64,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        let _ = amount;
        self.record("mint", memo, vec![], Some(token_id.to_string()))
            .await
    }

    async fn submit_scheduled_burn(
        &self,
        token_id: &str,
        amount: i64,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        let _ = amount;
        self.record("burn", memo, vec![], Some(token_id.to_string()))
            .await
    }

    async fn submit_scheduled_nft_transfer(
        &self,
        token_id: &str,
        serial_number: i64,
        sender: &EntityId,
        receiver: &EntityId,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        let _ = serial_number;
        let entries = vec![
            AccountAmount {
                account: *sender,
                amount: 0,
            },
            AccountAmount {
                account: *receiver,
                amount: 0,
            },
        ];
        self.record("nft-transfer", memo, entries, Some(token_id.to_string()))
            .await
    }

    async fn submit_scheduled_nft_approve(
        &self,
        token_id: &str,
        serial_number: i64,
        spender: &EntityId,
        memo: &str,
    ) -> BridgeResult<ScheduleSubmission> {
        let _ = serial_number;
        let entries = vec![AccountAmount {
            account: *spender,
            amount: 0,
        }];
        self.record("approve", memo, entries, Some(token_id.to_string()))
            .await
    }

    async fn await_scheduled_execution(&self, transaction_id: &str) -> BridgeResult<()> {
        let op = self
            .ops
            .lock()
            .await
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("op {}", transaction_id)))?;
        if op.should_fail {
            self.executed.fetch_add(1, Ordering::SeqCst);
            return Err(BridgeError::ScheduleExecutionFailed(format!(
                "simulated execution failure for {}",
                transaction_id
            )));
        }
        let delay = *self.execution_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ----------------------------------------------------------------- topic --

pub struct MockTopicClient {
    pub published: Mutex<Vec<Vec<u8>>>,
    fail_all: std::sync::atomic::AtomicBool,
}

impl MockTopicClient {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_all: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    pub async fn published_count(&self) -> usize {
        self.published.lock().await.len()
    }
}

#[async_trait]
impl TopicClient for MockTopicClient {
    async fn submit_message(&self, payload: Vec<u8>) -> BridgeResult<String> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(BridgeError::UpstreamUnavailable(
                "simulated topic outage".to_string(),
            ));
        }
        let mut published = self.published.lock().await;
        published.push(payload);
        Ok(format!("0.0.999-{}-0", published.len()))
    }
}

// ------------------------------------------------------------- contracts --

pub struct MockContracts {
    members: Mutex<HashSet<EthAddress>>,
    quorum: AtomicUsize,
}

impl MockContracts {
    pub fn new(quorum: usize) -> Self {
        Self {
            members: Mutex::new(HashSet::new()),
            quorum: AtomicUsize::new(quorum),
        }
    }

    pub async fn add_member(&self, member: EthAddress) {
        self.members.lock().await.insert(member);
    }
}

#[async_trait]
impl BridgeContracts for MockContracts {
    async fn is_member(&self, _chain_id: u64, signer: EthAddress) -> BridgeResult<bool> {
        Ok(self.members.lock().await.contains(&signer))
    }

    async fn reaches_quorum(&self, _chain_id: u64, count: usize) -> BridgeResult<bool> {
        Ok(count >= self.quorum.load(Ordering::SeqCst))
    }

    async fn members_count(&self, _chain_id: u64) -> BridgeResult<usize> {
        Ok(self.members.lock().await.len())
    }
}

/// Polls `check` until it returns true or `timeout` elapses. For asserting
/// on fire-and-forget side effects.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn test_metrics() -> Arc<crate::metrics::BridgeMetrics> {
    Arc::new(crate::metrics::BridgeMetrics::new(
        &prometheus::Registry::new(),
    ))
}
