// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Signature/message service.
//!
//! Outbound: builds the canonical authorization payload for a transfer,
//! signs it and wraps it in the topic envelope. Inbound: sanity-checks a
//! peer's broadcast against the locally reconstructed transfer record,
//! recovers and authorizes the signer, deduplicates and persists.
//!
//! The sanity checks deliberately wait forever for local consistency: a
//! peer's signature may race ahead of this node's own ingestion or fee
//! computation, and the only bound on the wait is process shutdown.

use crate::clients::BridgeContracts;
use crate::config::RuntimeConfig;
use crate::crypto::{normalize_signature_hex, recover_signer};
use crate::encoding::{fungible_auth_digest, nft_auth_digest};
use crate::error::{BridgeError, BridgeResult};
use crate::fee::convert_decimals;
use crate::metrics::BridgeMetrics;
use crate::storage::{MessageRepository, TransferRepository};
use ethers::types::{H256, U256};
use hedera_bridge_types::entities::{Message, Transfer};
use hedera_bridge_types::topic::{FungibleSignaturePayload, NftSignaturePayload, TopicMessage};
use std::sync::Arc;
use tap::TapFallible;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct MessageService {
    cfg: Arc<RuntimeConfig>,
    transfers: Arc<dyn TransferRepository>,
    messages: Arc<dyn MessageRepository>,
    contracts: Arc<dyn BridgeContracts>,
    metrics: Arc<BridgeMetrics>,
}

impl MessageService {
    pub fn new(
        cfg: Arc<RuntimeConfig>,
        transfers: Arc<dyn TransferRepository>,
        messages: Arc<dyn MessageRepository>,
        contracts: Arc<dyn BridgeContracts>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            cfg,
            transfers,
            messages,
            contracts,
            metrics,
        }
    }

    /// Blocks until the transfer row is visible, and, with `fee_gate`, until
    /// its fee is populated for transfers whose asset is native to this
    /// ledger (a peer's signature can race ahead of our fee computation).
    /// Returns `None` only on cancellation.
    pub async fn await_transfer(
        &self,
        transfer_id: &str,
        fee_gate: bool,
        cancel: &CancellationToken,
    ) -> Option<Transfer> {
        loop {
            match self.transfers.get_by_transaction_id(transfer_id).await {
                Ok(Some(transfer)) => {
                    let needs_fee = fee_gate
                        && transfer.native_chain_id == self.cfg.native_chain_id
                        && transfer.fee.is_empty();
                    if !needs_fee {
                        return Some(transfer);
                    }
                    debug!(
                        "[MessageService] Transfer {} visible but fee not yet computed, waiting",
                        transfer_id
                    );
                }
                Ok(None) => {
                    debug!(
                        "[MessageService] Transfer {} not visible yet, waiting",
                        transfer_id
                    );
                }
                Err(e) => {
                    self.metrics.record_error(&e);
                    warn!(
                        "[MessageService] Lookup of {} failed: {}, retrying",
                        transfer_id, e
                    );
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.cfg.consistency_wait) => {}
            }
        }
    }

    /// Field-by-field comparison of a fungible signature message against the
    /// stored transfer. `Ok(true)` only on exact match.
    pub async fn sanity_check_fungible(
        &self,
        msg: &FungibleSignaturePayload,
        cancel: &CancellationToken,
    ) -> BridgeResult<bool> {
        let transfer = self
            .await_transfer(&msg.transfer_id, true, cancel)
            .await
            .ok_or_else(|| BridgeError::Generic("cancelled while awaiting transfer".to_string()))?;

        let expected_amount = self.expected_target_amount(&transfer)?;
        let msg_amount = U256::from_dec_str(&msg.amount)
            .map_err(|e| BridgeError::InvalidInput(format!("message amount: {}", e)))?;

        Ok(msg.source_chain_id == transfer.source_chain_id
            && msg.target_chain_id == transfer.target_chain_id
            && msg.recipient == transfer.receiver
            && msg.asset == transfer.target_asset
            && msg_amount == expected_amount)
    }

    /// Same pattern for NFT signature messages.
    pub async fn sanity_check_nft(
        &self,
        msg: &NftSignaturePayload,
        cancel: &CancellationToken,
    ) -> BridgeResult<bool> {
        let transfer = self
            .await_transfer(&msg.transfer_id, false, cancel)
            .await
            .ok_or_else(|| BridgeError::Generic("cancelled while awaiting transfer".to_string()))?;

        Ok(msg.source_chain_id == transfer.source_chain_id
            && msg.target_chain_id == transfer.target_chain_id
            && msg.recipient == transfer.receiver
            && msg.asset == transfer.target_asset
            && i64::try_from(msg.serial_number).ok() == Some(transfer.serial_number)
            && msg.metadata == transfer.metadata)
    }

    /// The amount the authorization must carry: net of fee for native
    /// transfers, decimal-converted for wrapped returns.
    fn expected_target_amount(&self, transfer: &Transfer) -> BridgeResult<U256> {
        let amount = U256::from_dec_str(&transfer.amount)
            .map_err(|e| BridgeError::InvalidInput(format!("stored amount: {}", e)))?;

        if transfer.native_chain_id == self.cfg.native_chain_id {
            let fee = U256::from_dec_str(&transfer.fee)
                .map_err(|e| BridgeError::InvalidInput(format!("stored fee: {}", e)))?;
            return amount
                .checked_sub(fee)
                .ok_or_else(|| BridgeError::InvalidInput("fee exceeds amount".to_string()));
        }

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
                    "no wrapped decimals for {} on chain {}",
                    transfer.source_asset, transfer.source_chain_id
                ))
            })?;
        convert_decimals(amount, wrapped_decimals, native_entry.decimals)
    }

    /// Verifies, deduplicates and persists an incoming peer signature.
    /// Returns `Ok(true)` when a new row was stored, `Ok(false)` for the
    /// benign duplicate case.
    pub async fn process_signature(
        &self,
        transfer_id: &str,
        signature_hex: &str,
        target_chain_id: u64,
        timestamp: i64,
        digest: H256,
    ) -> BridgeResult<bool> {
        let signature = normalize_signature_hex(signature_hex);
        let signer = recover_signer(digest, &signature).tap_err(|e| {
            warn!(
                "[MessageService] Signature for {} failed recovery: {}",
                transfer_id, e
            )
        })?;

        if self.messages.exist(transfer_id, &signature).await? {
            self.metrics.signatures_duplicate.inc();
            debug!(
                "[MessageService] Duplicate signature for {}, ignoring",
                transfer_id
            );
            return Ok(false);
        }

        let signer_hex = format!("0x{}", hex::encode(signer.as_bytes()));
        if !self.contracts.is_member(target_chain_id, signer).await? {
            self.metrics.signatures_unauthorized.inc();
            return Err(BridgeError::UnauthorizedSigner(format!(
                "{} is not a member of chain {}",
                signer_hex, target_chain_id
            )));
        }

        self.messages
            .create(Message {
                transfer_id: transfer_id.to_string(),
                hash: hex::encode(digest.as_bytes()),
                signature,
                signer: signer_hex.clone(),
                transaction_timestamp: timestamp,
            })
            .await?;
        self.metrics.signatures_verified.inc();
        info!(
            "[MessageService] Stored signature for {} from {}",
            transfer_id, signer_hex
        );
        Ok(true)
    }

    /// Signs the fungible authorization for `net_amount` and returns the
    /// topic-ready envelope bytes.
    pub fn sign_fungible(&self, transfer: &Transfer, net_amount: &str) -> BridgeResult<Vec<u8>> {
        let digest = fungible_auth_digest(
            transfer.source_chain_id,
            transfer.target_chain_id,
            &transfer.transaction_id,
            &transfer.target_asset,
            &transfer.receiver,
            net_amount,
        )?;
        let signature = self.cfg.signer.sign_digest_hex(digest)?;
        self.metrics.signatures_signed.inc();

        let msg = TopicMessage::Fungible(FungibleSignaturePayload {
            source_chain_id: transfer.source_chain_id,
            target_chain_id: transfer.target_chain_id,
            transfer_id: transfer.transaction_id.clone(),
            asset: transfer.target_asset.clone(),
            recipient: transfer.receiver.clone(),
            amount: net_amount.to_string(),
            signature,
        });
        Ok(msg.to_bytes())
    }

    pub fn sign_nft(&self, transfer: &Transfer) -> BridgeResult<Vec<u8>> {
        let serial_number = u64::try_from(transfer.serial_number).map_err(|_| {
            BridgeError::InvalidInput(format!(
                "nft serial {} is negative",
                transfer.serial_number
            ))
        })?;
        let digest = nft_auth_digest(
            transfer.source_chain_id,
            transfer.target_chain_id,
            &transfer.transaction_id,
            &transfer.target_asset,
            serial_number,
            &transfer.metadata,
            &transfer.receiver,
        )?;
        let signature = self.cfg.signer.sign_digest_hex(digest)?;
        self.metrics.signatures_signed.inc();

        let msg = TopicMessage::Nft(NftSignaturePayload {
            source_chain_id: transfer.source_chain_id,
            target_chain_id: transfer.target_chain_id,
            transfer_id: transfer.transaction_id.clone(),
            asset: transfer.target_asset.clone(),
            serial_number,
            metadata: transfer.metadata.clone(),
            recipient: transfer.receiver.clone(),
            signature,
        });
        Ok(msg.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStore;
    use crate::test_utils::{
        sample_transfer, test_metrics, test_runtime_config, MockContracts, TEST_EVM_CHAIN,
        TEST_EVM_NATIVE_ASSET, TEST_HEDERA_WRAPPED_TOKEN,
    };
    use std::time::Duration;

    struct Fixture {
        service: MessageService,
        store: Arc<InMemoryStore>,
        contracts: Arc<MockContracts>,
        cfg: Arc<RuntimeConfig>,
    }

    fn fixture() -> Fixture {
        let cfg = Arc::new(test_runtime_config());
        let store = Arc::new(InMemoryStore::new());
        let contracts = Arc::new(MockContracts::new(2));
        let service = MessageService::new(
            cfg.clone(),
            store.clone(),
            store.clone(),
            contracts.clone(),
            test_metrics(),
        );
        Fixture {
            service,
            store,
            contracts,
            cfg,
        }
    }

    fn signed_fungible_payload(f: &Fixture, transfer: &Transfer) -> FungibleSignaturePayload {
        let bytes = f.service.sign_fungible(transfer, "990000000").unwrap();
        match TopicMessage::from_bytes(&bytes).unwrap() {
            TopicMessage::Fungible(payload) => payload,
            _ => panic!("expected fungible payload"),
        }
    }

    #[tokio::test]
    async fn test_sanity_check_waits_for_row_then_matches() {
        let f = fixture();
        let mut transfer = sample_transfer("t1");
        transfer.fee = "10000000".to_string();
        let payload = signed_fungible_payload(&f, &transfer);

        // Insert the row only after the check has started retrying.
        let store = f.store.clone();
        let delayed = transfer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            TransferRepository::create(store.as_ref(), delayed).await.unwrap();
        });

        let started = std::time::Instant::now();
        let ok = f
            .service
            .sanity_check_fungible(&payload, &CancellationToken::new())
            .await
            .unwrap();
        assert!(ok);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_sanity_check_waits_for_fee_on_native_transfers() {
        let f = fixture();
        let transfer = sample_transfer("t1");
        // Row visible immediately, fee computed later.
        TransferRepository::create(f.store.as_ref(), transfer.clone()).await.unwrap();

        let mut with_fee = transfer.clone();
        with_fee.fee = "10000000".to_string();
        let payload = signed_fungible_payload(&f, &with_fee);

        let store = f.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            store.update_fee("t1", "10000000").await.unwrap();
        });

        let started = std::time::Instant::now();
        let ok = f
            .service
            .sanity_check_fungible(&payload, &CancellationToken::new())
            .await
            .unwrap();
        assert!(ok);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_sanity_check_rejects_mismatched_fields() {
        let f = fixture();
        let mut transfer = sample_transfer("t1");
        transfer.fee = "10000000".to_string();
        TransferRepository::create(f.store.as_ref(), transfer.clone()).await.unwrap();

        // Tampered recipient.
        let mut payload = signed_fungible_payload(&f, &transfer);
        payload.recipient = "0x000000000000000000000000000000000000dead".to_string();
        assert!(!f
            .service
            .sanity_check_fungible(&payload, &CancellationToken::new())
            .await
            .unwrap());

        // Tampered amount (not net of fee).
        let mut payload = signed_fungible_payload(&f, &transfer);
        payload.amount = transfer.amount.clone();
        assert!(!f
            .service
            .sanity_check_fungible(&payload, &CancellationToken::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_sanity_check_wrapped_return_converts_decimals() {
        let f = fixture();
        // A wrapped-on-Hedera asset returning to its native EVM chain:
        // 8 decimals here, 18 there.
        let mut transfer = sample_transfer("t1");
        transfer.source_chain_id = 0;
        transfer.target_chain_id = TEST_EVM_CHAIN;
        transfer.native_chain_id = TEST_EVM_CHAIN;
        transfer.source_asset = TEST_HEDERA_WRAPPED_TOKEN.to_string();
        transfer.target_asset = TEST_EVM_NATIVE_ASSET.to_string();
        transfer.native_asset = TEST_EVM_NATIVE_ASSET.to_string();
        transfer.amount = "12345".to_string();
        TransferRepository::create(f.store.as_ref(), transfer.clone()).await.unwrap();

        let converted = "123450000000000"; // 12345 * 10^10
        let bytes = f.service.sign_fungible(&transfer, converted).unwrap();
        let TopicMessage::Fungible(payload) = TopicMessage::from_bytes(&bytes).unwrap() else {
            panic!("expected fungible payload");
        };
        assert!(f
            .service
            .sanity_check_fungible(&payload, &CancellationToken::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_sanity_check_nft_matches_serial_and_metadata() {
        let f = fixture();
        let mut transfer = sample_transfer("t1");
        transfer.is_nft = true;
        transfer.serial_number = 7;
        transfer.metadata = "ipfs://bafy".to_string();
        transfer.source_asset = "0.0.5005".to_string();
        transfer.native_asset = "0.0.5005".to_string();
        transfer.target_asset = "0x00000000000000000000000000000000000000bb".to_string();
        TransferRepository::create(f.store.as_ref(), transfer.clone()).await.unwrap();

        let bytes = f.service.sign_nft(&transfer).unwrap();
        let TopicMessage::Nft(payload) = TopicMessage::from_bytes(&bytes).unwrap() else {
            panic!("expected nft payload");
        };
        assert!(f
            .service
            .sanity_check_nft(&payload, &CancellationToken::new())
            .await
            .unwrap());

        let mut tampered = payload.clone();
        tampered.serial_number = 8;
        assert!(!f
            .service
            .sanity_check_nft(&tampered, &CancellationToken::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_process_signature_stores_member_signature() {
        let f = fixture();
        f.contracts.add_member(f.cfg.signer.address()).await;

        let digest = fungible_auth_digest(0, TEST_EVM_CHAIN, "t1",
            "0x0000000000000000000000000000000000000001",
            "0x0000000000000000000000000000000000000002", "990000000").unwrap();
        let signature = f.cfg.signer.sign_digest_hex(digest).unwrap();

        let stored = f
            .service
            .process_signature("t1", &signature, TEST_EVM_CHAIN, 42, digest)
            .await
            .unwrap();
        assert!(stored);

        let messages = f.store.get_by_transfer_id("t1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].signer,
            format!("0x{}", hex::encode(f.cfg.signer.address().as_bytes()))
        );
        assert_eq!(messages[0].transaction_timestamp, 42);
    }

    #[tokio::test]
    async fn test_process_signature_duplicate_is_benign() {
        let f = fixture();
        f.contracts.add_member(f.cfg.signer.address()).await;

        let digest = fungible_auth_digest(0, TEST_EVM_CHAIN, "t1",
            "0x0000000000000000000000000000000000000001",
            "0x0000000000000000000000000000000000000002", "1").unwrap();
        let signature = f.cfg.signer.sign_digest_hex(digest).unwrap();

        assert!(f
            .service
            .process_signature("t1", &signature, TEST_EVM_CHAIN, 1, digest)
            .await
            .unwrap());
        // Redelivery: no error, no second row.
        assert!(!f
            .service
            .process_signature("t1", &signature, TEST_EVM_CHAIN, 1, digest)
            .await
            .unwrap());
        assert_eq!(f.store.get_by_transfer_id("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_process_signature_rejects_non_member() {
        let f = fixture();
        // Member set left empty.
        let digest = fungible_auth_digest(0, TEST_EVM_CHAIN, "t1",
            "0x0000000000000000000000000000000000000001",
            "0x0000000000000000000000000000000000000002", "1").unwrap();
        let signature = f.cfg.signer.sign_digest_hex(digest).unwrap();

        let err = f
            .service
            .process_signature("t1", &signature, TEST_EVM_CHAIN, 1, digest)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "unauthorized_signer");
        assert!(f.store.get_by_transfer_id("t1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_signature_rejects_malformed_hex() {
        let f = fixture();
        let digest = H256::zero();
        let err = f
            .service
            .process_signature("t1", "zznothex", TEST_EVM_CHAIN, 1, digest)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "invalid_input");
    }
}
