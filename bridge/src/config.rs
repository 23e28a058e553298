// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::crypto::AuthoritySigner;
use anyhow::{anyhow, Context};
use hedera_bridge_types::EntityId;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Fee percentages are expressed in parts per 100,000.
pub const FEE_MAX_PERCENTAGE: u64 = 100_000;

fn default_max_schedule_entries() -> usize {
    10
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_consistency_wait() -> Duration {
    Duration::from_secs(5)
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HederaConfig {
    // The chain id the native ledger is known by inside authorization payloads.
    pub chain_id: u64,
    // Base url of the mirror node REST API.
    pub mirror_base_url: String,
    // The custodial account holding locked native assets.
    pub bridge_account: String,
    // The account absorbing fee-split remainders.
    pub treasury_account: String,
    // The shared consensus topic validators exchange signatures on.
    pub topic_id: String,
    // Fee-distribution member accounts. Must match the deployed member set.
    pub members: Vec<String>,
    // Ledger limit on entries per scheduled transfer.
    #[serde(default = "default_max_schedule_entries")]
    pub max_schedule_entries: usize,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(rename = "poll-interval-seconds", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(
        rename = "consistency-wait-seconds",
        default = "default_consistency_wait"
    )]
    pub consistency_wait: Duration,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WrappedAssetConfig {
    pub asset: String,
    pub decimals: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssetConfig {
    // Native asset identifier ("HBAR" or a token entity id).
    pub native_asset: String,
    pub decimals: u32,
    // Parts per 100,000 taken as the bridge fee.
    pub fee_percentage: u64,
    // Flat fee for NFT assets, in the fee-payment denomination.
    #[serde(default)]
    pub nft_fee: Option<i64>,
    // Wrapped representation per target chain id.
    #[serde(default)]
    pub wrapped: BTreeMap<u64, WrappedAssetConfig>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorNodeConfig {
    // The port for the metrics server.
    pub metrics_port: u16,
    // Path of the file holding the hex-encoded secp256k1 authority key.
    pub signer_key_path: PathBuf,
    pub hedera: HederaConfig,
    pub assets: Vec<AssetConfig>,
}

impl ValidatorNodeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {:?}", path))?;
        serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config at {:?}", path))
    }

    /// Consumes the raw config into a validated runtime config.
    ///
    /// This is the only hard-fail path in the node: any unparseable
    /// identifier or out-of-range percentage aborts startup.
    pub fn validate(self) -> anyhow::Result<RuntimeConfig> {
        info!("Starting config validation");

        let bridge_account = EntityId::from_str(&self.hedera.bridge_account)
            .map_err(|e| anyhow!("invalid bridge account: {}", e))?;
        let treasury_account = EntityId::from_str(&self.hedera.treasury_account)
            .map_err(|e| anyhow!("invalid treasury account: {}", e))?;
        let topic_id = EntityId::from_str(&self.hedera.topic_id)
            .map_err(|e| anyhow!("invalid topic id: {}", e))?;

        if self.hedera.members.is_empty() {
            return Err(anyhow!("at least one fee-distribution member is required"));
        }
        let members = self
            .hedera
            .members
            .iter()
            .map(|m| EntityId::from_str(m).map_err(|e| anyhow!("invalid member account: {}", e)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        if self.hedera.max_schedule_entries < 2 {
            return Err(anyhow!(
                "max-schedule-entries must leave room for a debit plus at least one credit"
            ));
        }

        if self.assets.is_empty() {
            return Err(anyhow!("at least one asset must be configured"));
        }
        for asset in &self.assets {
            if asset.fee_percentage > FEE_MAX_PERCENTAGE {
                return Err(anyhow!(
                    "fee percentage {} for {} exceeds the maximum {}",
                    asset.fee_percentage,
                    asset.native_asset,
                    FEE_MAX_PERCENTAGE
                ));
            }
            for (chain_id, wrapped) in &asset.wrapped {
                if wrapped.decimals > 77 || asset.decimals > 77 {
                    return Err(anyhow!(
                        "decimals for {} on chain {} exceed U256 range",
                        asset.native_asset,
                        chain_id
                    ));
                }
            }
        }

        let key_hex = std::fs::read_to_string(&self.signer_key_path).with_context(|| {
            format!(
                "failed to read authority key from {:?}",
                self.signer_key_path
            )
        })?;
        let signer = AuthoritySigner::from_hex(&key_hex)
            .map_err(|e| anyhow!("invalid authority key: {}", e))?;
        info!(
            "Loaded authority key from {:?}, signer address {:?}",
            self.signer_key_path,
            signer.address()
        );

        Ok(RuntimeConfig {
            native_chain_id: self.hedera.chain_id,
            mirror_base_url: self.hedera.mirror_base_url,
            bridge_account,
            treasury_account,
            topic_id,
            members,
            max_schedule_entries: self.hedera.max_schedule_entries,
            poll_interval: self.hedera.poll_interval,
            consistency_wait: self.hedera.consistency_wait,
            assets: AssetTable::new(self.assets),
            signer,
            metrics_port: self.metrics_port,
        })
    }
}

/// Validated, immutable runtime configuration handed to every component.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub native_chain_id: u64,
    pub mirror_base_url: String,
    pub bridge_account: EntityId,
    pub treasury_account: EntityId,
    pub topic_id: EntityId,
    pub members: Vec<EntityId>,
    pub max_schedule_entries: usize,
    pub poll_interval: Duration,
    pub consistency_wait: Duration,
    pub assets: AssetTable,
    pub signer: AuthoritySigner,
    pub metrics_port: u16,
}

/// Immutable lookup table over the configured asset routes.
#[derive(Clone, Debug, Default)]
pub struct AssetTable {
    assets: Vec<AssetConfig>,
}

impl AssetTable {
    pub fn new(assets: Vec<AssetConfig>) -> Self {
        Self { assets }
    }

    pub fn native(&self, native_asset: &str) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| a.native_asset == native_asset)
    }

    pub fn fee_percentage(&self, native_asset: &str) -> Option<u64> {
        self.native(native_asset).map(|a| a.fee_percentage)
    }

    pub fn nft_fee(&self, native_asset: &str) -> Option<i64> {
        self.native(native_asset).and_then(|a| a.nft_fee)
    }

    pub fn wrapped_for(&self, native_asset: &str, chain_id: u64) -> Option<&WrappedAssetConfig> {
        self.native(native_asset).and_then(|a| a.wrapped.get(&chain_id))
    }

    /// Reverse lookup: the native entry a wrapped asset on `chain_id` maps to.
    pub fn native_for_wrapped(&self, chain_id: u64, wrapped_asset: &str) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| {
            a.wrapped
                .get(&chain_id)
                .map(|w| w.asset == wrapped_asset)
                .unwrap_or(false)
        })
    }
}
