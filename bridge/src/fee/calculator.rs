// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bridge fee calculation.
//!
//! Pure integer arithmetic over the configured percentage table; every
//! validator must compute byte-identical results for the same transfer.

use crate::config::{AssetTable, FEE_MAX_PERCENTAGE};
use crate::error::{BridgeError, BridgeResult};
use ethers::types::U256;

#[derive(Clone, Debug)]
pub struct FeeCalculator {
    assets: AssetTable,
}

impl FeeCalculator {
    pub fn new(assets: AssetTable) -> Self {
        Self { assets }
    }

    /// Returns `(fee, remainder)` with `fee = amount * ppm / 100_000` and
    /// `remainder = amount - fee`. The remainder is the amount that actually
    /// crosses the bridge.
    pub fn calculate_fee(&self, native_asset: &str, amount: &str) -> BridgeResult<(U256, U256)> {
        let percentage = self
            .assets
            .fee_percentage(native_asset)
            .ok_or_else(|| BridgeError::NotFound(format!("asset {}", native_asset)))?;
        let amount = U256::from_dec_str(amount.trim())
            .map_err(|e| BridgeError::InvalidInput(format!("amount is not numeric: {}", e)))?;

        let fee = amount
            .checked_mul(U256::from(percentage))
            .ok_or_else(|| BridgeError::InvalidInput("amount overflows fee math".to_string()))?
            / U256::from(FEE_MAX_PERCENTAGE);
        Ok((fee, amount - fee))
    }

    /// Flat fee for an NFT asset.
    pub fn nft_fee(&self, native_asset: &str) -> BridgeResult<i64> {
        self.assets
            .nft_fee(native_asset)
            .ok_or_else(|| BridgeError::NotFound(format!("nft fee for {}", native_asset)))
    }
}

/// `target = source * 10^(targetDecimals - sourceDecimals)`, truncating on
/// the way down. Integer-only; equal decimals is identity.
pub fn convert_decimals(
    amount: U256,
    source_decimals: u32,
    target_decimals: u32,
) -> BridgeResult<U256> {
    if source_decimals == target_decimals {
        return Ok(amount);
    }
    let diff = source_decimals.abs_diff(target_decimals);
    if diff > 77 {
        return Err(BridgeError::InvalidInput(format!(
            "decimal difference {} exceeds U256 range",
            diff
        )));
    }
    let scale = U256::from(10u64).pow(U256::from(diff));
    if target_decimals > source_decimals {
        amount
            .checked_mul(scale)
            .ok_or_else(|| BridgeError::InvalidInput("amount overflows conversion".to_string()))
    } else {
        Ok(amount / scale)
    }
}
