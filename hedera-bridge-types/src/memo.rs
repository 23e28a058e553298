// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Transaction memo codec.
//!
//! The native-chain deposit carries a base64 memo that encodes the
//! cross-chain destination, wire-exact:
//! `"{targetChainId}-{0x<40 hex>}"`, optionally suffixed
//! `"-{serialNumber}@{tokenId}"` for NFT routing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoError {
    #[error("memo is not valid base64")]
    InvalidBase64,
    #[error("memo is not valid utf-8")]
    InvalidUtf8,
    #[error("memo has invalid shape: {0}")]
    InvalidShape(String),
    #[error("memo target chain id is not numeric: {0}")]
    InvalidChainId(String),
    #[error("memo recipient is not an EVM address: {0}")]
    InvalidAddress(String),
    #[error("memo nft id is malformed: {0}")]
    InvalidNftId(String),
}

/// NFT routing information carried in the memo suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoNftId {
    pub serial_number: i64,
    pub token_id: String,
}

/// Decoded cross-chain destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMemo {
    pub target_chain_id: u64,
    pub recipient: String,
    pub nft_id: Option<MemoNftId>,
}

/// Decodes and validates a base64 transaction memo.
///
/// Fails on anything that does not match the hyphen-delimited shape; a
/// malformed memo permanently rejects the deposit it arrived with.
pub fn parse_memo(base64_memo: &str) -> Result<BridgeMemo, MemoError> {
    let raw = BASE64
        .decode(base64_memo.trim())
        .map_err(|_| MemoError::InvalidBase64)?;
    let decoded = String::from_utf8(raw).map_err(|_| MemoError::InvalidUtf8)?;

    let parts: Vec<&str> = decoded.split('-').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(MemoError::InvalidShape(decoded));
    }

    let target_chain_id = parts[0]
        .parse::<u64>()
        .map_err(|_| MemoError::InvalidChainId(parts[0].to_string()))?;

    let recipient = parts[1];
    if !is_evm_address(recipient) {
        return Err(MemoError::InvalidAddress(recipient.to_string()));
    }

    let nft_id = match parts.get(2) {
        Some(suffix) => Some(parse_nft_suffix(suffix)?),
        None => None,
    };

    Ok(BridgeMemo {
        target_chain_id,
        recipient: recipient.to_string(),
        nft_id,
    })
}

fn parse_nft_suffix(suffix: &str) -> Result<MemoNftId, MemoError> {
    let (serial, token) = suffix
        .split_once('@')
        .ok_or_else(|| MemoError::InvalidNftId(suffix.to_string()))?;
    let serial_number = serial
        .parse::<i64>()
        .map_err(|_| MemoError::InvalidNftId(suffix.to_string()))?;
    if serial_number <= 0 || token.is_empty() {
        return Err(MemoError::InvalidNftId(suffix.to_string()));
    }
    Ok(MemoNftId {
        serial_number,
        token_id: token.to_string(),
    })
}

/// `0x` + 40 hex characters.
pub fn is_evm_address(s: &str) -> bool {
    s.len() == 42 && s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}
