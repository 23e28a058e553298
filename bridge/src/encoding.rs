// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canonical authorization digests.
//!
//! Every validator and the verifying contract must produce the same 32
//! bytes for the same transfer, so the scheme is fixed: ABI-encode the
//! fields in declaration order, `keccak256` the encoding, then hash again
//! as an Ethereum signed message
//! (`keccak256("\x19Ethereum Signed Message:\n32" || inner)`).

use crate::error::{BridgeError, BridgeResult};
use ethers::abi::{encode, Token};
use ethers::types::{Address as EthAddress, H256, U256};
use ethers::utils::{hash_message, keccak256};
use std::str::FromStr;

/// Digest for a fungible transfer authorization.
///
/// Field order and ABI types (uint256, uint256, bytes, address, address,
/// uint256) are part of the wire contract.
pub fn fungible_auth_digest(
    source_chain_id: u64,
    target_chain_id: u64,
    transfer_id: &str,
    asset: &str,
    receiver: &str,
    amount: &str,
) -> BridgeResult<H256> {
    let encoded = encode(&[
        Token::Uint(U256::from(source_chain_id)),
        Token::Uint(U256::from(target_chain_id)),
        Token::Bytes(transfer_id.as_bytes().to_vec()),
        Token::Address(parse_address(asset, "asset")?),
        Token::Address(parse_address(receiver, "receiver")?),
        Token::Uint(parse_amount(amount)?),
    ]);
    Ok(hash_message(keccak256(encoded)))
}

/// Digest for an NFT transfer authorization (uint256, uint256, bytes,
/// address, uint256, string, address).
pub fn nft_auth_digest(
    source_chain_id: u64,
    target_chain_id: u64,
    transfer_id: &str,
    asset: &str,
    serial_number: u64,
    metadata: &str,
    receiver: &str,
) -> BridgeResult<H256> {
    let encoded = encode(&[
        Token::Uint(U256::from(source_chain_id)),
        Token::Uint(U256::from(target_chain_id)),
        Token::Bytes(transfer_id.as_bytes().to_vec()),
        Token::Address(parse_address(asset, "asset")?),
        Token::Uint(U256::from(serial_number)),
        Token::String(metadata.to_string()),
        Token::Address(parse_address(receiver, "receiver")?),
    ]);
    Ok(hash_message(keccak256(encoded)))
}

fn parse_address(s: &str, field: &str) -> BridgeResult<EthAddress> {
    EthAddress::from_str(s.trim())
        .map_err(|e| BridgeError::InvalidInput(format!("{} is not an EVM address: {}", field, e)))
}

fn parse_amount(s: &str) -> BridgeResult<U256> {
    U256::from_dec_str(s.trim())
        .map_err(|e| BridgeError::InvalidInput(format!("amount is not numeric: {}", e)))
}
