// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Signing and signer-recovery capabilities.
//!
//! Validators sign the 32-byte canonical authorization digest with a
//! secp256k1 recoverable signature; peers recover the signer's EVM address
//! from `(digest, signature)` and check it against the target chain's member
//! set. Both directions must agree bit-for-bit with the verifying contract.

use crate::error::{BridgeError, BridgeResult};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address as EthAddress, RecoveryMessage, Signature, H256};

/// The node's bridge authority key.
#[derive(Clone)]
pub struct AuthoritySigner {
    wallet: LocalWallet,
}

impl AuthoritySigner {
    /// Parses a hex-encoded secp256k1 private key, `0x` prefix optional.
    pub fn from_hex(hex_key: &str) -> BridgeResult<Self> {
        let trimmed = hex_key.trim().trim_start_matches("0x");
        let wallet = trimmed
            .parse::<LocalWallet>()
            .map_err(|e| BridgeError::InvalidInput(format!("invalid signer key: {}", e)))?;
        Ok(Self { wallet })
    }

    /// The EVM address this signer's signatures recover to.
    pub fn address(&self) -> EthAddress {
        self.wallet.address()
    }

    pub fn sign_digest(&self, digest: H256) -> BridgeResult<Signature> {
        self.wallet
            .sign_hash(digest)
            .map_err(|e| BridgeError::Generic(format!("signing failed: {}", e)))
    }

    /// Signs and hex-encodes, ready for the topic envelope.
    pub fn sign_digest_hex(&self, digest: H256) -> BridgeResult<String> {
        Ok(hex::encode(self.sign_digest(digest)?.to_vec()))
    }
}

impl std::fmt::Debug for AuthoritySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthoritySigner({:?})", self.wallet.address())
    }
}

/// Decodes a hex recoverable signature (65 bytes: r || s || v).
pub fn decode_signature(signature_hex: &str) -> BridgeResult<Signature> {
    let raw = hex::decode(signature_hex.trim().trim_start_matches("0x"))
        .map_err(|e| BridgeError::InvalidInput(format!("signature is not hex: {}", e)))?;
    if raw.len() != 65 {
        return Err(BridgeError::InvalidInput(format!(
            "signature must be 65 bytes, got {}",
            raw.len()
        )));
    }
    Signature::try_from(raw.as_slice())
        .map_err(|e| BridgeError::InvalidInput(format!("malformed signature: {}", e)))
}

/// Recovers the signer's EVM address from a digest and a hex signature.
pub fn recover_signer(digest: H256, signature_hex: &str) -> BridgeResult<EthAddress> {
    let signature = decode_signature(signature_hex)?;
    signature
        .recover(RecoveryMessage::Hash(digest))
        .map_err(|e| BridgeError::InvalidInput(format!("signature recovery failed: {}", e)))
}

/// Canonical lowercase no-prefix form used for dedup keys.
pub fn normalize_signature_hex(signature_hex: &str) -> String {
    signature_hex
        .trim()
        .trim_start_matches("0x")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::keccak256;

    const TEST_KEY: &str = "e42c82337ce12d4a7ad6cd65876d91b2ab6594fd50cdab1737c91773ba7451db";

    #[test]
    fn test_sign_and_recover_roundtrip() {
        let signer = AuthoritySigner::from_hex(TEST_KEY).unwrap();
        let digest = H256::from(keccak256(b"authorization payload"));

        let sig_hex = signer.sign_digest_hex(digest).unwrap();
        let recovered = recover_signer(digest, &sig_hex).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = AuthoritySigner::from_hex(TEST_KEY).unwrap();
        let digest = H256::from(keccak256(b"same payload"));
        assert_eq!(
            signer.sign_digest_hex(digest).unwrap(),
            signer.sign_digest_hex(digest).unwrap()
        );
    }

    #[test]
    fn test_recover_rejects_mismatched_digest() {
        let signer = AuthoritySigner::from_hex(TEST_KEY).unwrap();
        let digest = H256::from(keccak256(b"payload one"));
        let other = H256::from(keccak256(b"payload two"));

        let sig_hex = signer.sign_digest_hex(digest).unwrap();
        // Recovery over a different digest yields a different identity (or an
        // error), never the original signer.
        match recover_signer(other, &sig_hex) {
            Ok(addr) => assert_ne!(addr, signer.address()),
            Err(e) => assert_eq!(e.error_type(), "invalid_input"),
        }
    }

    #[test]
    fn test_decode_rejects_malformed_signatures() {
        assert!(decode_signature("zz").is_err());
        assert!(decode_signature("abcd").is_err());
        assert!(decode_signature(&"ab".repeat(64)).is_err());
    }

    #[test]
    fn test_from_hex_rejects_bad_keys() {
        assert!(AuthoritySigner::from_hex("").is_err());
        assert!(AuthoritySigner::from_hex("nothex").is_err());
    }

    #[test]
    fn test_normalize_signature_hex() {
        assert_eq!(normalize_signature_hex("0xABCDef"), "abcdef");
        assert_eq!(normalize_signature_hex(" abCD "), "abcd");
    }
}
