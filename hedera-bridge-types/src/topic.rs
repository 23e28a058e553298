// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Consensus-topic message codec.
//!
//! Encoded topic message consists of the following fields:
//! 1. Message type (1 byte)
//! 2. Message version (1 byte)
//! 3. Payload (variable length)
//!
//! Variable-length payload fields are u16 big-endian length-prefixed; chain
//! ids and serial numbers are u64 big-endian. A legacy untagged format (a
//! bare fungible payload without the two header bytes) is still accepted:
//! decoding tries the tagged envelope first and falls back to the legacy
//! shape on parse failure. The fallback order is a compatibility contract
//! with already-deployed peers and must not change.

use enum_dispatch::enum_dispatch;

pub const TOPIC_MESSAGE_TYPE_FUNGIBLE: u8 = 1;
pub const TOPIC_MESSAGE_TYPE_NFT: u8 = 2;
pub const TOPIC_MESSAGE_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicDecodeError {
    #[error("topic message truncated")]
    Truncated,
    #[error("unknown topic message type: {0}")]
    UnknownType(u8),
    #[error("unsupported topic message version: {0}")]
    UnsupportedVersion(u8),
    #[error("topic message field is not valid utf-8")]
    InvalidUtf8,
    #[error("topic message has trailing bytes")]
    TrailingBytes,
    #[error("topic message has empty transfer id")]
    EmptyTransferId,
}

/// A fungible-transfer signature broadcast by one validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FungibleSignaturePayload {
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub transfer_id: String,
    pub asset: String,
    pub recipient: String,
    /// Decimal string, net of fees.
    pub amount: String,
    /// Hex-encoded recoverable signature.
    pub signature: String,
}

/// An NFT-transfer signature broadcast by one validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftSignaturePayload {
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub transfer_id: String,
    pub asset: String,
    pub serial_number: u64,
    pub metadata: String,
    pub recipient: String,
    pub signature: String,
}

#[enum_dispatch]
pub trait TopicPayloadEncoding {
    // Convert the payload piece (everything after the header) to bytes
    fn as_payload_bytes(&self) -> Vec<u8>;
    // The message type tag for the envelope header
    fn message_type(&self) -> u8;
}

impl TopicPayloadEncoding for FungibleSignaturePayload {
    fn as_payload_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // Add source chain id
        bytes.extend_from_slice(&self.source_chain_id.to_be_bytes());
        // Add target chain id
        bytes.extend_from_slice(&self.target_chain_id.to_be_bytes());
        put_str(&mut bytes, &self.transfer_id);
        put_str(&mut bytes, &self.asset);
        put_str(&mut bytes, &self.recipient);
        put_str(&mut bytes, &self.amount);
        put_str(&mut bytes, &self.signature);
        bytes
    }

    fn message_type(&self) -> u8 {
        TOPIC_MESSAGE_TYPE_FUNGIBLE
    }
}

impl TopicPayloadEncoding for NftSignaturePayload {
    fn as_payload_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.source_chain_id.to_be_bytes());
        bytes.extend_from_slice(&self.target_chain_id.to_be_bytes());
        put_str(&mut bytes, &self.transfer_id);
        put_str(&mut bytes, &self.asset);
        // Add serial number
        bytes.extend_from_slice(&self.serial_number.to_be_bytes());
        put_str(&mut bytes, &self.metadata);
        put_str(&mut bytes, &self.recipient);
        put_str(&mut bytes, &self.signature);
        bytes
    }

    fn message_type(&self) -> u8 {
        TOPIC_MESSAGE_TYPE_NFT
    }
}

/// The tagged envelope carried on the shared topic.
#[enum_dispatch(TopicPayloadEncoding)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicMessage {
    Fungible(FungibleSignaturePayload),
    Nft(NftSignaturePayload),
}

impl TopicMessage {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // Add message type
        bytes.push(self.message_type());
        // Add message version
        bytes.push(TOPIC_MESSAGE_VERSION);
        // Add payload bytes
        bytes.extend_from_slice(&self.as_payload_bytes());
        bytes
    }

    /// Decodes a topic message, tagged envelope first, legacy fungible shape
    /// second. Returns the error of the tagged attempt if both fail.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TopicDecodeError> {
        match Self::from_tagged_bytes(bytes) {
            Ok(msg) => Ok(msg),
            Err(tagged_err) => match decode_fungible_payload(bytes) {
                Ok(payload) => Ok(TopicMessage::Fungible(payload)),
                Err(_) => Err(tagged_err),
            },
        }
    }

    fn from_tagged_bytes(bytes: &[u8]) -> Result<Self, TopicDecodeError> {
        if bytes.len() < 2 {
            return Err(TopicDecodeError::Truncated);
        }
        let (message_type, version) = (bytes[0], bytes[1]);
        if message_type != TOPIC_MESSAGE_TYPE_FUNGIBLE && message_type != TOPIC_MESSAGE_TYPE_NFT {
            return Err(TopicDecodeError::UnknownType(message_type));
        }
        if version != TOPIC_MESSAGE_VERSION {
            return Err(TopicDecodeError::UnsupportedVersion(version));
        }
        let payload = &bytes[2..];
        match message_type {
            TOPIC_MESSAGE_TYPE_FUNGIBLE => {
                Ok(TopicMessage::Fungible(decode_fungible_payload(payload)?))
            }
            _ => Ok(TopicMessage::Nft(decode_nft_payload(payload)?)),
        }
    }
}

fn decode_fungible_payload(bytes: &[u8]) -> Result<FungibleSignaturePayload, TopicDecodeError> {
    let mut reader = ByteReader::new(bytes);
    let payload = FungibleSignaturePayload {
        source_chain_id: reader.read_u64()?,
        target_chain_id: reader.read_u64()?,
        transfer_id: reader.read_str()?,
        asset: reader.read_str()?,
        recipient: reader.read_str()?,
        amount: reader.read_str()?,
        signature: reader.read_str()?,
    };
    reader.finish()?;
    if payload.transfer_id.is_empty() {
        return Err(TopicDecodeError::EmptyTransferId);
    }
    Ok(payload)
}

fn decode_nft_payload(bytes: &[u8]) -> Result<NftSignaturePayload, TopicDecodeError> {
    let mut reader = ByteReader::new(bytes);
    let payload = NftSignaturePayload {
        source_chain_id: reader.read_u64()?,
        target_chain_id: reader.read_u64()?,
        transfer_id: reader.read_str()?,
        asset: reader.read_str()?,
        serial_number: reader.read_u64()?,
        metadata: reader.read_str()?,
        recipient: reader.read_str()?,
        signature: reader.read_str()?,
    };
    reader.finish()?;
    if payload.transfer_id.is_empty() {
        return Err(TopicDecodeError::EmptyTransferId);
    }
    Ok(payload)
}

fn put_str(bytes: &mut Vec<u8>, s: &str) {
    // Unwrap-free: topic fields are short strings, far below u16::MAX
    let len = s.len().min(u16::MAX as usize) as u16;
    bytes.extend_from_slice(&len.to_be_bytes());
    bytes.extend_from_slice(&s.as_bytes()[..len as usize]);
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TopicDecodeError> {
        if self.pos + n > self.bytes.len() {
            return Err(TopicDecodeError::Truncated);
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_u64(&mut self) -> Result<u64, TopicDecodeError> {
        let raw = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_str(&mut self) -> Result<String, TopicDecodeError> {
        let raw = self.take(2)?;
        let len = u16::from_be_bytes([raw[0], raw[1]]) as usize;
        let data = self.take(len)?;
        String::from_utf8(data.to_vec()).map_err(|_| TopicDecodeError::InvalidUtf8)
    }

    fn finish(&self) -> Result<(), TopicDecodeError> {
        if self.pos != self.bytes.len() {
            return Err(TopicDecodeError::TrailingBytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fungible() -> FungibleSignaturePayload {
        FungibleSignaturePayload {
            source_chain_id: 0,
            target_chain_id: 80001,
            transfer_id: "0.0.123-111-222".to_string(),
            asset: "0x0000000000000000000000000000000000000001".to_string(),
            recipient: "0x0000000000000000000000000000000000000002".to_string(),
            amount: "985".to_string(),
            signature: "ab".repeat(65),
        }
    }

    fn nft() -> NftSignaturePayload {
        NftSignaturePayload {
            source_chain_id: 0,
            target_chain_id: 1,
            transfer_id: "0.0.123-333-444".to_string(),
            asset: "0x0000000000000000000000000000000000000003".to_string(),
            serial_number: 7,
            metadata: "ipfs://bafy".to_string(),
            recipient: "0x0000000000000000000000000000000000000004".to_string(),
            signature: "cd".repeat(65),
        }
    }

    #[test]
    fn test_fungible_roundtrip() {
        let msg = TopicMessage::Fungible(fungible());
        let decoded = TopicMessage::from_bytes(&msg.to_bytes()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_nft_roundtrip() {
        let msg = TopicMessage::Nft(nft());
        let decoded = TopicMessage::from_bytes(&msg.to_bytes()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_legacy_untagged_fungible_accepted() {
        // Peers on the old format publish the bare payload with no header.
        let legacy = fungible().as_payload_bytes();
        let decoded = TopicMessage::from_bytes(&legacy).unwrap();
        assert_eq!(decoded, TopicMessage::Fungible(fungible()));
    }

    #[test]
    fn test_tagged_wins_over_legacy() {
        // A tagged message must decode as tagged, not fall through.
        let msg = TopicMessage::Nft(nft());
        let decoded = TopicMessage::from_bytes(&msg.to_bytes()).unwrap();
        assert!(matches!(decoded, TopicMessage::Nft(_)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(TopicMessage::from_bytes(&[]).is_err());
        assert!(TopicMessage::from_bytes(&[0xff; 3]).is_err());
        let mut truncated = TopicMessage::Fungible(fungible()).to_bytes();
        truncated.truncate(truncated.len() - 4);
        assert!(TopicMessage::from_bytes(&truncated).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = TopicMessage::Fungible(fungible()).to_bytes();
        bytes.push(0);
        assert!(TopicMessage::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = TopicMessage::Fungible(fungible()).to_bytes();
        bytes[1] = 9;
        // Version 9 is not a legacy payload either; both attempts fail.
        assert!(TopicMessage::from_bytes(&bytes).is_err());
    }
}
