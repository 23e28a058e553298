// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Base identifier types shared by every bridge component.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),
    #[error("invalid transaction id: {0}")]
    InvalidTransactionId(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// A Hedera entity identifier, `{shard}.{realm}.{num}`.
///
/// Used for accounts, topics, tokens and schedules alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl EntityId {
    pub fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl FromStr for EntityId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (shard, realm, num) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) => (a, b, c),
            _ => return Err(ParseError::InvalidEntityId(s.to_string())),
        };
        let parse = |p: &str| {
            p.parse::<u64>()
                .map_err(|_| ParseError::InvalidEntityId(s.to_string()))
        };
        Ok(Self {
            shard: parse(shard)?,
            realm: parse(realm)?,
            num: parse(num)?,
        })
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

/// A Hedera transaction identifier in mirror-node form:
/// `{payer}-{validStartSeconds}-{validStartNanos}`.
///
/// Transfer records use this string as their natural key. Transfers that
/// originate on an EVM chain use `{txHash}-{logIndex}` instead; those are
/// validated with [`is_valid_transfer_id`] rather than parsed into this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HederaTransactionId {
    pub payer: EntityId,
    pub valid_start_seconds: i64,
    pub valid_start_nanos: i32,
}

impl FromStr for HederaTransactionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        let (payer, seconds, nanos) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(a), Some(b), Some(c), None) => (a, b, c),
            _ => return Err(ParseError::InvalidTransactionId(s.to_string())),
        };
        let payer = EntityId::from_str(payer)
            .map_err(|_| ParseError::InvalidTransactionId(s.to_string()))?;
        let valid_start_seconds = seconds
            .parse::<i64>()
            .map_err(|_| ParseError::InvalidTransactionId(s.to_string()))?;
        let valid_start_nanos = nanos
            .parse::<i32>()
            .map_err(|_| ParseError::InvalidTransactionId(s.to_string()))?;
        Ok(Self {
            payer,
            valid_start_seconds,
            valid_start_nanos,
        })
    }
}

impl Display for HederaTransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.payer, self.valid_start_seconds, self.valid_start_nanos
        )
    }
}

/// Returns true if `id` is a well-formed transfer identifier: either a Hedera
/// transaction id or an EVM `{0x<64 hex>}-{logIndex}` pair.
pub fn is_valid_transfer_id(id: &str) -> bool {
    if HederaTransactionId::from_str(id).is_ok() {
        return true;
    }
    match id.rsplit_once('-') {
        Some((hash, log_index)) => {
            hash.len() == 66
                && hash.starts_with("0x")
                && hash[2..].chars().all(|c| c.is_ascii_hexdigit())
                && log_index.parse::<u64>().is_ok()
        }
        None => false,
    }
}

/// A consensus timestamp, nanoseconds since the epoch.
///
/// The mirror node renders these as `{seconds}.{nanos:09}` strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }
}

impl FromStr for Timestamp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (seconds, nanos) = match s.split_once('.') {
            Some((sec, nan)) => {
                let sec = sec
                    .parse::<i64>()
                    .map_err(|_| ParseError::InvalidTimestamp(s.to_string()))?;
                if nanos_len_invalid(nan) {
                    return Err(ParseError::InvalidTimestamp(s.to_string()));
                }
                let nan = nan
                    .parse::<i64>()
                    .map_err(|_| ParseError::InvalidTimestamp(s.to_string()))?;
                (sec, nan)
            }
            None => (
                s.parse::<i64>()
                    .map_err(|_| ParseError::InvalidTimestamp(s.to_string()))?,
                0,
            ),
        };
        Ok(Self(seconds * 1_000_000_000 + nanos))
    }
}

fn nanos_len_invalid(nanos: &str) -> bool {
    nanos.is_empty() || nanos.len() > 9
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}
