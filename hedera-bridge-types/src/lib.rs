// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod base_types;
pub mod entities;
pub mod memo;
pub mod topic;

pub use base_types::{EntityId, HederaTransactionId, ParseError, Timestamp};
