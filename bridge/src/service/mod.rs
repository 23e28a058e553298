// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod messages;
pub mod quorum;
pub mod transfers;

pub use messages::MessageService;
pub use quorum::QuorumHandler;
pub use transfers::{TransferEvent, TransferService};
