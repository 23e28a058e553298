// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod calculator;
pub mod distributor;

pub use calculator::{convert_decimals, FeeCalculator};
pub use distributor::FeeDistributor;
