// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fee distribution across the member set.
//!
//! All splits are deterministic functions of (fee, member set) so every
//! validator independently produces the identical scheduled transaction.
//! Integer-division remainders are never lost: they stay with the treasury.

use crate::clients::AccountAmount;
use crate::error::{BridgeError, BridgeResult};
use hedera_bridge_types::EntityId;

#[derive(Clone, Debug)]
pub struct FeeDistributor {
    members: Vec<EntityId>,
    treasury: EntityId,
    bridge_account: EntityId,
    /// Ledger limit on entries per scheduled transfer.
    max_entries: usize,
}

impl FeeDistributor {
    pub fn new(
        members: Vec<EntityId>,
        treasury: EntityId,
        bridge_account: EntityId,
        max_entries: usize,
    ) -> Self {
        Self {
            members,
            treasury,
            bridge_account,
            max_entries,
        }
    }

    pub fn members_len(&self) -> usize {
        self.members.len()
    }

    /// Largest amount not exceeding `fee` that splits evenly across the
    /// member set.
    pub fn valid_amount(&self, fee: i64) -> i64 {
        let n = self.members.len() as i64;
        fee - fee % n
    }

    /// Splits `fee` into `(treasury, validators)`. The validators' portion
    /// divides evenly across members; the treasury absorbs the residue.
    pub fn valid_amounts(&self, fee: i64) -> (i64, i64) {
        let validators = self.valid_amount(fee);
        (fee - validators, validators)
    }

    /// Even split of `amount` across the member set; the last member absorbs
    /// any division remainder.
    pub fn calculate_member_distribution(&self, amount: i64) -> BridgeResult<Vec<AccountAmount>> {
        if amount < 0 {
            return Err(BridgeError::InvalidInput(format!(
                "cannot distribute negative amount {}",
                amount
            )));
        }
        let n = self.members.len() as i64;
        let share = amount / n;
        let remainder = amount % n;

        let mut out = Vec::with_capacity(self.members.len());
        for (i, member) in self.members.iter().enumerate() {
            let amount = if i == self.members.len() - 1 {
                share + remainder
            } else {
                share
            };
            out.push(AccountAmount {
                account: *member,
                amount,
            });
        }
        Ok(out)
    }

    /// Batches credits plus one offsetting bridge debit per group, each
    /// group at most `max_entries` entries and individually balanced.
    pub fn split_account_amounts(&self, credits: Vec<AccountAmount>) -> Vec<Vec<AccountAmount>> {
        let per_group = self.max_entries.saturating_sub(1).max(1);
        credits
            .chunks(per_group)
            .map(|chunk| {
                let mut group: Vec<AccountAmount> = chunk.to_vec();
                let debit: i64 = chunk.iter().map(|c| c.amount).sum();
                group.push(AccountAmount {
                    account: self.bridge_account,
                    amount: -debit,
                });
                group
            })
            .collect()
    }

    /// The full fee fan-out: member shares plus the treasury residue,
    /// zero-amount entries dropped, batched into balanced groups.
    pub fn fee_transfer_groups(&self, fee: i64) -> BridgeResult<Vec<Vec<AccountAmount>>> {
        if fee < 0 {
            return Err(BridgeError::InvalidInput(format!(
                "cannot distribute negative fee {}",
                fee
            )));
        }
        let (treasury_amount, validators_amount) = self.valid_amounts(fee);
        let mut credits = self.calculate_member_distribution(validators_amount)?;
        if treasury_amount > 0 {
            credits.push(AccountAmount {
                account: self.treasury,
                amount: treasury_amount,
            });
        }
        credits.retain(|c| c.amount != 0);
        Ok(self.split_account_amounts(credits))
    }
}
