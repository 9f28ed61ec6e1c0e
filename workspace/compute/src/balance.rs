//! Balance effects of ledger rows and the account adjustments they imply.
//!
//! Every write path in [`crate::ledger`] turns its change into a list of
//! [`BalanceAdjustment`]s with the planners below, then applies them inside
//! the same database transaction as the ledger write.

use model::entities::transaction::{self, TransactionType};
use rust_decimal::Decimal;

/// Signed contribution of a transaction to its account balance.
pub fn balance_effect(kind: TransactionType, amount: Decimal) -> Decimal {
    match kind {
        TransactionType::Income => amount,
        TransactionType::Expense => -amount,
    }
}

/// The balance-relevant part of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub account_id: i32,
    pub kind: TransactionType,
    pub amount: Decimal,
}

impl Posting {
    pub fn effect(&self) -> Decimal {
        balance_effect(self.kind, self.amount)
    }
}

impl From<&transaction::Model> for Posting {
    fn from(model: &transaction::Model) -> Self {
        Self {
            account_id: model.account_id,
            kind: model.kind,
            amount: model.amount,
        }
    }
}

/// A signed change to apply to one account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceAdjustment {
    pub account_id: i32,
    pub delta: Decimal,
}

pub fn plan_create(new: &Posting) -> Vec<BalanceAdjustment> {
    vec![BalanceAdjustment {
        account_id: new.account_id,
        delta: new.effect(),
    }]
}

pub fn plan_delete(old: &Posting) -> Vec<BalanceAdjustment> {
    vec![BalanceAdjustment {
        account_id: old.account_id,
        delta: -old.effect(),
    }]
}

/// Revert `old` and apply `new`.
///
/// When both postings hit the same account the two steps collapse into one
/// net adjustment, and an unchanged posting yields no adjustment at all. When
/// the account changes, the old account is reverted first and each account is
/// touched exactly once.
pub fn plan_update(old: &Posting, new: &Posting) -> Vec<BalanceAdjustment> {
    if old.account_id == new.account_id {
        let delta = new.effect() - old.effect();
        if delta.is_zero() {
            return Vec::new();
        }
        return vec![BalanceAdjustment {
            account_id: new.account_id,
            delta,
        }];
    }

    let mut adjustments = plan_delete(old);
    adjustments.extend(plan_create(new));
    adjustments
}
