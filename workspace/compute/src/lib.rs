//! Business core of the ledger: balance maintenance, budget aggregation and
//! transaction statistics on top of the `model` entities.

pub mod balance;
pub mod budget;
pub mod error;
pub mod ledger;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use budget::{BudgetCalculator, BudgetFilter, BudgetPeriods, BudgetReport, BudgetStatus, BudgetSummary};
pub use error::{ComputeError, Result};
pub use ledger::{EntryDraft, EntryPatch};
pub use stats::{StatsPeriod, StatsWindow, TransactionStats};
