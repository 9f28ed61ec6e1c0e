use chrono::{Days, Months, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::Result;
use model::entities::transaction::{self, TransactionType};

/// Rolling look-back used by the transaction statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Week,
    #[default]
    Month,
    Year,
    All,
}

/// Inclusive bounds, either of which may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl StatsWindow {
    /// Window reaching back from `today`. The upper end stays open so
    /// future-dated entries are counted too.
    pub fn rolling(period: StatsPeriod, today: NaiveDate) -> Self {
        let from = match period {
            StatsPeriod::Week => today.checked_sub_days(Days::new(7)),
            StatsPeriod::Month => today.checked_sub_months(Months::new(1)),
            StatsPeriod::Year => today.checked_sub_months(Months::new(12)),
            StatsPeriod::All => None,
        };
        Self { from, to: None }
    }

    pub fn custom(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
    pub transaction_count: u64,
}

impl TransactionStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a transaction::Model>) -> Self {
        let mut stats = entries.into_iter().fold(Self::default(), |mut acc, entry| {
            match entry.kind {
                TransactionType::Income => acc.total_income += entry.amount,
                TransactionType::Expense => acc.total_expenses += entry.amount,
            }
            acc.transaction_count += 1;
            acc
        });
        stats.net_income = stats.total_income - stats.total_expenses;
        stats
    }
}

/// Income, expense and net totals of a user's entries inside `window`.
#[instrument(skip(db))]
pub async fn transaction_stats<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    window: StatsWindow,
) -> Result<TransactionStats> {
    let mut query = transaction::Entity::find().filter(transaction::Column::UserId.eq(user_id));
    if let Some(from) = window.from {
        query = query.filter(transaction::Column::Date.gte(from));
    }
    if let Some(to) = window.to {
        query = query.filter(transaction::Column::Date.lte(to));
    }

    let entries = query.all(db).await?;
    debug!(count = entries.len(), "Aggregating transaction statistics");
    Ok(TransactionStats::from_entries(&entries))
}
