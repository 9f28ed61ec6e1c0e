//! Budget spending, status and period aggregation.
//!
//! All read paths share one date rule. A budget's spending window is
//! `[start_date, min(end_date, today)]`. A caller-supplied month or year
//! filter selects budgets whose window overlaps it (see
//! [`DateRange::overlaps`]) and further clips the spending window to the
//! filter. The list, single and summary views all use [`BudgetCalculator::report`],
//! so they cannot disagree.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, Utc};
use common::{DateRange, YearMonth};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, Iterable, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ComputeError, Result};
use model::entities::{
    budget::{self, BudgetPeriod},
    category,
    transaction::{self, TransactionType},
};

/// Where today falls relative to a budget window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Future,
    Active,
    Expired,
}

/// Optional narrowing of the budget views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BudgetFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub period: Option<BudgetPeriod>,
}

impl BudgetFilter {
    /// Calendar window selected by `year` and `month`, if any.
    pub fn window(&self) -> Result<Option<DateRange>> {
        match (self.year, self.month) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(ComputeError::Date("month filter requires a year".to_string())),
            (Some(year), Some(month)) => DateRange::month(year, month)
                .map(Some)
                .ok_or_else(|| ComputeError::Date(format!("invalid month {year}-{month}"))),
            (Some(year), None) => DateRange::year(year)
                .map(Some)
                .ok_or_else(|| ComputeError::Date(format!("invalid year {year}"))),
        }
    }

    fn matches(&self, budget: &budget::Model, window: Option<&DateRange>) -> bool {
        let period_ok = self.period.is_none_or(|period| budget.period == period);
        let window_ok = window.is_none_or(|w| w.overlaps(budget.start_date, budget.end_date));
        period_ok && window_ok
    }
}

/// A budget together with its computed spending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetReport {
    pub budget: budget::Model,
    pub category_name: String,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BudgetSummary {
    pub total_budgeted: Decimal,
    pub total_spent: Decimal,
    pub total_remaining: Decimal,
    pub budget_count: usize,
}

/// Values available for populating budget filters, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BudgetPeriods {
    pub months: Vec<YearMonth>,
    pub years: Vec<i32>,
    pub periods: Vec<BudgetPeriod>,
}

/// Computes budget views relative to a fixed "today".
#[derive(Debug, Clone, Copy)]
pub struct BudgetCalculator {
    today: NaiveDate,
}

impl Default for BudgetCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetCalculator {
    pub fn new() -> Self {
        Self::new_with_today(Utc::now().date_naive())
    }

    pub fn new_with_today(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn status(&self, budget: &budget::Model) -> BudgetStatus {
        if self.today < budget.start_date {
            BudgetStatus::Future
        } else if budget.end_date.is_some_and(|end| self.today > end) {
            BudgetStatus::Expired
        } else {
            BudgetStatus::Active
        }
    }

    /// `[start_date, min(end_date, today)]` clipped to `filter`.
    /// `None` when nothing of the window has elapsed.
    pub fn spending_window(&self, budget: &budget::Model, filter: Option<&DateRange>) -> Option<DateRange> {
        let end = budget.end_date.map_or(self.today, |end| end.min(self.today));
        let window = DateRange::new(budget.start_date, end)?;
        match filter {
            Some(filter) => window.intersect(filter),
            None => Some(window),
        }
    }

    /// Sum of expense entries in the budget's category and spending window.
    pub fn spent(
        &self,
        budget: &budget::Model,
        expenses: &[transaction::Model],
        filter: Option<&DateRange>,
    ) -> Decimal {
        let Some(window) = self.spending_window(budget, filter) else {
            return Decimal::ZERO;
        };
        expenses
            .iter()
            .filter(|entry| entry.kind == TransactionType::Expense)
            .filter(|entry| entry.category_id == budget.category_id)
            .filter(|entry| window.contains(entry.date))
            .map(|entry| entry.amount)
            .sum()
    }

    pub fn report(
        &self,
        budget: budget::Model,
        category_name: String,
        expenses: &[transaction::Model],
        filter: Option<&DateRange>,
    ) -> BudgetReport {
        let spent = self.spent(&budget, expenses, filter);
        BudgetReport {
            remaining: budget.amount - spent,
            status: self.status(&budget),
            spent,
            category_name,
            budget,
        }
    }

    async fn load_reports<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
        budgets: Vec<budget::Model>,
        filter: Option<&DateRange>,
    ) -> Result<Vec<BudgetReport>> {
        if budgets.is_empty() {
            return Ok(Vec::new());
        }

        let category_ids: BTreeSet<i32> = budgets.iter().map(|b| b.category_id).collect();
        let names: HashMap<i32, String> = category::Entity::find()
            .filter(category::Column::UserId.eq(user_id))
            .filter(category::Column::Id.is_in(category_ids.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let expenses = transaction::Entity::find()
            .filter(transaction::Column::UserId.eq(user_id))
            .filter(transaction::Column::Kind.eq(TransactionType::Expense))
            .filter(transaction::Column::CategoryId.is_in(category_ids.iter().copied()))
            .filter(transaction::Column::Date.lte(self.today))
            .all(db)
            .await?;
        debug!(
            budgets = budgets.len(),
            expenses = expenses.len(),
            "Computing budget spending"
        );

        Ok(budgets
            .into_iter()
            .map(|budget| {
                let name = names.get(&budget.category_id).cloned().unwrap_or_default();
                self.report(budget, name, &expenses, filter)
            })
            .collect())
    }

    /// Budgets matching `filter`, newest window first.
    #[instrument(skip(self, db))]
    pub async fn reports<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
        filter: &BudgetFilter,
    ) -> Result<Vec<BudgetReport>> {
        let window = filter.window()?;
        let budgets: Vec<budget::Model> = budget::Entity::find()
            .filter(budget::Column::UserId.eq(user_id))
            .order_by_desc(budget::Column::StartDate)
            .order_by_desc(budget::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .filter(|b| filter.matches(b, window.as_ref()))
            .collect();

        self.load_reports(db, user_id, budgets, window.as_ref()).await
    }

    #[instrument(skip(self, db))]
    pub async fn report_for<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
        budget_id: i32,
    ) -> Result<BudgetReport> {
        let budget = budget::Entity::find_by_id(budget_id)
            .filter(budget::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| ComputeError::NotFound("Budget not found".to_string()))?;

        self.load_reports(db, user_id, vec![budget], None)
            .await?
            .pop()
            .ok_or_else(|| ComputeError::NotFound("Budget not found".to_string()))
    }

    /// Totals over the same budgets and windows that [`Self::reports`] returns.
    #[instrument(skip(self, db))]
    pub async fn summary<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
        filter: &BudgetFilter,
    ) -> Result<BudgetSummary> {
        let reports = self.reports(db, user_id, filter).await?;
        Ok(summarize(&reports))
    }

    /// Months and years that have budgets or expense entries, plus the budget
    /// periods in use.
    #[instrument(skip(self, db))]
    pub async fn periods<C: ConnectionTrait>(&self, db: &C, user_id: i32) -> Result<BudgetPeriods> {
        let budgets = budget::Entity::find()
            .filter(budget::Column::UserId.eq(user_id))
            .all(db)
            .await?;

        let expense_dates: Vec<NaiveDate> = transaction::Entity::find()
            .select_only()
            .column(transaction::Column::Date)
            .distinct()
            .filter(transaction::Column::UserId.eq(user_id))
            .filter(transaction::Column::Kind.eq(TransactionType::Expense))
            .into_tuple()
            .all(db)
            .await?;

        let mut months: BTreeSet<YearMonth> = expense_dates.into_iter().map(YearMonth::from_date).collect();
        for budget in &budgets {
            let end = budget.end_date.unwrap_or(self.today).max(budget.start_date);
            if let Some(window) = DateRange::new(budget.start_date, end) {
                months.extend(window.months());
            }
        }

        let years: BTreeSet<i32> = months.iter().map(|m| m.year).collect();
        let periods = BudgetPeriod::iter()
            .filter(|period| budgets.iter().any(|b| b.period == *period))
            .collect();

        Ok(BudgetPeriods {
            months: months.into_iter().rev().collect(),
            years: years.into_iter().rev().collect(),
            periods,
        })
    }
}

pub fn summarize(reports: &[BudgetReport]) -> BudgetSummary {
    let total_budgeted: Decimal = reports.iter().map(|r| r.budget.amount).sum();
    let total_spent: Decimal = reports.iter().map(|r| r.spent).sum();
    BudgetSummary {
        total_budgeted,
        total_spent,
        total_remaining: total_budgeted - total_spent,
        budget_count: reports.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn budget_model(start: NaiveDate, end: Option<NaiveDate>) -> budget::Model {
        budget::Model {
            id: 1,
            user_id: 1,
            category_id: 7,
            amount: Decimal::new(1000, 0),
            period: BudgetPeriod::Monthly,
            start_date: start,
            end_date: end,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn expense(category_id: i32, amount: i64, on: NaiveDate) -> transaction::Model {
        transaction::Model {
            id: 0,
            user_id: 1,
            account_id: 1,
            category_id,
            amount: Decimal::new(amount, 0),
            description: None,
            kind: TransactionType::Expense,
            date: on,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_follows_today() {
        let budget = budget_model(date(2024, 1, 1), Some(date(2024, 1, 31)));
        assert_eq!(
            BudgetCalculator::new_with_today(date(2023, 12, 31)).status(&budget),
            BudgetStatus::Future
        );
        assert_eq!(
            BudgetCalculator::new_with_today(date(2024, 1, 31)).status(&budget),
            BudgetStatus::Active
        );
        assert_eq!(
            BudgetCalculator::new_with_today(date(2024, 2, 1)).status(&budget),
            BudgetStatus::Expired
        );

        let open = budget_model(date(2024, 1, 1), None);
        assert_eq!(
            BudgetCalculator::new_with_today(date(2030, 1, 1)).status(&open),
            BudgetStatus::Active
        );
    }

    #[test]
    fn test_spent_counts_only_the_window() {
        let calc = BudgetCalculator::new_with_today(date(2024, 6, 1));
        let budget = budget_model(date(2024, 1, 1), Some(date(2024, 1, 31)));
        let entries = vec![
            expense(7, 100, date(2024, 1, 1)),
            expense(7, 40, date(2024, 1, 31)),
            expense(7, 999, date(2024, 2, 1)),
            expense(7, 999, date(2023, 12, 31)),
            expense(8, 999, date(2024, 1, 15)),
        ];
        assert_eq!(calc.spent(&budget, &entries, None), Decimal::new(140, 0));
    }

    #[test]
    fn test_spent_stops_at_today() {
        let calc = BudgetCalculator::new_with_today(date(2024, 1, 15));
        let budget = budget_model(date(2024, 1, 1), Some(date(2024, 1, 31)));
        let entries = vec![expense(7, 10, date(2024, 1, 15)), expense(7, 20, date(2024, 1, 16))];
        assert_eq!(calc.spent(&budget, &entries, None), Decimal::new(10, 0));
    }

    #[test]
    fn test_future_budget_has_no_spending() {
        let calc = BudgetCalculator::new_with_today(date(2023, 12, 1));
        let budget = budget_model(date(2024, 1, 1), Some(date(2024, 1, 31)));
        assert_eq!(calc.spending_window(&budget, None), None);
        assert_eq!(calc.spent(&budget, &[expense(7, 10, date(2024, 1, 2))], None), Decimal::ZERO);
    }

    #[test]
    fn test_filter_clips_spending_window() {
        let calc = BudgetCalculator::new_with_today(date(2025, 1, 1));
        let yearly = budget_model(date(2024, 1, 1), Some(date(2024, 12, 31)));
        let march = DateRange::month(2024, 3).unwrap();
        let entries = vec![expense(7, 5, date(2024, 2, 29)), expense(7, 7, date(2024, 3, 31))];
        assert_eq!(calc.spent(&yearly, &entries, Some(&march)), Decimal::new(7, 0));
        assert_eq!(calc.spent(&yearly, &entries, None), Decimal::new(12, 0));
    }

    #[test]
    fn test_filter_window_requires_year_for_month() {
        let filter = BudgetFilter {
            month: Some(3),
            ..Default::default()
        };
        assert!(filter.window().is_err());

        let filter = BudgetFilter {
            year: Some(2024),
            month: Some(2),
            period: None,
        };
        assert_eq!(filter.window().unwrap(), DateRange::month(2024, 2));
    }

    #[tokio::test]
    async fn test_reports_and_summary_agree() {
        let db = setup_db().await;
        let user = new_user(&db).await.unwrap();
        let account = new_account(&db, user.id, 0).await.unwrap();
        let shopping = new_category(&db, user.id, "Shopping", TransactionType::Expense)
            .await
            .unwrap();
        let salary = new_category(&db, user.id, "Salary", TransactionType::Income)
            .await
            .unwrap();

        new_budget(
            &db,
            &shopping,
            1000,
            BudgetPeriod::Monthly,
            date(2024, 1, 1),
            Some(date(2024, 1, 31)),
        )
        .await
        .unwrap();
        for (amount, on) in [(200, date(2024, 1, 5)), (300, date(2024, 1, 20)), (50, date(2024, 2, 1))] {
            new_raw_transaction(&db, &account, &shopping, TransactionType::Expense, amount, on)
                .await
                .unwrap();
        }
        new_raw_transaction(&db, &account, &salary, TransactionType::Income, 5000, date(2024, 1, 10))
            .await
            .unwrap();

        let calc = BudgetCalculator::new_with_today(date(2024, 6, 1));
        let reports = calc.reports(&db, user.id, &BudgetFilter::default()).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].category_name, "Shopping");
        assert_eq!(reports[0].spent, Decimal::new(500, 0));
        assert_eq!(reports[0].status, BudgetStatus::Expired);

        let january = BudgetFilter {
            year: Some(2024),
            month: Some(1),
            period: None,
        };
        let summary = calc.summary(&db, user.id, &january).await.unwrap();
        assert_eq!(summary.total_budgeted, Decimal::new(1000, 0));
        assert_eq!(summary.total_spent, Decimal::new(500, 0));
        assert_eq!(summary.total_remaining, Decimal::new(500, 0));

        let february = BudgetFilter {
            year: Some(2024),
            month: Some(2),
            period: None,
        };
        assert!(calc.reports(&db, user.id, &february).await.unwrap().is_empty());
        assert_eq!(calc.summary(&db, user.id, &february).await.unwrap().budget_count, 0);

        let weekly_only = BudgetFilter {
            period: Some(BudgetPeriod::Weekly),
            ..Default::default()
        };
        assert!(calc.reports(&db, user.id, &weekly_only).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_ended_budget_matches_later_months() {
        let db = setup_db().await;
        let user = new_user(&db).await.unwrap();
        let food = new_category(&db, user.id, "Food", TransactionType::Expense).await.unwrap();
        new_budget(&db, &food, 300, BudgetPeriod::Monthly, date(2024, 1, 1), None)
            .await
            .unwrap();

        let calc = BudgetCalculator::new_with_today(date(2024, 6, 15));
        let may = BudgetFilter {
            year: Some(2024),
            month: Some(5),
            period: None,
        };
        assert_eq!(calc.reports(&db, user.id, &may).await.unwrap().len(), 1);
        let earlier = BudgetFilter {
            year: Some(2023),
            month: Some(12),
            period: None,
        };
        assert!(calc.reports(&db, user.id, &earlier).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_for_is_owner_scoped() {
        let db = setup_db().await;
        let owner = new_user(&db).await.unwrap();
        let stranger = new_user(&db).await.unwrap();
        let food = new_category(&db, owner.id, "Food", TransactionType::Expense).await.unwrap();
        let budget = new_budget(&db, &food, 300, BudgetPeriod::Monthly, date(2024, 1, 1), None)
            .await
            .unwrap();

        let calc = BudgetCalculator::new_with_today(date(2024, 1, 2));
        assert!(calc.report_for(&db, owner.id, budget.id).await.is_ok());
        assert!(matches!(
            calc.report_for(&db, stranger.id, budget.id).await,
            Err(ComputeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_periods_collects_budget_and_expense_months() {
        let db = setup_db().await;
        let user = new_user(&db).await.unwrap();
        let account = new_account(&db, user.id, 0).await.unwrap();
        let food = new_category(&db, user.id, "Food", TransactionType::Expense).await.unwrap();
        new_budget(
            &db,
            &food,
            300,
            BudgetPeriod::Quarterly,
            date(2024, 1, 1),
            Some(date(2024, 2, 29)),
        )
        .await
        .unwrap();
        new_raw_transaction(&db, &account, &food, TransactionType::Expense, 5, date(2023, 11, 3))
            .await
            .unwrap();

        let calc = BudgetCalculator::new_with_today(date(2024, 6, 1));
        let periods = calc.periods(&db, user.id).await.unwrap();
        let months: Vec<_> = periods.months.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(months, vec![(2024, 2), (2024, 1), (2023, 11)]);
        assert_eq!(periods.years, vec![2024, 2023]);
        assert_eq!(periods.periods, vec![BudgetPeriod::Quarterly]);
    }
}
