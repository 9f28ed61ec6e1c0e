//! Ledger writes that keep account balances consistent.
//!
//! Each public write runs in its own database transaction: ownership checks
//! first, then the balance adjustments, then the ledger row itself. Any error
//! drops the transaction and rolls every write back. Concurrent writers to the
//! same account are not serialized beyond what the database provides, so the
//! last balance write wins.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, trace};

use crate::balance::{BalanceAdjustment, Posting, plan_create, plan_delete, plan_update};
use crate::error::{ComputeError, Result};
use model::entities::{
    account, category,
    transaction::{self, TransactionType},
};

/// Fields of a ledger row as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub account_id: i32,
    pub category_id: i32,
    pub amount: Decimal,
    pub description: Option<String>,
    pub kind: TransactionType,
    pub date: NaiveDate,
}

impl EntryDraft {
    fn posting(&self) -> Posting {
        Posting {
            account_id: self.account_id,
            kind: self.kind,
            amount: self.amount,
        }
    }
}

/// Partial update of a ledger row. `None` keeps the stored value;
/// `description: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub account_id: Option<i32>,
    pub category_id: Option<i32>,
    pub amount: Option<Decimal>,
    pub description: Option<Option<String>>,
    pub kind: Option<TransactionType>,
    pub date: Option<NaiveDate>,
}

impl EntryPatch {
    pub fn apply_to(self, existing: &transaction::Model) -> EntryDraft {
        EntryDraft {
            account_id: self.account_id.unwrap_or(existing.account_id),
            category_id: self.category_id.unwrap_or(existing.category_id),
            amount: self.amount.unwrap_or(existing.amount),
            description: self.description.unwrap_or_else(|| existing.description.clone()),
            kind: self.kind.unwrap_or(existing.kind),
            date: self.date.unwrap_or(existing.date),
        }
    }
}

pub async fn find_owned_account<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    account_id: i32,
) -> Result<Option<account::Model>> {
    Ok(account::Entity::find_by_id(account_id)
        .filter(account::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

pub async fn find_owned_category<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    category_id: i32,
) -> Result<Option<category::Model>> {
    Ok(category::Entity::find_by_id(category_id)
        .filter(category::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

pub async fn find_owned_entry<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    entry_id: i32,
) -> Result<Option<transaction::Model>> {
    Ok(transaction::Entity::find_by_id(entry_id)
        .filter(transaction::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn ensure_references<C: ConnectionTrait>(conn: &C, user_id: i32, draft: &EntryDraft) -> Result<()> {
    if find_owned_category(conn, user_id, draft.category_id).await?.is_none() {
        return Err(ComputeError::InvalidReference("Invalid category".to_string()));
    }
    if find_owned_account(conn, user_id, draft.account_id).await?.is_none() {
        return Err(ComputeError::InvalidReference("Invalid account".to_string()));
    }
    Ok(())
}

async fn apply_adjustments<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    adjustments: &[BalanceAdjustment],
) -> Result<()> {
    for adjustment in adjustments {
        let account = find_owned_account(conn, user_id, adjustment.account_id)
            .await?
            .ok_or_else(|| ComputeError::InvalidReference("Invalid account".to_string()))?;

        let balance = account.balance + adjustment.delta;
        trace!(
            account_id = account.id,
            from = %account.balance,
            to = %balance,
            "Adjusting account balance"
        );

        let mut active: account::ActiveModel = account.into();
        active.balance = Set(balance);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;
    }
    Ok(())
}

/// Insert a ledger row and apply its balance effect.
#[instrument(skip(db))]
pub async fn create_entry(db: &DatabaseConnection, user_id: i32, draft: EntryDraft) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    ensure_references(&txn, user_id, &draft).await?;
    apply_adjustments(&txn, user_id, &plan_create(&draft.posting())).await?;

    let now = Utc::now();
    let entry = transaction::ActiveModel {
        user_id: Set(user_id),
        account_id: Set(draft.account_id),
        category_id: Set(draft.category_id),
        amount: Set(draft.amount),
        description: Set(draft.description),
        kind: Set(draft.kind),
        date: Set(draft.date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(entry_id = entry.id, account_id = entry.account_id, "Ledger entry created");
    Ok(entry)
}

/// Revert the stored balance effect, apply the new one and rewrite the row.
#[instrument(skip(db))]
pub async fn update_entry(
    db: &DatabaseConnection,
    user_id: i32,
    entry_id: i32,
    patch: EntryPatch,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    let existing = find_owned_entry(&txn, user_id, entry_id)
        .await?
        .ok_or_else(|| ComputeError::NotFound("Transaction not found".to_string()))?;
    let draft = patch.apply_to(&existing);
    ensure_references(&txn, user_id, &draft).await?;

    let adjustments = plan_update(&Posting::from(&existing), &draft.posting());
    debug!(?adjustments, "Planned balance adjustments for update");
    apply_adjustments(&txn, user_id, &adjustments).await?;

    let mut active: transaction::ActiveModel = existing.into();
    active.account_id = Set(draft.account_id);
    active.category_id = Set(draft.category_id);
    active.amount = Set(draft.amount);
    active.description = Set(draft.description);
    active.kind = Set(draft.kind);
    active.date = Set(draft.date);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(entry_id = updated.id, "Ledger entry updated");
    Ok(updated)
}

/// Revert the balance effect and remove the row.
#[instrument(skip(db))]
pub async fn delete_entry(db: &DatabaseConnection, user_id: i32, entry_id: i32) -> Result<()> {
    let txn = db.begin().await?;

    let existing = find_owned_entry(&txn, user_id, entry_id)
        .await?
        .ok_or_else(|| ComputeError::NotFound("Transaction not found".to_string()))?;
    apply_adjustments(&txn, user_id, &plan_delete(&Posting::from(&existing))).await?;
    existing.delete(&txn).await?;

    txn.commit().await?;
    info!(entry_id, "Ledger entry deleted");
    Ok(())
}

/// Delete an account that no transaction references.
#[instrument(skip(db))]
pub async fn delete_account(db: &DatabaseConnection, user_id: i32, account_id: i32) -> Result<()> {
    let txn = db.begin().await?;

    let account = find_owned_account(&txn, user_id, account_id)
        .await?
        .ok_or_else(|| ComputeError::NotFound("Account not found".to_string()))?;
    let references = transaction::Entity::find()
        .filter(transaction::Column::AccountId.eq(account.id))
        .count(&txn)
        .await?;
    if references > 0 {
        debug!(account_id, references, "Refusing to delete referenced account");
        return Err(ComputeError::Conflict(
            "Cannot delete account with existing transactions".to_string(),
        ));
    }
    account.delete(&txn).await?;

    txn.commit().await?;
    Ok(())
}

/// Delete a category that no transaction references. Its budgets go with it.
#[instrument(skip(db))]
pub async fn delete_category(db: &DatabaseConnection, user_id: i32, category_id: i32) -> Result<()> {
    let txn = db.begin().await?;

    let category = find_owned_category(&txn, user_id, category_id)
        .await?
        .ok_or_else(|| ComputeError::NotFound("Category not found".to_string()))?;
    let references = transaction::Entity::find()
        .filter(transaction::Column::CategoryId.eq(category.id))
        .count(&txn)
        .await?;
    if references > 0 {
        debug!(category_id, references, "Refusing to delete referenced category");
        return Err(ComputeError::Conflict(
            "Cannot delete category with existing transactions".to_string(),
        ));
    }
    category.delete(&txn).await?;

    txn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn draft(account: &account::Model, category: &category::Model, kind: TransactionType, amount: i64) -> EntryDraft {
        EntryDraft {
            account_id: account.id,
            category_id: category.id,
            amount: Decimal::new(amount, 0),
            description: None,
            kind,
            date: date(2024, 1, 10),
        }
    }

    #[tokio::test]
    async fn test_create_update_delete_keeps_balance() {
        let db = setup_db().await;
        let user = new_user(&db).await.unwrap();
        let checking = new_account(&db, user.id, 0).await.unwrap();
        let food = new_category(&db, user.id, "Food", TransactionType::Expense).await.unwrap();

        let entry = create_entry(&db, user.id, draft(&checking, &food, TransactionType::Expense, 50))
            .await
            .unwrap();
        assert_eq!(balance_of(&db, checking.id).await, Decimal::new(-50, 0));

        let patch = EntryPatch {
            amount: Some(Decimal::new(30, 0)),
            ..Default::default()
        };
        update_entry(&db, user.id, entry.id, patch).await.unwrap();
        assert_eq!(balance_of(&db, checking.id).await, Decimal::new(-30, 0));

        delete_entry(&db, user.id, entry.id).await.unwrap();
        assert_eq!(balance_of(&db, checking.id).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_patch_clears_or_keeps_description() {
        let db = setup_db().await;
        let user = new_user(&db).await.unwrap();
        let checking = new_account(&db, user.id, 0).await.unwrap();
        let food = new_category(&db, user.id, "Food", TransactionType::Expense).await.unwrap();
        let mut lunch = draft(&checking, &food, TransactionType::Expense, 12);
        lunch.description = Some("lunch".to_string());
        let entry = create_entry(&db, user.id, lunch).await.unwrap();

        let kept = update_entry(&db, user.id, entry.id, EntryPatch::default()).await.unwrap();
        assert_eq!(kept.description.as_deref(), Some("lunch"));

        let clear = EntryPatch {
            description: Some(None),
            ..Default::default()
        };
        let cleared = update_entry(&db, user.id, entry.id, clear).await.unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(balance_of(&db, checking.id).await, Decimal::new(-12, 0));
    }

    #[tokio::test]
    async fn test_moving_entry_between_accounts() {
        let db = setup_db().await;
        let user = new_user(&db).await.unwrap();
        let first = new_account(&db, user.id, 100).await.unwrap();
        let second = new_account(&db, user.id, 10).await.unwrap();
        let salary = new_category(&db, user.id, "Salary", TransactionType::Income).await.unwrap();

        let entry = create_entry(&db, user.id, draft(&first, &salary, TransactionType::Income, 25))
            .await
            .unwrap();
        assert_eq!(balance_of(&db, first.id).await, Decimal::new(125, 0));

        let moved = EntryPatch {
            account_id: Some(second.id),
            ..Default::default()
        };
        update_entry(&db, user.id, entry.id, moved).await.unwrap();
        assert_eq!(balance_of(&db, first.id).await, Decimal::new(100, 0));
        assert_eq!(balance_of(&db, second.id).await, Decimal::new(35, 0));

        // And back again: no drift on either account
        let back = EntryPatch {
            account_id: Some(first.id),
            ..Default::default()
        };
        update_entry(&db, user.id, entry.id, back).await.unwrap();
        assert_eq!(balance_of(&db, first.id).await, Decimal::new(125, 0));
        assert_eq!(balance_of(&db, second.id).await, Decimal::new(10, 0));
    }

    #[tokio::test]
    async fn test_foreign_references_are_rejected_without_writes() {
        let db = setup_db().await;
        let owner = new_user(&db).await.unwrap();
        let stranger = new_user(&db).await.unwrap();
        let theirs = new_account(&db, stranger.id, 0).await.unwrap();
        let mine = new_account(&db, owner.id, 0).await.unwrap();
        let food = new_category(&db, owner.id, "Food", TransactionType::Expense).await.unwrap();

        let err = create_entry(&db, owner.id, draft(&theirs, &food, TransactionType::Expense, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::InvalidReference(_)));
        assert_eq!(balance_of(&db, theirs.id).await, Decimal::ZERO);

        let entry = create_entry(&db, owner.id, draft(&mine, &food, TransactionType::Expense, 5))
            .await
            .unwrap();
        let err = update_entry(
            &db,
            owner.id,
            entry.id,
            EntryPatch {
                account_id: Some(theirs.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ComputeError::InvalidReference(_)));
        // The failed update left both balances as they were
        assert_eq!(balance_of(&db, mine.id).await, Decimal::new(-5, 0));
        assert_eq!(balance_of(&db, theirs.id).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_entries_of_other_users_are_not_found() {
        let db = setup_db().await;
        let owner = new_user(&db).await.unwrap();
        let stranger = new_user(&db).await.unwrap();
        let account = new_account(&db, owner.id, 0).await.unwrap();
        let food = new_category(&db, owner.id, "Food", TransactionType::Expense).await.unwrap();
        let entry = create_entry(&db, owner.id, draft(&account, &food, TransactionType::Expense, 5))
            .await
            .unwrap();

        assert!(matches!(
            delete_entry(&db, stranger.id, entry.id).await,
            Err(ComputeError::NotFound(_))
        ));
        assert!(matches!(
            update_entry(&db, stranger.id, entry.id, EntryPatch::default()).await,
            Err(ComputeError::NotFound(_))
        ));
        assert_eq!(balance_of(&db, account.id).await, Decimal::new(-5, 0));
    }

    #[tokio::test]
    async fn test_referenced_account_and_category_cannot_be_deleted() {
        let db = setup_db().await;
        let user = new_user(&db).await.unwrap();
        let account = new_account(&db, user.id, 0).await.unwrap();
        let food = new_category(&db, user.id, "Food", TransactionType::Expense).await.unwrap();
        let entry = create_entry(&db, user.id, draft(&account, &food, TransactionType::Expense, 5))
            .await
            .unwrap();

        assert!(matches!(
            delete_account(&db, user.id, account.id).await,
            Err(ComputeError::Conflict(_))
        ));
        assert!(matches!(
            delete_category(&db, user.id, food.id).await,
            Err(ComputeError::Conflict(_))
        ));

        delete_entry(&db, user.id, entry.id).await.unwrap();
        delete_account(&db, user.id, account.id).await.unwrap();
        delete_category(&db, user.id, food.id).await.unwrap();
    }
}
