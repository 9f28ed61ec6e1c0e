//! SeaORM entities for the ledger store.
//!
//! Every row below `user` carries a `user_id` so queries can be scoped to the
//! caller without joins.

pub mod account;
pub mod budget;
pub mod category;
pub mod transaction;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::account::Entity as Account;
    pub use super::budget::Entity as Budget;
    pub use super::category::Entity as Category;
    pub use super::transaction::Entity as Transaction;
    pub use super::user::Entity as User;
}

#[cfg(test)]
mod test {
    use chrono::{NaiveDate, Utc};
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait,
        ModelTrait, QueryFilter, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;
        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    async fn insert_user(db: &DatabaseConnection, username: &str) -> Result<user::Model, DbErr> {
        let now = Utc::now();
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            password_hash: Set("not-a-real-hash".to_string()),
            first_name: Set(None),
            last_name: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let now = Utc::now();

        let alice = insert_user(&db, "alice").await?;
        let bob = insert_user(&db, "bob").await?;

        let checking = account::ActiveModel {
            user_id: Set(alice.id),
            name: Set("Checking".to_string()),
            kind: Set(account::AccountType::Checking),
            balance: Set(Decimal::new(10000, 2)),
            initial_balance: Set(Decimal::new(10000, 2)),
            currency: Set("USD".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let food = category::ActiveModel {
            user_id: Set(alice.id),
            name: Set("Food".to_string()),
            kind: Set(transaction::TransactionType::Expense),
            color: Set("#FF0000".to_string()),
            icon: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let lunch = transaction::ActiveModel {
            user_id: Set(alice.id),
            account_id: Set(checking.id),
            category_id: Set(food.id),
            amount: Set(Decimal::new(1250, 2)),
            description: Set(Some("Lunch".to_string())),
            kind: Set(transaction::TransactionType::Expense),
            date: Set(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        budget::ActiveModel {
            user_id: Set(alice.id),
            category_id: Set(food.id),
            amount: Set(Decimal::new(40000, 2)),
            period: Set(budget::BudgetPeriod::Monthly),
            start_date: Set(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            end_date: Set(Some(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        // Read back through relations
        let stored = Transaction::find_by_id(lunch.id).one(&db).await?.unwrap();
        assert_eq!(stored.amount, Decimal::new(1250, 2));
        assert_eq!(stored.kind, transaction::TransactionType::Expense);

        let owner_accounts = alice.find_related(Account).all(&db).await?;
        assert_eq!(owner_accounts.len(), 1);
        assert_eq!(owner_accounts[0].kind, account::AccountType::Checking);

        let food_budgets = food.find_related(Budget).all(&db).await?;
        assert_eq!(food_budgets.len(), 1);
        assert_eq!(food_budgets[0].period, budget::BudgetPeriod::Monthly);

        let bob_categories = Category::find()
            .filter(category::Column::UserId.eq(bob.id))
            .all(&db)
            .await?;
        assert!(bob_categories.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_category_unique_per_user_name_and_type() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let now = Utc::now();
        let alice = insert_user(&db, "alice").await?;

        let salary = |kind| category::ActiveModel {
            user_id: Set(alice.id),
            name: Set("Salary".to_string()),
            kind: Set(kind),
            color: Set("#000000".to_string()),
            icon: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        salary(transaction::TransactionType::Income).insert(&db).await?;
        // Same name with the other type is a different category
        salary(transaction::TransactionType::Expense).insert(&db).await?;
        assert!(salary(transaction::TransactionType::Income).insert(&db).await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() -> Result<(), DbErr> {
        let db = setup_db().await?;
        insert_user(&db, "alice").await?;
        assert!(insert_user(&db, "alice").await.is_err());
        Ok(())
    }
}
