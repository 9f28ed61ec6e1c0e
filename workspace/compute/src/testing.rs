//! Store fixtures shared by the compute tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDate, Utc};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, DbErr, EntityTrait, Set};

use model::entities::{
    account::{self, AccountType},
    budget::{self, BudgetPeriod},
    category, transaction::{self, TransactionType},
    user,
};

pub type Result<T> = std::result::Result<T, DbErr>;

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    Migrator::up(&db, None).await.expect("Failed to run migrations");
    db
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn new_user(db: &DatabaseConnection) -> Result<user::Model> {
    static USER_ID: AtomicU64 = AtomicU64::new(0);
    let current_id = USER_ID.fetch_add(1, Ordering::SeqCst);
    let now = Utc::now();

    user::ActiveModel {
        username: Set(format!("user{current_id}")),
        email: Set(format!("user{current_id}@example.com")),
        password_hash: Set("hash".to_string()),
        first_name: Set(None),
        last_name: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_account(db: &DatabaseConnection, user_id: i32, opening: i64) -> Result<account::Model> {
    let now = Utc::now();
    account::ActiveModel {
        user_id: Set(user_id),
        name: Set("Checking".to_string()),
        kind: Set(AccountType::Checking),
        balance: Set(Decimal::new(opening, 0)),
        initial_balance: Set(Decimal::new(opening, 0)),
        currency: Set("USD".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_category(
    db: &DatabaseConnection,
    user_id: i32,
    name: &str,
    kind: TransactionType,
) -> Result<category::Model> {
    let now = Utc::now();
    category::ActiveModel {
        user_id: Set(user_id),
        name: Set(name.to_string()),
        kind: Set(kind),
        color: Set("#000000".to_string()),
        icon: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Inserts a ledger row directly, without touching any balance.
pub async fn new_raw_transaction(
    db: &DatabaseConnection,
    account: &account::Model,
    category: &category::Model,
    kind: TransactionType,
    amount: i64,
    on: NaiveDate,
) -> Result<transaction::Model> {
    let now = Utc::now();
    transaction::ActiveModel {
        user_id: Set(account.user_id),
        account_id: Set(account.id),
        category_id: Set(category.id),
        amount: Set(Decimal::new(amount, 0)),
        description: Set(None),
        kind: Set(kind),
        date: Set(on),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_budget(
    db: &DatabaseConnection,
    category: &category::Model,
    amount: i64,
    period: BudgetPeriod,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<budget::Model> {
    let now = Utc::now();
    budget::ActiveModel {
        user_id: Set(category.user_id),
        category_id: Set(category.id),
        amount: Set(Decimal::new(amount, 0)),
        period: Set(period),
        start_date: Set(start),
        end_date: Set(end),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn balance_of(db: &DatabaseConnection, account_id: i32) -> Decimal {
    account::Entity::find_by_id(account_id)
        .one(db)
        .await
        .unwrap()
        .expect("account exists")
        .balance
}
