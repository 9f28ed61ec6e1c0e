use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{ErrorResponse, FieldError, YearMonth};
use model::entities::{account::AccountType, budget::BudgetPeriod, transaction::TransactionType};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{
    Modify, OpenApi, ToSchema,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::handlers::{accounts, auth, budgets, categories, transactions, users};
use crate::rate_limit::RateLimiter;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    /// Issues and checks bearer tokens
    pub tokens: TokenService,
    /// Per-IP request counters
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Arc<AppConfig>) -> Self {
        Self {
            tokens: TokenService::new(&config.auth.jwt_secret, config.token_ttl()),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            started_at: Instant::now(),
            db,
            config,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        auth::register,
        auth::login,
        auth::verify,
        users::get_profile,
        accounts::get_accounts,
        accounts::get_account,
        accounts::create_account,
        accounts::update_account,
        accounts::delete_account,
        categories::get_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        transactions::get_transactions,
        transactions::get_transaction,
        transactions::create_transaction,
        transactions::update_transaction,
        transactions::delete_transaction,
        transactions::get_transaction_stats,
        budgets::get_budgets,
        budgets::get_budget,
        budgets::get_budget_summary,
        budgets::get_budget_periods,
        budgets::create_budget,
        budgets::update_budget,
        budgets::delete_budget,
    ),
    components(
        schemas(
            ErrorResponse,
            FieldError,
            HealthResponse,
            YearMonth,
            AccountType,
            TransactionType,
            BudgetPeriod,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::VerifyResponse,
            users::UserResponse,
            accounts::CreateAccountRequest,
            accounts::UpdateAccountRequest,
            accounts::AccountResponse,
            categories::CreateCategoryRequest,
            categories::UpdateCategoryRequest,
            categories::CategoryResponse,
            transactions::CreateTransactionRequest,
            transactions::UpdateTransactionRequest,
            transactions::TransactionResponse,
            transactions::TransactionListResponse,
            transactions::TransactionStatsResponse,
            budgets::CreateBudgetRequest,
            budgets::UpdateBudgetRequest,
            budgets::BudgetResponse,
            budgets::BudgetSummaryResponse,
            budgets::BudgetPeriodsResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and token verification"),
        (name = "users", description = "User profile"),
        (name = "accounts", description = "Account management"),
        (name = "categories", description = "Category management"),
        (name = "transactions", description = "Ledger entries and statistics"),
        (name = "budgets", description = "Budgets and spending aggregates"),
    ),
    info(
        title = "FinTrack API",
        description = "Personal finance tracker API: accounts, categories, transactions and budgets",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
