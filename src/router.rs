use crate::auth::require_auth;
use crate::error::expose_internal_errors;
use crate::handlers::{
    accounts::{create_account, delete_account, get_account, get_accounts, update_account},
    auth::{login, register, verify},
    budgets::{
        create_budget, delete_budget, get_budget, get_budget_periods, get_budget_summary,
        get_budgets, update_budget,
    },
    categories::{create_category, delete_category, get_categories, get_category, update_category},
    health::health_check,
    transactions::{
        create_transaction, delete_transaction, get_transaction, get_transaction_stats,
        get_transactions, update_transaction,
    },
    users::get_profile,
};
use crate::rate_limit::rate_limit;
use crate::schemas::{ApiDoc, AppState};
use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use common::ErrorResponse;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Not found", "NOT_FOUND")),
    )
}

/// Routes that require a bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/verify", get(verify))
        .route("/api/users/profile", get(get_profile))
        // Accounts
        .route("/api/accounts", get(get_accounts).post(create_account))
        .route(
            "/api/accounts/:account_id",
            get(get_account).put(update_account).delete(delete_account),
        )
        // Categories
        .route("/api/categories", get(get_categories).post(create_category))
        .route(
            "/api/categories/:category_id",
            get(get_category).put(update_category).delete(delete_category),
        )
        // Transactions
        .route("/api/transactions", get(get_transactions).post(create_transaction))
        .route("/api/transactions/stats/summary", get(get_transaction_stats))
        .route(
            "/api/transactions/:transaction_id",
            get(get_transaction).put(update_transaction).delete(delete_transaction),
        )
        // Budgets
        .route("/api/budgets", get(get_budgets).post(create_budget))
        .route("/api/budgets/summary", get(get_budget_summary))
        .route("/api/budgets/periods", get(get_budget_periods))
        .route(
            "/api/budgets/:budget_id",
            get(get_budget).put(update_budget).delete(delete_budget),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .merge(protected_routes(state.clone()))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health_check))
        .merge(api)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(middleware::map_response_with_state(state.clone(), expose_internal_errors))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    state.config.request_timeout_secs,
                )))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
