use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use common::{ApiResponse, ErrorResponse};
use compute::ledger;
use model::entities::account::{self, AccountType};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::CurrentUser,
    error::ApiError,
    extract::{IdPath, ValidJson, rules},
    schemas::AppState,
};

/// Request body for creating a new account
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    /// Account name
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccountType,
    /// Opening balance, defaults to 0
    #[schema(value_type = Option<String>, example = "250.00")]
    pub balance: Option<Decimal>,
    /// ISO 4217 currency code, defaults to "USD"
    #[validate(custom(function = "rules::currency_code"))]
    pub currency: Option<String>,
}

/// Request body for updating an account. Absent fields are kept.
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<AccountType>,
    /// Setting the balance rebases the opening balance by the same amount
    #[schema(value_type = Option<String>)]
    pub balance: Option<Decimal>,
    #[validate(custom(function = "rules::currency_code"))]
    pub currency: Option<String>,
}

/// Account response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccountType,
    #[schema(value_type = String)]
    pub balance: Decimal,
    #[schema(value_type = String)]
    pub initial_balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<account::Model> for AccountResponse {
    fn from(model: account::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            kind: model.kind,
            balance: model.balance,
            initial_balance: model.initial_balance,
            currency: model.currency,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

async fn owned_account(state: &AppState, user_id: i32, account_id: i32) -> Result<account::Model, ApiError> {
    ledger::find_owned_account(&state.db, user_id, account_id)
        .await?
        .ok_or_else(|| {
            warn!(account_id, "Account not found");
            ApiError::NotFound("Account not found".to_string())
        })
}

/// Create a new account
#[utoipa::path(
    post,
    path = "/api/accounts",
    tag = "accounts",
    security(("bearer_auth" = [])),
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created successfully", body = AccountResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing token", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn create_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Json(request)), _): ValidJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponse>>), ApiError> {
    trace!("Entering create_account function");
    debug!("Creating account with name: {}", request.name);

    let opening = request.balance.unwrap_or(Decimal::ZERO);
    let now = Utc::now();
    let new_account = account::ActiveModel {
        user_id: Set(user.id),
        name: Set(request.name),
        kind: Set(request.kind),
        balance: Set(opening),
        initial_balance: Set(opening),
        currency: Set(request.currency.unwrap_or_else(|| "USD".to_string())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let account_model = new_account.insert(&state.db).await?;
    info!(
        "Account created successfully with ID: {}, name: {}",
        account_model.id, account_model.name
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            AccountResponse::from(account_model),
            "Account created successfully",
        )),
    ))
}

/// List the caller's accounts, newest first
#[utoipa::path(
    get,
    path = "/api/accounts",
    tag = "accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Accounts retrieved successfully", body = [AccountResponse]),
        (status = 401, description = "Missing token", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_accounts(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<AccountResponse>>>, ApiError> {
    trace!("Entering get_accounts function");

    let accounts = account::Entity::find()
        .filter(account::Column::UserId.eq(user.id))
        .order_by_desc(account::Column::CreatedAt)
        .order_by_desc(account::Column::Id)
        .all(&state.db)
        .await?;

    info!("Successfully retrieved {} accounts", accounts.len());
    Ok(Json(ApiResponse::ok(
        accounts.into_iter().map(AccountResponse::from).collect(),
        "Accounts retrieved successfully",
    )))
}

/// Get a specific account by ID
#[utoipa::path(
    get,
    path = "/api/accounts/{account_id}",
    tag = "accounts",
    security(("bearer_auth" = [])),
    params(
        ("account_id" = i32, Path, description = "Account ID"),
    ),
    responses(
        (status = 200, description = "Account retrieved successfully", body = AccountResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_account(
    WithRejection(Path(account_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    trace!("Entering get_account function for account_id: {}", account_id);

    let account_model = owned_account(&state, user.id, account_id).await?;
    Ok(Json(ApiResponse::ok(
        AccountResponse::from(account_model),
        "Account retrieved successfully",
    )))
}

/// Update an account
#[utoipa::path(
    put,
    path = "/api/accounts/{account_id}",
    tag = "accounts",
    security(("bearer_auth" = [])),
    params(
        ("account_id" = i32, Path, description = "Account ID"),
    ),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated successfully", body = AccountResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn update_account(
    WithRejection(Path(account_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Json(request)), _): ValidJson<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    trace!("Entering update_account function for account_id: {}", account_id);

    let existing = owned_account(&state, user.id, account_id).await?;
    let (balance, initial_balance) = (existing.balance, existing.initial_balance);
    let mut active: account::ActiveModel = existing.into();

    if let Some(name) = request.name {
        debug!("Updating account name to: {}", name);
        active.name = Set(name);
    }
    if let Some(kind) = request.kind {
        active.kind = Set(kind);
    }
    if let Some(currency) = request.currency {
        active.currency = Set(currency);
    }
    if let Some(new_balance) = request.balance {
        // A manual balance edit moves the opening balance with it
        debug!(from = %balance, to = %new_balance, "Rebasing account balance");
        active.initial_balance = Set(initial_balance + (new_balance - balance));
        active.balance = Set(new_balance);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    info!("Account with ID {} updated successfully", updated.id);
    Ok(Json(ApiResponse::ok(
        AccountResponse::from(updated),
        "Account updated successfully",
    )))
}

/// Delete an account that has no transactions
#[utoipa::path(
    delete,
    path = "/api/accounts/{account_id}",
    tag = "accounts",
    security(("bearer_auth" = [])),
    params(
        ("account_id" = i32, Path, description = "Account ID"),
    ),
    responses(
        (status = 200, description = "Account deleted successfully"),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 409, description = "Account still has transactions", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_account(
    WithRejection(Path(account_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    trace!("Entering delete_account function for account_id: {}", account_id);

    ledger::delete_account(&state.db, user.id, account_id).await?;
    info!("Account with ID {} deleted successfully", account_id);
    Ok(Json(ApiResponse::ok((), "Account deleted successfully")))
}
