use std::collections::HashMap;

use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use common::{ApiResponse, ErrorResponse, double_option};
use compute::{
    EntryDraft, EntryPatch, StatsPeriod, StatsWindow, ledger,
    stats::transaction_stats,
};
use model::entities::{
    account, category,
    transaction::{self, TransactionType},
};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    auth::CurrentUser,
    error::ApiError,
    extract::{IdPath, ValidJson, ValidQuery, rules},
    schemas::AppState,
};

const DEFAULT_LIMIT: u64 = 50;

/// Request body for recording a transaction
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    /// Strictly positive amount; the type decides the sign of the balance effect
    #[validate(custom(function = "rules::positive_amount"))]
    #[schema(value_type = String, example = "42.50")]
    pub amount: Decimal,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub description: Option<String>,
    #[serde(alias = "category_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub category_id: i32,
    #[serde(alias = "account_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub account_id: i32,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Defaults to today
    #[validate(custom(function = "rules::supported_date"))]
    pub date: Option<NaiveDate>,
}

/// Partial update. Absent fields keep their stored value; a `null`
/// description clears it.
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionRequest {
    #[validate(custom(function = "rules::positive_amount"))]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
    #[serde(alias = "category_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub category_id: Option<i32>,
    #[serde(alias = "account_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub account_id: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    #[validate(custom(function = "rules::supported_date"))]
    pub date: Option<NaiveDate>,
}

impl From<UpdateTransactionRequest> for EntryPatch {
    fn from(request: UpdateTransactionRequest) -> Self {
        Self {
            account_id: request.account_id,
            category_id: request.category_id,
            amount: request.amount,
            description: request.description,
            kind: request.kind,
            date: request.date,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    #[serde(alias = "category_id")]
    pub category_id: Option<i32>,
    #[serde(alias = "account_id")]
    pub account_id: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    /// Inclusive lower date bound
    #[serde(alias = "start_date")]
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper date bound
    #[serde(alias = "end_date")]
    pub end_date: Option<NaiveDate>,
    /// Page size, 1-100 (default 50)
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub limit: Option<u64>,
    /// Rows to skip (default 0)
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// `week`, `month` (default), `year` or `all`
    #[param(value_type = Option<String>)]
    pub period: Option<StatsPeriod>,
    /// Start of a custom range; takes precedence over `period`
    #[serde(alias = "start_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(alias = "end_date")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: i32,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: NaiveDate,
    pub category_id: i32,
    pub category_name: String,
    pub account_id: i32,
    pub account_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionResponse {
    fn new(model: transaction::Model, names: &Names) -> Self {
        Self {
            category_name: names.categories.get(&model.category_id).cloned().unwrap_or_default(),
            account_name: names.accounts.get(&model.account_id).cloned().unwrap_or_default(),
            id: model.id,
            amount: model.amount,
            description: model.description,
            kind: model.kind,
            date: model.date,
            category_id: model.category_id,
            account_id: model.account_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatsResponse {
    #[schema(value_type = String)]
    pub total_income: Decimal,
    #[schema(value_type = String)]
    pub total_expenses: Decimal,
    #[schema(value_type = String)]
    pub net_income: Decimal,
    pub transaction_count: u64,
    /// The rolling period used, or `custom`
    pub period: String,
}

/// Category and account names of one user, keyed by id.
#[derive(Debug, Default)]
struct Names {
    categories: HashMap<i32, String>,
    accounts: HashMap<i32, String>,
}

impl Names {
    async fn load(db: &DatabaseConnection, user_id: i32) -> Result<Self, ApiError> {
        let categories: Vec<(i32, String)> = category::Entity::find()
            .select_only()
            .columns([category::Column::Id, category::Column::Name])
            .filter(category::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;
        let accounts: Vec<(i32, String)> = account::Entity::find()
            .select_only()
            .columns([account::Column::Id, account::Column::Name])
            .filter(account::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;
        Ok(Self {
            categories: categories.into_iter().collect(),
            accounts: accounts.into_iter().collect(),
        })
    }
}

/// List the caller's transactions, newest first
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(TransactionQuery),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = TransactionListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_transactions(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Query(query)), _): ValidQuery<TransactionQuery>,
) -> Result<Json<ApiResponse<TransactionListResponse>>, ApiError> {
    trace!("Entering get_transactions function");

    let mut select = transaction::Entity::find().filter(transaction::Column::UserId.eq(user.id));
    if let Some(category_id) = query.category_id {
        select = select.filter(transaction::Column::CategoryId.eq(category_id));
    }
    if let Some(account_id) = query.account_id {
        select = select.filter(transaction::Column::AccountId.eq(account_id));
    }
    if let Some(kind) = query.kind {
        select = select.filter(transaction::Column::Kind.eq(kind));
    }
    if let Some(start) = query.start_date {
        select = select.filter(transaction::Column::Date.gte(start));
    }
    if let Some(end) = query.end_date {
        select = select.filter(transaction::Column::Date.lte(end));
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let total = select.clone().count(&state.db).await?;
    debug!(total, limit, offset, "Fetching transaction page");

    let rows = select
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(&state.db)
        .await?;

    let names = Names::load(&state.db, user.id).await?;
    let transactions: Vec<TransactionResponse> = rows
        .into_iter()
        .map(|row| TransactionResponse::new(row, &names))
        .collect();

    info!("Successfully retrieved {} of {} transactions", transactions.len(), total);
    Ok(Json(ApiResponse::ok(
        TransactionListResponse {
            transactions,
            total,
            limit,
            offset,
        },
        "Transactions retrieved successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/transactions/{transaction_id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction retrieved successfully", body = TransactionResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_transaction(
    WithRejection(Path(transaction_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let entry = ledger::find_owned_entry(&state.db, user.id, transaction_id)
        .await?
        .ok_or_else(|| {
            warn!(transaction_id, "Transaction not found");
            ApiError::NotFound("Transaction not found".to_string())
        })?;

    let names = Names::load(&state.db, user.id).await?;
    Ok(Json(ApiResponse::ok(
        TransactionResponse::new(entry, &names),
        "Transaction retrieved successfully",
    )))
}

/// Record a transaction and apply it to the account balance
#[utoipa::path(
    post,
    path = "/api/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse),
        (status = 400, description = "Invalid request or reference", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Json(request)), _): ValidJson<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResponse>>), ApiError> {
    trace!("Entering create_transaction function");

    let draft = EntryDraft {
        account_id: request.account_id,
        category_id: request.category_id,
        amount: request.amount,
        description: request.description,
        kind: request.kind,
        date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
    };
    let entry = ledger::create_entry(&state.db, user.id, draft).await?;

    info!("Transaction created successfully with ID: {}", entry.id);
    let names = Names::load(&state.db, user.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            TransactionResponse::new(entry, &names),
            "Transaction created successfully",
        )),
    ))
}

#[utoipa::path(
    put,
    path = "/api/transactions/{transaction_id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    request_body = UpdateTransactionRequest,
    responses(
        (status = 200, description = "Transaction updated successfully", body = TransactionResponse),
        (status = 400, description = "Invalid request or reference", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn update_transaction(
    WithRejection(Path(transaction_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Json(request)), _): ValidJson<UpdateTransactionRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    trace!("Entering update_transaction function for transaction_id: {}", transaction_id);

    let entry = ledger::update_entry(&state.db, user.id, transaction_id, request.into()).await?;

    info!("Transaction with ID {} updated successfully", entry.id);
    let names = Names::load(&state.db, user.id).await?;
    Ok(Json(ApiResponse::ok(
        TransactionResponse::new(entry, &names),
        "Transaction updated successfully",
    )))
}

#[utoipa::path(
    delete,
    path = "/api/transactions/{transaction_id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction deleted successfully"),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_transaction(
    WithRejection(Path(transaction_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    ledger::delete_entry(&state.db, user.id, transaction_id).await?;
    info!("Transaction with ID {} deleted successfully", transaction_id);
    Ok(Json(ApiResponse::ok((), "Transaction deleted successfully")))
}

/// Income, expense and net totals over a rolling period or custom range
#[utoipa::path(
    get,
    path = "/api/transactions/stats/summary",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(StatsQuery),
    responses(
        (status = 200, description = "Statistics computed successfully", body = TransactionStatsResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_transaction_stats(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Query(query)), _): ValidQuery<StatsQuery>,
) -> Result<Json<ApiResponse<TransactionStatsResponse>>, ApiError> {
    trace!("Entering get_transaction_stats function");

    let (window, period) = if query.start_date.is_some() || query.end_date.is_some() {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                return Err(ApiError::validation("endDate", "must not be before startDate"));
            }
        }
        (StatsWindow::custom(query.start_date, query.end_date), "custom".to_string())
    } else {
        let period = query.period.unwrap_or_default();
        let name = match period {
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
            StatsPeriod::Year => "year",
            StatsPeriod::All => "all",
        };
        (StatsWindow::rolling(period, Utc::now().date_naive()), name.to_string())
    };
    debug!(?window, %period, "Computing transaction statistics");

    let stats = transaction_stats(&state.db, user.id, window).await?;
    Ok(Json(ApiResponse::ok(
        TransactionStatsResponse {
            total_income: stats.total_income,
            total_expenses: stats.total_expenses,
            net_income: stats.net_income,
            transaction_count: stats.transaction_count,
            period,
        },
        "Statistics computed successfully",
    )))
}
