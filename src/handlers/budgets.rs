use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use common::{ApiResponse, ErrorResponse, YearMonth, double_option};
use compute::{BudgetCalculator, BudgetFilter, BudgetReport, BudgetStatus, ledger};
use model::entities::budget::{self, BudgetPeriod};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set};
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

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BudgetQuery {
    /// Calendar year the budget window must overlap
    #[validate(range(min = 1900, max = 2100, message = "must be between 1900 and 2100"))]
    pub year: Option<i32>,
    /// Month (1-12) of `year` the budget window must overlap
    #[validate(range(min = 1, max = 12, message = "must be between 1 and 12"))]
    pub month: Option<u32>,
    pub period: Option<BudgetPeriod>,
}

impl From<BudgetQuery> for BudgetFilter {
    fn from(query: BudgetQuery) -> Self {
        Self {
            year: query.year,
            month: query.month,
            period: query.period,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBudgetRequest {
    #[serde(alias = "category_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub category_id: i32,
    #[validate(custom(function = "rules::positive_amount"))]
    #[schema(value_type = String, example = "1000.00")]
    pub amount: Decimal,
    pub period: BudgetPeriod,
    #[serde(alias = "start_date")]
    #[validate(custom(function = "rules::supported_date"))]
    pub start_date: NaiveDate,
    /// Open-ended when absent
    #[serde(alias = "end_date")]
    #[validate(custom(function = "rules::supported_date"))]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBudgetRequest {
    #[serde(alias = "category_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub category_id: Option<i32>,
    #[validate(custom(function = "rules::positive_amount"))]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub period: Option<BudgetPeriod>,
    #[serde(alias = "start_date")]
    #[validate(custom(function = "rules::supported_date"))]
    pub start_date: Option<NaiveDate>,
    /// `null` reopens the budget
    #[serde(default, alias = "end_date", deserialize_with = "double_option")]
    #[validate(custom(function = "rules::supported_date"))]
    #[schema(value_type = Option<NaiveDate>, nullable)]
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetResponse {
    pub id: i32,
    pub category_id: i32,
    pub category_name: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = String)]
    pub spent: Decimal,
    #[schema(value_type = String)]
    pub remaining: Decimal,
    /// `future`, `active` or `expired`
    #[schema(value_type = String)]
    pub status: BudgetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BudgetReport> for BudgetResponse {
    fn from(report: BudgetReport) -> Self {
        let budget = report.budget;
        Self {
            id: budget.id,
            category_id: budget.category_id,
            category_name: report.category_name,
            amount: budget.amount,
            period: budget.period,
            start_date: budget.start_date,
            end_date: budget.end_date,
            spent: report.spent,
            remaining: report.remaining,
            status: report.status,
            created_at: budget.created_at,
            updated_at: budget.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummaryResponse {
    #[schema(value_type = String)]
    pub total_budgeted: Decimal,
    #[schema(value_type = String)]
    pub total_spent: Decimal,
    #[schema(value_type = String)]
    pub total_remaining: Decimal,
    pub budget_count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BudgetPeriodsResponse {
    pub months: Vec<YearMonth>,
    pub years: Vec<i32>,
    pub periods: Vec<BudgetPeriod>,
}

fn check_window(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), ApiError> {
    match end {
        Some(end) if end < start => Err(ApiError::validation("endDate", "must not be before startDate")),
        _ => Ok(()),
    }
}

async fn ensure_category(state: &AppState, user_id: i32, category_id: i32) -> Result<(), ApiError> {
    if ledger::find_owned_category(&state.db, user_id, category_id)
        .await?
        .is_none()
    {
        warn!(category_id, "Budget references a foreign or missing category");
        return Err(ApiError::InvalidReference("Invalid category".to_string()));
    }
    Ok(())
}

/// List budgets with their spending
#[utoipa::path(
    get,
    path = "/api/budgets",
    tag = "budgets",
    security(("bearer_auth" = [])),
    params(BudgetQuery),
    responses(
        (status = 200, description = "Budgets retrieved successfully", body = [BudgetResponse]),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_budgets(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Query(query)), _): ValidQuery<BudgetQuery>,
) -> Result<Json<ApiResponse<Vec<BudgetResponse>>>, ApiError> {
    trace!("Entering get_budgets function");

    let reports = BudgetCalculator::new()
        .reports(&state.db, user.id, &query.into())
        .await?;

    info!("Successfully retrieved {} budgets", reports.len());
    Ok(Json(ApiResponse::ok(
        reports.into_iter().map(BudgetResponse::from).collect(),
        "Budgets retrieved successfully",
    )))
}

/// Totals over the budgets the same filter lists
#[utoipa::path(
    get,
    path = "/api/budgets/summary",
    tag = "budgets",
    security(("bearer_auth" = [])),
    params(BudgetQuery),
    responses(
        (status = 200, description = "Budget summary computed successfully", body = BudgetSummaryResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_budget_summary(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Query(query)), _): ValidQuery<BudgetQuery>,
) -> Result<Json<ApiResponse<BudgetSummaryResponse>>, ApiError> {
    let summary = BudgetCalculator::new()
        .summary(&state.db, user.id, &query.into())
        .await?;
    debug!(?summary, "Budget summary computed");

    Ok(Json(ApiResponse::ok(
        BudgetSummaryResponse {
            total_budgeted: summary.total_budgeted,
            total_spent: summary.total_spent,
            total_remaining: summary.total_remaining,
            budget_count: summary.budget_count,
        },
        "Budget summary computed successfully",
    )))
}

/// Months, years and period types that can be used as filters
#[utoipa::path(
    get,
    path = "/api/budgets/periods",
    tag = "budgets",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Budget periods retrieved successfully", body = BudgetPeriodsResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_budget_periods(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<BudgetPeriodsResponse>>, ApiError> {
    let periods = BudgetCalculator::new().periods(&state.db, user.id).await?;
    Ok(Json(ApiResponse::ok(
        BudgetPeriodsResponse {
            months: periods.months,
            years: periods.years,
            periods: periods.periods,
        },
        "Budget periods retrieved successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/budgets/{budget_id}",
    tag = "budgets",
    security(("bearer_auth" = [])),
    params(("budget_id" = i32, Path, description = "Budget ID")),
    responses(
        (status = 200, description = "Budget retrieved successfully", body = BudgetResponse),
        (status = 404, description = "Budget not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_budget(
    WithRejection(Path(budget_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<BudgetResponse>>, ApiError> {
    let report = BudgetCalculator::new()
        .report_for(&state.db, user.id, budget_id)
        .await?;
    Ok(Json(ApiResponse::ok(
        BudgetResponse::from(report),
        "Budget retrieved successfully",
    )))
}

#[utoipa::path(
    post,
    path = "/api/budgets",
    tag = "budgets",
    security(("bearer_auth" = [])),
    request_body = CreateBudgetRequest,
    responses(
        (status = 201, description = "Budget created successfully", body = BudgetResponse),
        (status = 400, description = "Invalid request or category", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn create_budget(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Json(request)), _): ValidJson<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BudgetResponse>>), ApiError> {
    trace!("Entering create_budget function");
    check_window(request.start_date, request.end_date)?;
    ensure_category(&state, user.id, request.category_id).await?;

    let now = Utc::now();
    let budget_model = budget::ActiveModel {
        user_id: Set(user.id),
        category_id: Set(request.category_id),
        amount: Set(request.amount),
        period: Set(request.period),
        start_date: Set(request.start_date),
        end_date: Set(request.end_date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!("Budget created successfully with ID: {}", budget_model.id);

    let report = BudgetCalculator::new()
        .report_for(&state.db, user.id, budget_model.id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            BudgetResponse::from(report),
            "Budget created successfully",
        )),
    ))
}

#[utoipa::path(
    put,
    path = "/api/budgets/{budget_id}",
    tag = "budgets",
    security(("bearer_auth" = [])),
    params(("budget_id" = i32, Path, description = "Budget ID")),
    request_body = UpdateBudgetRequest,
    responses(
        (status = 200, description = "Budget updated successfully", body = BudgetResponse),
        (status = 400, description = "Invalid request or category", body = ErrorResponse),
        (status = 404, description = "Budget not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn update_budget(
    WithRejection(Path(budget_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Json(request)), _): ValidJson<UpdateBudgetRequest>,
) -> Result<Json<ApiResponse<BudgetResponse>>, ApiError> {
    trace!("Entering update_budget function for budget_id: {}", budget_id);

    let existing = budget::Entity::find_by_id(budget_id)
        .filter(budget::Column::UserId.eq(user.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!(budget_id, "Budget not found");
            ApiError::NotFound("Budget not found".to_string())
        })?;

    let start_date = request.start_date.unwrap_or(existing.start_date);
    let end_date = request.end_date.unwrap_or(existing.end_date);
    check_window(start_date, end_date)?;
    if let Some(category_id) = request.category_id {
        ensure_category(&state, user.id, category_id).await?;
    }

    let mut active: budget::ActiveModel = existing.into();
    if let Some(category_id) = request.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(amount) = request.amount {
        active.amount = Set(amount);
    }
    if let Some(period) = request.period {
        active.period = Set(period);
    }
    active.start_date = Set(start_date);
    active.end_date = Set(end_date);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;
    info!("Budget with ID {} updated successfully", updated.id);

    let report = BudgetCalculator::new()
        .report_for(&state.db, user.id, updated.id)
        .await?;
    Ok(Json(ApiResponse::ok(
        BudgetResponse::from(report),
        "Budget updated successfully",
    )))
}

#[utoipa::path(
    delete,
    path = "/api/budgets/{budget_id}",
    tag = "budgets",
    security(("bearer_auth" = [])),
    params(("budget_id" = i32, Path, description = "Budget ID")),
    responses(
        (status = 200, description = "Budget deleted successfully"),
        (status = 404, description = "Budget not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_budget(
    WithRejection(Path(budget_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let existing = budget::Entity::find_by_id(budget_id)
        .filter(budget::Column::UserId.eq(user.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Budget not found".to_string()))?;
    existing.delete(&state.db).await?;

    info!("Budget with ID {} deleted successfully", budget_id);
    Ok(Json(ApiResponse::ok((), "Budget deleted successfully")))
}
