use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use common::{ApiResponse, ErrorResponse};
use compute::ledger;
use model::entities::{category, transaction::TransactionType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
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

const DEFAULT_COLOR: &str = "#000000";

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct CategoryQuery {
    /// Only categories of this type
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
}

/// Request body for creating a category
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// `#RRGGBB`, defaults to black
    #[validate(custom(function = "rules::hex_color"))]
    pub color: Option<String>,
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub icon: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    #[validate(custom(function = "rules::hex_color"))]
    pub color: Option<String>,
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub icon: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub color: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            kind: model.kind,
            color: model.color,
            icon: model.icon,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Fails with `Conflict` when the user already has another category with
/// the same name and type.
async fn ensure_unique(
    db: &DatabaseConnection,
    user_id: i32,
    name: &str,
    kind: TransactionType,
    except_id: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = category::Entity::find()
        .filter(category::Column::UserId.eq(user_id))
        .filter(category::Column::Name.eq(name))
        .filter(category::Column::Kind.eq(kind));
    if let Some(id) = except_id {
        query = query.filter(category::Column::Id.ne(id));
    }

    if query.count(db).await? > 0 {
        warn!(name, ?kind, "Duplicate category");
        return Err(ApiError::Conflict(
            "Category with this name and type already exists".to_string(),
        ));
    }
    Ok(())
}

async fn owned_category(state: &AppState, user_id: i32, category_id: i32) -> Result<category::Model, ApiError> {
    ledger::find_owned_category(&state.db, user_id, category_id)
        .await?
        .ok_or_else(|| {
            warn!(category_id, "Category not found");
            ApiError::NotFound("Category not found".to_string())
        })
}

/// List the caller's categories by name
#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(CategoryQuery),
    responses(
        (status = 200, description = "Categories retrieved successfully", body = [CategoryResponse]),
        (status = 401, description = "Missing token", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_categories(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Query(query)), _): ValidQuery<CategoryQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, ApiError> {
    trace!("Entering get_categories function");

    let mut select = category::Entity::find().filter(category::Column::UserId.eq(user.id));
    if let Some(kind) = query.kind {
        debug!(?kind, "Filtering categories by type");
        select = select.filter(category::Column::Kind.eq(kind));
    }
    let categories = select
        .order_by_asc(category::Column::Name)
        .order_by_asc(category::Column::Id)
        .all(&state.db)
        .await?;

    info!("Successfully retrieved {} categories", categories.len());
    Ok(Json(ApiResponse::ok(
        categories.into_iter().map(CategoryResponse::from).collect(),
        "Categories retrieved successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/categories/{category_id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("category_id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category retrieved successfully", body = CategoryResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_category(
    WithRejection(Path(category_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<CategoryResponse>>, ApiError> {
    let category_model = owned_category(&state, user.id, category_id).await?;
    Ok(Json(ApiResponse::ok(
        CategoryResponse::from(category_model),
        "Category retrieved successfully",
    )))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created successfully", body = CategoryResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Duplicate category", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn create_category(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Json(request)), _): ValidJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), ApiError> {
    trace!("Entering create_category function");
    ensure_unique(&state.db, user.id, &request.name, request.kind, None).await?;

    let now = Utc::now();
    let category_model = category::ActiveModel {
        user_id: Set(user.id),
        name: Set(request.name),
        kind: Set(request.kind),
        color: Set(request.color.unwrap_or_else(|| DEFAULT_COLOR.to_string())),
        icon: Set(request.icon),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Category created successfully with ID: {}", category_model.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            CategoryResponse::from(category_model),
            "Category created successfully",
        )),
    ))
}

#[utoipa::path(
    put,
    path = "/api/categories/{category_id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("category_id" = i32, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated successfully", body = CategoryResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Duplicate category", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn update_category(
    WithRejection(Path(category_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    WithRejection(Valid(Json(request)), _): ValidJson<UpdateCategoryRequest>,
) -> Result<Json<ApiResponse<CategoryResponse>>, ApiError> {
    trace!("Entering update_category function for category_id: {}", category_id);

    let existing = owned_category(&state, user.id, category_id).await?;
    let name = request.name.unwrap_or_else(|| existing.name.clone());
    let kind = request.kind.unwrap_or(existing.kind);
    if name != existing.name || kind != existing.kind {
        ensure_unique(&state.db, user.id, &name, kind, Some(category_id)).await?;
    }

    let mut active: category::ActiveModel = existing.into();
    active.name = Set(name);
    active.kind = Set(kind);
    if let Some(color) = request.color {
        active.color = Set(color);
    }
    if request.icon.is_some() {
        active.icon = Set(request.icon);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    info!("Category with ID {} updated successfully", updated.id);
    Ok(Json(ApiResponse::ok(
        CategoryResponse::from(updated),
        "Category updated successfully",
    )))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{category_id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("category_id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted successfully"),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Category still has transactions", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_category(
    WithRejection(Path(category_id), _): IdPath,
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    ledger::delete_category(&state.db, user.id, category_id).await?;
    info!("Category with ID {} deleted successfully", category_id);
    Ok(Json(ApiResponse::ok((), "Category deleted successfully")))
}
