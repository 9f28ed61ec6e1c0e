use axum::{Extension, extract::State, http::StatusCode, response::Json};
use axum_extra::extract::WithRejection;
use axum_valid::Valid;
use chrono::Utc;
use common::{ApiResponse, ErrorResponse};
use model::entities::user;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set, SqlErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{CurrentUser, PasswordHash},
    error::ApiError,
    extract::{ValidJson, rules},
    handlers::users::UserResponse,
    schemas::AppState,
};

/// Request body for registering a user
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 30, message = "must be 3-30 characters"),
        custom(function = "rules::alphanumeric")
    )]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
    #[serde(default, alias = "first_name")]
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub first_name: Option<String>,
    #[serde(default, alias = "last_name")]
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub last_name: Option<String>,
}

/// Request body for logging in. `username` also accepts an email address.
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserResponse,
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid username or password".to_string())
}

fn issue_token(state: &AppState, user_id: i32) -> Result<String, ApiError> {
    state
        .tokens
        .issue(user_id)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Username or email already exists", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Valid(Json(request)), _): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ApiError> {
    trace!("Entering register function");

    let existing = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(request.username.as_str()))
                .add(user::Column::Email.eq(request.email.as_str())),
        )
        .one(&state.db)
        .await?;
    if existing.is_some() {
        warn!("Registration rejected: username or email taken");
        return Err(ApiError::Conflict("Username or email already exists".to_string()));
    }

    debug!("Hashing password");
    let digest = PasswordHash::hash_blocking(request.password, state.config.auth.bcrypt_cost).await?;

    let now = Utc::now();
    let new_user = user::ActiveModel {
        username: Set(request.username),
        email: Set(request.email),
        password_hash: Set(digest.into_string()),
        first_name: Set(request.first_name),
        last_name: Set(request.last_name),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = match new_user.insert(&state.db).await {
        Ok(model) => model,
        Err(db_error) if matches!(db_error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            warn!("Registration lost a race on a unique key");
            return Err(ApiError::Conflict("Username or email already exists".to_string()));
        }
        Err(db_error) => return Err(db_error.into()),
    };

    let token = issue_token(&state, created.id)?;
    info!(user_id = created.id, "User registered successfully");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            AuthResponse {
                user: created.into(),
                token,
            },
            "User registered successfully",
        )),
    ))
}

/// Log in with username or email
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(login = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Valid(Json(request)), _): ValidJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    trace!("Entering login function");

    let found = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(request.username.as_str()))
                .add(user::Column::Email.eq(request.username.as_str())),
        )
        .one(&state.db)
        .await?;
    let Some(found) = found else {
        warn!("Login failed: unknown user");
        return Err(invalid_credentials());
    };

    let digest = PasswordHash::from_stored(found.password_hash.clone());
    if !digest.verify_blocking(request.password).await? {
        warn!(user_id = found.id, "Login failed: password mismatch");
        return Err(invalid_credentials());
    }

    let token = issue_token(&state, found.id)?;
    info!(user_id = found.id, "User logged in");
    Ok(Json(ApiResponse::ok(
        AuthResponse {
            user: found.into(),
            token,
        },
        "Login successful",
    )))
}

/// Validate the bearer token and return its user
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Missing token", body = ErrorResponse),
        (status = 403, description = "Invalid or expired token", body = ErrorResponse)
    )
)]
#[instrument(skip(user), fields(user_id = user.id))]
pub async fn verify(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<ApiResponse<VerifyResponse>> {
    Json(ApiResponse::ok(
        VerifyResponse {
            valid: true,
            user: user.into(),
        },
        "Token is valid",
    ))
}
