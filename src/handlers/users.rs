use axum::{Extension, response::Json};
use chrono::{DateTime, Utc};
use common::{ApiResponse, ErrorResponse};
use model::entities::user;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::auth::CurrentUser;

/// Public view of a user. Never includes the password digest.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            created_at: model.created_at,
        }
    }
}

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/api/users/profile",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile retrieved successfully", body = UserResponse),
        (status = 401, description = "Missing token", body = ErrorResponse),
        (status = 403, description = "Invalid or expired token", body = ErrorResponse)
    )
)]
#[instrument(skip(user), fields(user_id = user.id))]
pub async fn get_profile(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<ApiResponse<UserResponse>> {
    debug!("Returning profile");
    Json(ApiResponse::ok(
        UserResponse::from(user),
        "Profile retrieved successfully",
    ))
}
