use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use model::entities::user;
use sea_orm::EntityTrait;
use tracing::{debug, warn};

use super::token::TokenError;
use crate::{error::ApiError, schemas::AppState};

/// The authenticated caller, placed in request extensions by [`require_auth`].
///
/// Handlers receive it with `Extension(CurrentUser(user)): Extension<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Rejects requests without a valid bearer token.
///
/// Missing token or a token for a deleted user answers 401; a bad or expired
/// token answers 403.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;

    let claims = state.tokens.verify(token).map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        match e {
            TokenError::Expired => ApiError::Forbidden("Token expired".to_string()),
            _ => ApiError::Forbidden("Invalid token".to_string()),
        }
    })?;

    let user = user::Entity::find_by_id(claims.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!(user_id = claims.user_id, "Token refers to a missing user");
            ApiError::Unauthorized("User not found".to_string())
        })?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
