use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_admin, require_self_or_admin};

use crate::models::{AccountError, ChangePasswordRequest, NotificationQuery, UserListQuery};
use crate::services::AccountService;

fn to_app_error(error: AccountError) -> AppError {
    match error {
        AccountError::PasswordMismatch => AppError::ValidationError(error.to_string()),
        AccountError::WeakPassword(_) => AppError::ValidationError(error.to_string()),
        AccountError::ValidationError(msg) => AppError::ValidationError(msg),
        AccountError::IncorrectPassword => AppError::Auth("Current password is incorrect".to_string()),
        AccountError::UserNotFound => AppError::NotFound("User not found".to_string()),
        AccountError::HashingError(msg) => AppError::Internal(msg),
        AccountError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let own_email = user
        .email
        .as_deref()
        .is_some_and(|email| email.eq_ignore_ascii_case(request.email.trim()));
    if !own_email && !user.is_admin() {
        return Err(AppError::Forbidden("Cannot change another user's password".to_string()));
    }

    let account_service = AccountService::new(&state);
    account_service
        .change_password(request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "status": true,
        "message": "Password changed successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let account_service = AccountService::new(&state);
    let page = account_service
        .list_users(&query, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "status": true,
        "data": page
    })))
}

#[axum::debug_handler]
pub async fn user_notifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Value>, AppError> {
    let target = query.user_id.unwrap_or_else(|| user.id.clone());
    require_self_or_admin(&user, &target)?;

    let user_id = Uuid::parse_str(&target)
        .map_err(|_| AppError::BadRequest("Invalid user id".to_string()))?;

    let account_service = AccountService::new(&state);
    let notifications = account_service
        .user_notifications(user_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "status": true,
        "data": notifications
    })))
}
