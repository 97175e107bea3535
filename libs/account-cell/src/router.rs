use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Mounted at the root: the paths span `/account`, `/admin` and `/users`.
pub fn account_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/account/password", put(handlers::change_password))
        .route("/admin/users", get(handlers::list_users))
        .route("/users/notifications", get(handlers::user_notifications))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
