use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use account_cell::router::account_routes;
use booking_cell::router::booking_routes;
use shared_config::AppConfig;
use therapist_cell::router::therapist_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Therapy booking API is running!" }))
        .nest("/therapists", therapist_routes(state.clone()))
        .nest("/bookings", booking_routes(state.clone()))
        .merge(account_routes(state))
}
