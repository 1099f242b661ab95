use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::db::AppState;

pub mod cookie;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod services;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route(
            "/auth/signin",
            post(handlers::signin).route_layer(middleware::from_fn_with_state(
                state,
                rate_limit::signin_rate_limit,
            )),
        )
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route("/auth/protected", get(handlers::protected))
}
