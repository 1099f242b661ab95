use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::{
    auth::{
        cookie,
        dto::{MessageResponse, SigninRequest, SignupRequest, UserResponse},
        extractors::{AuthUser, ValidJson},
        jwt::JwtKeys,
        services,
    },
    db::AppState,
    error::ApiError,
};

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidJson(payload): ValidJson<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<UserResponse>), ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let outcome = services::signup(&state.db, &keys, payload).await?;

    let jar = jar.add(cookie::session_cookie(&state.config, &headers, outcome.token));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(UserResponse {
            user: (&outcome.user).into(),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn signin(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidJson(payload): ValidJson<SigninRequest>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let outcome = services::signin(&state.db, &keys, payload).await?;

    let jar = jar.add(cookie::session_cookie(&state.config, &headers, outcome.token));
    Ok((
        jar,
        Json(UserResponse {
            user: (&outcome.user).into(),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.add(cookie::clear_cookie(&state.config, &headers));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}

#[instrument(skip_all)]
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        user: (&user).into(),
    })
}

#[instrument(skip_all)]
pub async fn protected(AuthUser(_user): AuthUser) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "This is a protected route",
    })
}
