use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{cookie::SESSION_COOKIE, dto::ValidateDto, jwt::JwtKeys},
    db::{AppState, User},
    error::ApiError,
};

/// Candidate session token: the named cookie wins, then `Authorization:
/// Bearer`. The order is fixed because some clients send both.
pub(crate) fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

/// Deserializes and validates a request body in one step, so handlers only
/// see well-formed, normalized payloads.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + ValidateDto,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(vec![rejection.body_text()]))?;
        payload.normalize();
        payload.validate()?;
        Ok(ValidJson(payload))
    }
}

/// Route guard. Extracts and verifies the session token, then re-fetches the
/// user so a deleted account is rejected immediately. Every failure mode
/// presents the same generic 401; the sub-reason only goes to the log.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or_else(|| {
            warn!("no session token in cookie or Authorization header");
            ApiError::Unauthorized
        })?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|e| {
            warn!(error = %e, "session token rejected");
            ApiError::Unauthorized
        })?;

        let user = find_live_user(state, claims.sub).await?;
        Ok(AuthUser(user))
    }
}

async fn find_live_user(state: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    match User::find_by_id(&state.db, user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            warn!(user_id = %user_id, "token subject no longer exists");
            Err(ApiError::Unauthorized)
        }
        Err(e) => Err(ApiError::Internal(e.into())),
    }
}
