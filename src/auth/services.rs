use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{SigninRequest, SignupRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    db::{CreateUserError, User},
    error::ApiError,
};

#[derive(Debug)]
pub struct AuthOutcome {
    pub token: String,
    pub user: User,
}

/// Signup: uniqueness check, hash, persist, issue token. A concurrent signup
/// losing the race on the unique index gets the same conflict as a pre-check
/// hit.
pub async fn signup(
    db: &PgPool,
    keys: &JwtKeys,
    payload: SignupRequest,
) -> Result<AuthOutcome, ApiError> {
    let existing = User::find_by_email(db, &payload.email)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    if existing.is_some() {
        warn!(email = %payload.email, "signup for existing email");
        return Err(ApiError::Conflict);
    }

    // Argon2 is CPU-bound; keep it off the async workers.
    let password = payload.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(ApiError::Internal)?;

    let user = User::create(db, &payload.email, &payload.name, &hash)
        .await
        .map_err(|e| match e {
            CreateUserError::DuplicateEmail => {
                warn!(email = %payload.email, "signup lost unique-index race");
                ApiError::Conflict
            }
            CreateUserError::Other(e) => ApiError::Internal(e.into()),
        })?;

    let token = keys.sign(user.id, &user.email).map_err(ApiError::Internal)?;
    info!(user_id = %user.id, "user signed up");
    Ok(AuthOutcome { token, user })
}

/// Signin: lookup, compare, issue token. Unknown email and wrong password
/// are indistinguishable to the caller.
pub async fn signin(
    db: &PgPool,
    keys: &JwtKeys,
    payload: SigninRequest,
) -> Result<AuthOutcome, ApiError> {
    let user = User::find_by_email(db, &payload.email)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or_else(|| {
            warn!(email = %payload.email, "signin for unknown email");
            ApiError::InvalidCredentials
        })?;

    let password = payload.password;
    let stored_hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    if !ok {
        warn!(user_id = %user.id, "signin with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = keys.sign(user.id, &user.email).map_err(ApiError::Internal)?;
    info!(user_id = %user.id, "user signed in");
    Ok(AuthOutcome { token, user })
}
