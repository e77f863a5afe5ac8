use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{TokenRequest, TokenResponse, UserRequest, UserResponse},
    repo::{is_unique_violation, NewUserRow, User},
    services::{normalize_email, validate_user},
};
use crate::{
    auth::{
        password::{hash_password, verify_password},
        AuthUser, JwtKeys,
    },
    error::{AppError, AppResult, NON_FIELD_ERRORS},
    json::ValidJson,
    state::AppState,
};

const EMAIL_TAKEN: &str = "user with this email already exists.";
const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/create", post(create_user))
        .route("/user/token", post(create_token))
        .route("/user/me", get(get_me).put(put_me).patch(patch_me))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let changes = validate_user(payload, true).map_err(AppError::Validation)?;
    let (Some(email), Some(name), Some(password)) = (changes.email, changes.name, changes.password)
    else {
        return Err(AppError::field(NON_FIELD_ERRORS, "Incomplete user payload."));
    };

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::field("email", EMAIL_TAKEN));
    }

    let hash = hash_password(&password)?;
    let row = NewUserRow {
        email: &email,
        name: &name,
        password_hash: &hash,
        is_staff: false,
        is_superuser: false,
    };
    let user = match User::create(&state.db, &row).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %email, "email registered concurrently");
            return Err(AppError::field("email", EMAIL_TAKEN));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(e.into());
        }
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn create_token(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let email = normalize_email(&payload.email);
    let rejected = || AppError::field(NON_FIELD_ERRORS, BAD_CREDENTIALS);

    if email.is_empty() || payload.password.is_empty() {
        warn!("token requested with blank credentials");
        return Err(rejected());
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "token requested for unknown email");
        return Err(rejected());
    };

    if !user.is_active || !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "token requested with invalid password");
        return Err(rejected());
    }

    let token = JwtKeys::from_ref(&state).sign(user.id)?;
    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserResponse>> {
    let user = User::find_by_id(&state.db, user_id).await?.ok_or_else(|| {
        warn!(user_id = %user_id, "token for missing user");
        AppError::Unauthorized
    })?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn put_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<UserRequest>,
) -> AppResult<Json<UserResponse>> {
    update_me(&state, user_id, payload, true).await
}

#[instrument(skip(state, payload))]
pub async fn patch_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<UserRequest>,
) -> AppResult<Json<UserResponse>> {
    update_me(&state, user_id, payload, false).await
}

async fn update_me(
    state: &AppState,
    user_id: uuid::Uuid,
    payload: UserRequest,
    require_all: bool,
) -> AppResult<Json<UserResponse>> {
    let changes = validate_user(payload, require_all).map_err(AppError::Validation)?;

    if let Some(email) = &changes.email {
        if let Some(other) = User::find_by_email(&state.db, email).await? {
            if other.id != user_id {
                return Err(AppError::field("email", EMAIL_TAKEN));
            }
        }
    }

    let hash = changes.password.as_deref().map(hash_password).transpose()?;
    let updated = User::update(
        &state.db,
        user_id,
        changes.email.as_deref(),
        changes.name.as_deref(),
        hash.as_deref(),
    )
    .await;

    let user = match updated {
        Ok(Some(u)) => u,
        Ok(None) => return Err(AppError::Unauthorized),
        Err(e) if is_unique_violation(&e) => return Err(AppError::field("email", EMAIL_TAKEN)),
        Err(e) => return Err(e.into()),
    };
    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}
