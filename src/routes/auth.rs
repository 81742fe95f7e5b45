//! Authentication and session management endpoints

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::SET_COOKIE, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use crate::AppState;
use crate::domain::users::{self, User};
use crate::services::error::{ApiError, LogErr, bad_request, error_response, unauthorized};
use crate::services::{cookies, password, session};

pub fn routes() -> Router<Arc<AppState>> {
    // Rate limit auth endpoints to slow down credential stuffing
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_session))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
        .layer(rate_limit_layer)
}

/// Extractor that validates the access_token cookie and returns the user_id
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::error!("Cookie extraction error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        let access_token = jar
            .get(cookies::config::ACCESS_TOKEN_NAME)
            .map(|c| c.value())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let user_id = session::validate_access_token(access_token, &state.jwt_secret)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser(user_id))
    }
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

/// Issue both session cookies for a freshly authenticated user
async fn session_response(
    state: &AppState,
    user_id: i64,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let access_token = session::create_access_token(user_id, &state.jwt_secret)
        .log_500("Failed to create access token")?;
    let refresh_token = session::create_refresh_token(user_id, &state.db)
        .await
        .log_500("Failed to create refresh token")?;

    let mut response = status.into_response();
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_access_cookie(&access_token)
            .map_err(|s| error_response(s, "Internal server error"))?,
    );
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_refresh_cookie(&refresh_token)
            .map_err(|s| error_response(s, "Internal server error"))?,
    );
    Ok(response)
}

/// POST /auth/signup - Create an account and start a session
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(creds): Json<Credentials>,
) -> Result<Response, ApiError> {
    let email = creds.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(bad_request("A valid email address is required"));
    }
    if creds.password.len() < 8 {
        return Err(bad_request("Password must be at least 8 characters"));
    }

    let hash = password::hash_password(&creds.password).log_500("Failed to hash password")?;

    let user_id = match users::create_user(&state.db, &email, &hash).await {
        Ok(id) => id,
        Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
            return Err(error_response(
                StatusCode::CONFLICT,
                "An account with that email already exists",
            ));
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ));
        }
    };

    session_response(&state, user_id, StatusCode::CREATED).await
}

/// POST /auth/login - Verify credentials and start a session
async fn login(
    State(state): State<Arc<AppState>>,
    Json(creds): Json<Credentials>,
) -> Result<Response, ApiError> {
    let email = creds.email.trim().to_lowercase();

    let found = users::get_credentials_by_email(&state.db, &email)
        .await
        .log_500("Failed to look up credentials")?;

    // Same response whether the email is unknown or the password is wrong
    let Some((user_id, hash)) = found else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
        ));
    };
    if !password::verify_password(&creds.password, &hash) {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
        ));
    }

    session_response(&state, user_id, StatusCode::NO_CONTENT).await
}

/// POST /auth/refresh - Rotate the refresh token and issue a new access token
async fn refresh_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let old_refresh_token = jar
        .get(cookies::config::REFRESH_TOKEN_NAME)
        .map(|c| c.value().to_string())
        .ok_or_else(unauthorized)?;

    // Atomic rotation: invalid or reused tokens are expected, not logged
    let (user_id, new_refresh_token) = session::rotate_refresh_token(&old_refresh_token, &state.db)
        .await
        .map_err(|_| unauthorized())?;

    let access_token = session::create_access_token(user_id, &state.jwt_secret)
        .log_500("Failed to create access token")?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_access_cookie(&access_token)
            .map_err(|s| error_response(s, "Internal server error"))?,
    );
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_refresh_cookie(&new_refresh_token)
            .map_err(|s| error_response(s, "Internal server error"))?,
    );
    Ok(response)
}

/// POST /auth/logout - Revoke the refresh token and clear cookies
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(refresh_token) = jar.get(cookies::config::REFRESH_TOKEN_NAME) {
        if let Err(e) = session::revoke_refresh_token(refresh_token.value(), &state.db).await {
            // User is still logged out client-side
            tracing::warn!("Failed to revoke refresh token during logout: {}", e);
        }
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_clear_access_cookie());
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_clear_refresh_cookie());

    response
}

/// GET /auth/me - Current user info (validates session)
async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = users::get_user_by_id(&state.db, user_id)
        .await
        .log_500("Get user by ID error")?;

    // A valid JWT for a deleted user is still unauthorized
    user.map(Json).ok_or_else(unauthorized)
}
