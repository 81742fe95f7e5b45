//! Platform OAuth linking endpoints
//!
//! `connect` hands the frontend the provider's consent URL; the provider
//! redirects the browser back to `/{platform}-callback`, whose page posts the
//! code (or the provider's error) here to finish the link.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use crate::AppState;
use crate::domain::accounts;
use crate::domain::models::{Platform, PlatformAccount};
use crate::routes::auth::AuthUser;
use crate::services::error::{ApiError, LogErr, bad_request, error_response};
use crate::services::oauth::OAuthError;

pub fn routes() -> Router<Arc<AppState>> {
    // Keep code-exchange traffic well under provider rate limits
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(5)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/platforms/{platform}/connect", get(connect))
        .route("/platforms/{platform}/callback", post(callback))
        .layer(rate_limit_layer)
}

fn parse_platform(platform: &str) -> Result<Platform, ApiError> {
    Platform::from_id(platform)
        .ok_or_else(|| bad_request(format!("Unknown platform: {}", platform)))
}

fn oauth_error_response(e: OAuthError) -> ApiError {
    match e {
        // Provider and config errors carry user-actionable text
        OAuthError::Provider(_) | OAuthError::Config(_) => {
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
        OAuthError::Http(inner) => {
            tracing::error!("OAuth HTTP error: {}", inner);
            error_response(StatusCode::BAD_GATEWAY, "Failed to reach the provider")
        }
    }
}

#[derive(Serialize)]
struct ConnectResponse {
    url: String,
}

/// GET /platforms/{platform}/connect - Provider consent URL
async fn connect(
    State(state): State<Arc<AppState>>,
    AuthUser(_user_id): AuthUser,
    Path(platform): Path<String>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let platform = parse_platform(&platform)?;
    let url = state
        .oauth
        .connect_url(platform)
        .map_err(oauth_error_response)?;
    Ok(Json(ConnectResponse { url }))
}

#[derive(Deserialize)]
struct CallbackRequest {
    code: Option<String>,
    /// Set when the provider redirected back with a consent failure
    error: Option<String>,
}

/// Resolve the callback payload to a code. A provider error wins over a code
/// and carries the provider's reason; both checks run before any exchange or
/// write.
fn extract_code(platform: Platform, req: CallbackRequest) -> Result<String, ApiError> {
    if let Some(error) = req.error {
        return Err(bad_request(format!("{} authorization failed: {}", platform, error)));
    }
    req.code.ok_or_else(|| bad_request("No code provided"))
}

/// POST /platforms/{platform}/callback - Finish linking an account
///
/// A provider error aborts before any token exchange; nothing is written.
async fn callback(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(platform): Path<String>,
    Json(req): Json<CallbackRequest>,
) -> Result<(StatusCode, Json<PlatformAccount>), ApiError> {
    let platform = parse_platform(&platform)?;
    let code = extract_code(platform, req)?;

    let identity = state
        .oauth
        .callback(platform, &code)
        .await
        .map_err(oauth_error_response)?;

    let account = accounts::upsert_account(&state.db, user_id, platform.as_str(), &identity)
        .await
        .log_500("Failed to store linked account")?;

    Ok((StatusCode::CREATED, Json(account)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_aborts_with_its_reason() {
        let req = CallbackRequest {
            code: Some("abc".to_string()),
            error: Some("access_denied".to_string()),
        };
        let (status, body) = extract_code(Platform::Youtube, req).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0.error.contains("access_denied"));
    }

    #[test]
    fn missing_code_is_rejected() {
        let req = CallbackRequest {
            code: None,
            error: None,
        };
        let (status, body) = extract_code(Platform::Tiktok, req).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0.error, "No code provided");
    }

    #[test]
    fn code_passes_through() {
        let req = CallbackRequest {
            code: Some("abc".to_string()),
            error: None,
        };
        assert_eq!(extract_code(Platform::Facebook, req).unwrap(), "abc");
    }
}
