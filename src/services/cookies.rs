//! Cookie building utilities for session management
//!
//! Centralizes cookie formatting so login, refresh and logout all set the
//! same attributes.

use axum::http::{HeaderValue, StatusCode};

pub mod config {
    pub const ACCESS_TOKEN_NAME: &str = "access_token";
    pub const REFRESH_TOKEN_NAME: &str = "refresh_token";
    /// Access token max-age in seconds (10 minutes)
    pub const ACCESS_TOKEN_MAX_AGE_SECS: u32 = 600;
    /// Refresh token max-age in seconds (30 days)
    pub const REFRESH_TOKEN_MAX_AGE_SECS: u32 = 30 * 24 * 60 * 60;
    pub const COOKIE_PATH: &str = "/";
}

fn is_dev() -> bool {
    std::env::var("ENV").as_deref() != Ok("prod")
}

fn cookie_same_site() -> &'static str {
    match std::env::var("COOKIE_SAMESITE")
        .unwrap_or_else(|_| "Lax".to_string())
        .to_lowercase()
        .as_str()
    {
        "none" => "None",
        "strict" => "Strict",
        _ => "Lax",
    }
}

fn build_cookie(name: &str, token: &str, max_age: u32) -> Result<HeaderValue, StatusCode> {
    let same_site = cookie_same_site();
    let secure = if is_dev() { "" } else { " Secure;" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite={}; Path={}; Max-Age={}",
        name,
        token,
        secure,
        same_site,
        config::COOKIE_PATH,
        max_age
    );
    cookie.parse().map_err(|_| {
        tracing::error!("Failed to parse {} cookie header", name);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Build an access token Set-Cookie header value
pub fn build_access_cookie(token: &str) -> Result<HeaderValue, StatusCode> {
    build_cookie(
        config::ACCESS_TOKEN_NAME,
        token,
        config::ACCESS_TOKEN_MAX_AGE_SECS,
    )
}

/// Build a refresh token Set-Cookie header value
pub fn build_refresh_cookie(token: &str) -> Result<HeaderValue, StatusCode> {
    build_cookie(
        config::REFRESH_TOKEN_NAME,
        token,
        config::REFRESH_TOKEN_MAX_AGE_SECS,
    )
}

fn build_clear_cookie(name: &str) -> HeaderValue {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path={}; Max-Age=0",
        name,
        config::COOKIE_PATH
    )
    .parse()
    .expect("static cookie string should always parse")
}

/// Build a Set-Cookie header to clear the access token
pub fn build_clear_access_cookie() -> HeaderValue {
    build_clear_cookie(config::ACCESS_TOKEN_NAME)
}

/// Build a Set-Cookie header to clear the refresh token
pub fn build_clear_refresh_cookie() -> HeaderValue {
    build_clear_cookie(config::REFRESH_TOKEN_NAME)
}
