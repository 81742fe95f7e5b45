//! OAuth account linking for the supported platforms
//!
//! Each platform has a small client that builds the provider's consent URL
//! and exchanges an authorization code for tokens plus a stable identity.
//! Clients are constructed from environment variables at startup; a platform
//! whose credentials are absent stays unconfigured and surfaces a
//! configuration error naming the missing variables when used.

mod facebook;
mod instagram;
mod tiktok;
mod youtube;

pub use facebook::FacebookOAuth;
pub use instagram::InstagramOAuth;
pub use tiktok::TikTokOAuth;
pub use youtube::YouTubeOAuth;

use crate::domain::models::Platform;
use chrono::{DateTime, Utc};

/// What a successful callback yields: tokens plus a stable external identity
#[derive(Debug, Clone)]
pub struct LinkedIdentity {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub account_name: String,
    pub account_identifier: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum OAuthError {
    Http(reqwest::Error),
    /// Error text returned by the provider, surfaced verbatim
    Provider(String),
    /// Missing client credentials, with a remediation hint
    Config(String),
}

impl std::fmt::Display for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthError::Http(e) => write!(f, "HTTP error: {}", e),
            OAuthError::Provider(e) => write!(f, "{}", e),
            OAuthError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Http(e)
    }
}

pub(crate) fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

/// Random state parameter for CSRF protection
pub(crate) fn generate_state() -> String {
    use base64::Engine;
    use rand::Rng;
    let bytes: [u8; 16] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// The browser lands on `{public_url}/{platform}-callback` after consent
pub(crate) fn redirect_uri(public_url: &str, platform: Platform) -> String {
    format!(
        "{}/{}-callback",
        public_url.trim_end_matches('/'),
        platform.as_str()
    )
}

fn config_error(platform: &str, vars: &str) -> OAuthError {
    OAuthError::Config(format!(
        "{} OAuth credentials are not configured. Set {} in the environment.",
        platform, vars
    ))
}

/// Per-platform OAuth clients, each present only when its credentials are set
#[derive(Clone, Default)]
pub struct OAuthClients {
    pub youtube: Option<YouTubeOAuth>,
    pub tiktok: Option<TikTokOAuth>,
    pub instagram: Option<InstagramOAuth>,
    pub facebook: Option<FacebookOAuth>,
}

impl OAuthClients {
    pub fn from_env(public_url: &str) -> Self {
        let pair = |id: &str, secret: &str| -> Option<(String, String)> {
            Some((std::env::var(id).ok()?, std::env::var(secret).ok()?))
        };

        Self {
            youtube: pair("YOUTUBE_CLIENT_ID", "YOUTUBE_CLIENT_SECRET")
                .map(|(id, secret)| YouTubeOAuth::new(&id, &secret, public_url)),
            tiktok: std::env::var("TIKTOK_CLIENT_KEY")
                .or_else(|_| std::env::var("TIKTOK_CLIENT_ID"))
                .ok()
                .zip(std::env::var("TIKTOK_CLIENT_SECRET").ok())
                .map(|(key, secret)| TikTokOAuth::new(&key, &secret, public_url)),
            instagram: pair("INSTAGRAM_APP_ID", "INSTAGRAM_APP_SECRET")
                .map(|(id, secret)| InstagramOAuth::new(&id, &secret, public_url)),
            facebook: pair("FACEBOOK_APP_ID", "FACEBOOK_APP_SECRET")
                .map(|(id, secret)| FacebookOAuth::new(&id, &secret, public_url)),
        }
    }

    /// Build the consent URL for a platform
    pub fn connect_url(&self, platform: Platform) -> Result<String, OAuthError> {
        match platform {
            Platform::Youtube => Ok(self
                .youtube
                .as_ref()
                .ok_or_else(|| {
                    config_error("YouTube", "YOUTUBE_CLIENT_ID and YOUTUBE_CLIENT_SECRET")
                })?
                .connect_url()),
            Platform::Tiktok => Ok(self
                .tiktok
                .as_ref()
                .ok_or_else(|| {
                    config_error("TikTok", "TIKTOK_CLIENT_KEY and TIKTOK_CLIENT_SECRET")
                })?
                .connect_url()),
            Platform::Instagram => Ok(self
                .instagram
                .as_ref()
                .ok_or_else(|| {
                    config_error("Instagram", "INSTAGRAM_APP_ID and INSTAGRAM_APP_SECRET")
                })?
                .connect_url()),
            Platform::Facebook => Ok(self
                .facebook
                .as_ref()
                .ok_or_else(|| {
                    config_error("Facebook", "FACEBOOK_APP_ID and FACEBOOK_APP_SECRET")
                })?
                .connect_url()),
        }
    }

    /// Exchange an authorization code and resolve the linked identity
    pub async fn callback(
        &self,
        platform: Platform,
        code: &str,
    ) -> Result<LinkedIdentity, OAuthError> {
        match platform {
            Platform::Youtube => {
                self.youtube
                    .as_ref()
                    .ok_or_else(|| {
                        config_error("YouTube", "YOUTUBE_CLIENT_ID and YOUTUBE_CLIENT_SECRET")
                    })?
                    .link(code)
                    .await
            }
            Platform::Tiktok => {
                self.tiktok
                    .as_ref()
                    .ok_or_else(|| {
                        config_error("TikTok", "TIKTOK_CLIENT_KEY and TIKTOK_CLIENT_SECRET")
                    })?
                    .link(code)
                    .await
            }
            Platform::Instagram => {
                self.instagram
                    .as_ref()
                    .ok_or_else(|| {
                        config_error("Instagram", "INSTAGRAM_APP_ID and INSTAGRAM_APP_SECRET")
                    })?
                    .link(code)
                    .await
            }
            Platform::Facebook => {
                self.facebook
                    .as_ref()
                    .ok_or_else(|| {
                        config_error("Facebook", "FACEBOOK_APP_ID and FACEBOOK_APP_SECRET")
                    })?
                    .link(code)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_handles_trailing_slash() {
        assert_eq!(
            redirect_uri("https://app.example.com/", Platform::Tiktok),
            "https://app.example.com/tiktok-callback"
        );
        assert_eq!(
            redirect_uri("https://app.example.com", Platform::Youtube),
            "https://app.example.com/youtube-callback"
        );
    }

    #[test]
    fn unconfigured_platform_names_its_env_vars() {
        let clients = OAuthClients::default();
        let err = clients.connect_url(Platform::Instagram).unwrap_err();
        match err {
            OAuthError::Config(msg) => {
                assert!(msg.contains("INSTAGRAM_APP_ID"));
                assert!(msg.contains("INSTAGRAM_APP_SECRET"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn state_values_are_unique() {
        assert_ne!(generate_state(), generate_state());
    }
}
