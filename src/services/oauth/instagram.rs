//! Instagram OAuth client
//!
//! The short-lived token from the code exchange is swapped for a long-lived
//! one before linking; Instagram long-lived tokens carry an expiry.

use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{LinkedIdentity, OAuthError, percent_encode, redirect_uri};
use crate::domain::models::Platform;

const SCOPES: &str = "user_profile,user_media";

#[derive(Clone)]
pub struct InstagramOAuth {
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    http: Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct LongLivedTokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct Profile {
    username: Option<String>,
    error: Option<GraphError>,
}

#[derive(Deserialize)]
struct GraphError {
    message: String,
}

impl InstagramOAuth {
    pub fn new(app_id: &str, app_secret: &str, public_url: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            redirect_uri: redirect_uri(public_url, Platform::Instagram),
            http: Client::new(),
        }
    }

    pub fn connect_url(&self) -> String {
        format!(
            "https://api.instagram.com/oauth/authorize?client_id={}&redirect_uri={}&scope={}&response_type=code",
            percent_encode(&self.app_id),
            percent_encode(&self.redirect_uri),
            SCOPES,
        )
    }

    pub async fn link(&self, code: &str) -> Result<LinkedIdentity, OAuthError> {
        let params = [
            ("client_id", self.app_id.as_str()),
            ("client_secret", &self.app_secret),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.redirect_uri),
            ("code", code),
        ];

        let tokens: TokenResponse = self
            .http
            .post("https://api.instagram.com/oauth/access_token")
            .form(&params)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = tokens.error {
            return Err(OAuthError::Provider(
                tokens.error_description.unwrap_or(error),
            ));
        }
        let short_lived = tokens.access_token.ok_or_else(|| {
            OAuthError::Provider("Failed to get Instagram access token".to_string())
        })?;
        // user_id comes back as a JSON number
        let user_id = match tokens.user_id {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) => s,
            _ => {
                return Err(OAuthError::Provider(
                    "Instagram token response missing user_id".to_string(),
                ));
            }
        };

        // Swap for a long-lived token; fall back to the short-lived one
        let (access_token, token_expires_at) = match self.exchange_long_lived(&short_lived).await {
            Ok(exchanged) => exchanged,
            Err(e) => {
                tracing::warn!("Instagram long-lived token exchange failed: {}", e);
                (short_lived, None)
            }
        };

        let profile: Profile = self
            .http
            .get("https://graph.instagram.com/me")
            .query(&[("fields", "id,username"), ("access_token", &access_token)])
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = profile.error {
            return Err(OAuthError::Provider(error.message));
        }

        let account_name = profile
            .username
            .unwrap_or_else(|| fallback_account_name(&user_id));

        Ok(LinkedIdentity {
            access_token,
            refresh_token: None,
            token_expires_at,
            account_name,
            account_identifier: user_id,
            metadata: None,
        })
    }

    async fn exchange_long_lived(
        &self,
        short_lived: &str,
    ) -> Result<(String, Option<chrono::DateTime<Utc>>), OAuthError> {
        let resp: LongLivedTokenResponse = self
            .http
            .get("https://graph.instagram.com/access_token")
            .query(&[
                ("grant_type", "ig_exchange_token"),
                ("client_secret", &self.app_secret),
                ("access_token", short_lived),
            ])
            .send()
            .await?
            .json()
            .await?;

        let token = resp.access_token.ok_or_else(|| {
            OAuthError::Provider("Instagram did not return a long-lived token".to_string())
        })?;
        let expires_at = resp.expires_in.map(|secs| Utc::now() + Duration::seconds(secs));
        Ok((token, expires_at))
    }
}

/// Display name when the profile has no username. Char-wise prefix, since
/// the user id is provider-controlled text.
fn fallback_account_name(user_id: &str) -> String {
    let prefix: String = user_id.chars().take(5).collect();
    format!("Instagram User {}", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_url_carries_scope() {
        let client = InstagramOAuth::new("app", "secret", "https://app.example.com");
        let url = client.connect_url();
        assert!(url.starts_with("https://api.instagram.com/oauth/authorize?"));
        assert!(url.contains("scope=user_profile,user_media"));
        assert!(url.contains("instagram%2Dcallback"));
    }

    #[test]
    fn fallback_name_truncates_by_characters() {
        assert_eq!(fallback_account_name("1234567890"), "Instagram User 12345");
        assert_eq!(fallback_account_name("ab"), "Instagram User ab");
        // multibyte ids must not split inside a character
        assert_eq!(fallback_account_name("üñîçødé"), "Instagram User üñîçø");
    }
}
