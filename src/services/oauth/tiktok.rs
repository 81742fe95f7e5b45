//! TikTok OAuth client
//!
//! TikTok wraps both token and user-info responses in a `data` envelope and
//! identifies users by `open_id`.

use reqwest::Client;
use serde::Deserialize;

use super::{LinkedIdentity, OAuthError, generate_state, percent_encode, redirect_uri};
use crate::domain::models::Platform;

const SCOPES: &str = "user.info.basic,video.list";

#[derive(Clone)]
pub struct TikTokOAuth {
    client_key: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self, what: &str) -> Result<T, OAuthError> {
        if let Some(desc) = self.error_description {
            return Err(OAuthError::Provider(desc));
        }
        if let Some(error) = self.error {
            return Err(OAuthError::Provider(error));
        }
        self.data
            .ok_or_else(|| OAuthError::Provider(format!("Failed to get {}", what)))
    }
}

#[derive(Deserialize)]
struct TokenData {
    access_token: String,
    refresh_token: Option<String>,
    open_id: String,
}

#[derive(Deserialize)]
struct UserInfoData {
    user: UserInfo,
}

#[derive(Deserialize)]
struct UserInfo {
    display_name: Option<String>,
}

impl TikTokOAuth {
    pub fn new(client_key: &str, client_secret: &str, public_url: &str) -> Self {
        Self {
            client_key: client_key.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri(public_url, Platform::Tiktok),
            http: Client::new(),
        }
    }

    pub fn connect_url(&self) -> String {
        format!(
            "https://www.tiktok.com/v2/auth/authorize?client_key={}&scope={}&response_type=code&redirect_uri={}&state={}",
            percent_encode(&self.client_key),
            SCOPES,
            percent_encode(&self.redirect_uri),
            generate_state(),
        )
    }

    pub async fn link(&self, code: &str) -> Result<LinkedIdentity, OAuthError> {
        let params = [
            ("client_key", self.client_key.as_str()),
            ("client_secret", &self.client_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.redirect_uri),
        ];

        let tokens: Envelope<TokenData> = self
            .http
            .post("https://open.tiktok.com/v2/oauth/token/")
            .form(&params)
            .send()
            .await?
            .json()
            .await?;
        let tokens = tokens.into_data("access token")?;

        let user: Envelope<UserInfoData> = self
            .http
            .get("https://open.tiktok.com/v2/user/info/")
            .query(&[("fields", "open_id,union_id,avatar_url,display_name")])
            .bearer_auth(&tokens.access_token)
            .send()
            .await?
            .json()
            .await?;
        let user = user.into_data("user info")?;

        Ok(LinkedIdentity {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_expires_at: None,
            account_name: user
                .user
                .display_name
                .unwrap_or_else(|| "TikTok User".to_string()),
            account_identifier: tokens.open_id,
            metadata: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_url_carries_scopes_and_state() {
        let client = TikTokOAuth::new("key", "secret", "https://app.example.com");
        let url = client.connect_url();
        assert!(url.starts_with("https://www.tiktok.com/v2/auth/authorize?"));
        assert!(url.contains("scope=user.info.basic,video.list"));
        assert!(url.contains("&state="));
        assert!(url.contains("tiktok%2Dcallback"));
    }

    #[test]
    fn envelope_prefers_error_description() {
        let envelope: Envelope<TokenData> = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Code expired"}"#,
        )
        .unwrap();
        match envelope.into_data("access token") {
            Err(OAuthError::Provider(msg)) => assert_eq!(msg, "Code expired"),
            other => panic!("expected provider error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn envelope_without_data_is_an_error() {
        let envelope: Envelope<TokenData> = serde_json::from_str("{}").unwrap();
        assert!(envelope.into_data("access token").is_err());
    }
}
