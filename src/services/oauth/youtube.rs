//! YouTube (Google) OAuth client

use reqwest::Client;
use serde::Deserialize;

use super::{LinkedIdentity, OAuthError, percent_encode, redirect_uri};
use crate::domain::models::Platform;

const SCOPES: &str = "https://www.googleapis.com/auth/youtube.readonly https://www.googleapis.com/auth/youtube.upload";

#[derive(Clone)]
pub struct YouTubeOAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

/// Success and error bodies share this shape; Google's error responses
/// carry no `access_token`, so every field is optional until checked.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self) -> Result<(String, Option<String>), OAuthError> {
        if let Some(error) = self.error {
            return Err(OAuthError::Provider(
                self.error_description.unwrap_or(error),
            ));
        }
        let access_token = self.access_token.ok_or_else(|| {
            OAuthError::Provider("Google did not return an access token".to_string())
        })?;
        Ok((access_token, self.refresh_token))
    }
}

#[derive(Deserialize)]
struct ChannelList {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Deserialize)]
struct Channel {
    id: String,
    snippet: ChannelSnippet,
}

#[derive(Deserialize)]
struct ChannelSnippet {
    title: String,
}

impl YouTubeOAuth {
    pub fn new(client_id: &str, client_secret: &str, public_url: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri(public_url, Platform::Youtube),
            http: Client::new(),
        }
    }

    /// Consent URL. `access_type=offline` + `prompt=consent` so Google issues
    /// a refresh token on every link.
    pub fn connect_url(&self) -> String {
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            percent_encode(&self.client_id),
            percent_encode(&self.redirect_uri),
            percent_encode(SCOPES),
        )
    }

    /// Exchange the code and resolve the user's channel identity
    pub async fn link(&self, code: &str) -> Result<LinkedIdentity, OAuthError> {
        let params = [
            ("code", code),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let tokens: TokenResponse = self
            .http
            .post("https://oauth2.googleapis.com/token")
            .form(&params)
            .send()
            .await?
            .json()
            .await?;

        let (access_token, refresh_token) = tokens.into_tokens()?;

        let channels: ChannelList = self
            .http
            .get("https://www.googleapis.com/youtube/v3/channels?part=snippet&mine=true")
            .bearer_auth(&access_token)
            .send()
            .await?
            .json()
            .await?;

        let channel = channels.items.into_iter().next().ok_or_else(|| {
            OAuthError::Provider("No YouTube channel found for this Google account".to_string())
        })?;

        Ok(LinkedIdentity {
            access_token,
            refresh_token,
            token_expires_at: None,
            account_name: channel.snippet.title,
            account_identifier: channel.id,
            metadata: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_url_carries_scopes_and_offline_access() {
        let client = YouTubeOAuth::new("cid", "secret", "https://app.example.com");
        let url = client.connect_url();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("youtube%2Eupload"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("youtube%2Dcallback"));
    }

    #[test]
    fn token_error_body_surfaces_provider_reason() {
        let body = r#"{"error":"invalid_grant","error_description":"Code expired"}"#;
        let tokens: TokenResponse = serde_json::from_str(body).unwrap();
        match tokens.into_tokens() {
            Err(OAuthError::Provider(msg)) => assert_eq!(msg, "Code expired"),
            other => panic!("expected provider error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn token_error_without_description_falls_back_to_code() {
        let body = r#"{"error":"invalid_grant"}"#;
        let tokens: TokenResponse = serde_json::from_str(body).unwrap();
        match tokens.into_tokens() {
            Err(OAuthError::Provider(msg)) => assert_eq!(msg, "invalid_grant"),
            other => panic!("expected provider error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn token_success_body_yields_tokens() {
        let body = r#"{"access_token":"at","refresh_token":"rt"}"#;
        let tokens: TokenResponse = serde_json::from_str(body).unwrap();
        let (access, refresh) = tokens.into_tokens().unwrap();
        assert_eq!(access, "at");
        assert_eq!(refresh.as_deref(), Some("rt"));
    }
}
