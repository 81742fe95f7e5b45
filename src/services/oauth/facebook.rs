//! Facebook OAuth client
//!
//! Requests page-management scopes, then exchanges the user token for a
//! long-lived one via `fb_exchange_token`. The account email rides along in
//! metadata.

use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{LinkedIdentity, OAuthError, generate_state, percent_encode, redirect_uri};
use crate::domain::models::Platform;

const SCOPES: &str = "email,pages_show_list,pages_read_engagement,pages_manage_posts,public_profile";
const GRAPH_BASE: &str = "https://graph.facebook.com";

#[derive(Clone)]
pub struct FacebookOAuth {
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    http: Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<GraphError>,
}

#[derive(Deserialize)]
struct Profile {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    error: Option<GraphError>,
}

#[derive(Deserialize)]
struct GraphError {
    message: String,
}

impl FacebookOAuth {
    pub fn new(app_id: &str, app_secret: &str, public_url: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            redirect_uri: redirect_uri(public_url, Platform::Facebook),
            http: Client::new(),
        }
    }

    pub fn connect_url(&self) -> String {
        format!(
            "https://www.facebook.com/v17.0/dialog/oauth?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}",
            percent_encode(&self.app_id),
            percent_encode(&self.redirect_uri),
            SCOPES,
            generate_state(),
        )
    }

    pub async fn link(&self, code: &str) -> Result<LinkedIdentity, OAuthError> {
        let tokens: TokenResponse = self
            .http
            .get(format!("{}/v17.0/oauth/access_token", GRAPH_BASE))
            .query(&[
                ("client_id", self.app_id.as_str()),
                ("client_secret", &self.app_secret),
                ("redirect_uri", &self.redirect_uri),
                ("code", code),
            ])
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = tokens.error {
            return Err(OAuthError::Provider(error.message));
        }
        let access_token = tokens.access_token.ok_or_else(|| {
            OAuthError::Provider("Failed to get Facebook access token".to_string())
        })?;

        let profile: Profile = self
            .http
            .get(format!("{}/me", GRAPH_BASE))
            .query(&[("fields", "id,name,email"), ("access_token", &access_token)])
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = profile.error {
            return Err(OAuthError::Provider(error.message));
        }
        let (id, name) = match (profile.id, profile.name) {
            (Some(id), Some(name)) => (id, name),
            _ => {
                return Err(OAuthError::Provider(
                    "Facebook profile response missing id or name".to_string(),
                ));
            }
        };

        // Best-effort upgrade to a long-lived token
        let (access_token, token_expires_at) = match self.exchange_long_lived(&access_token).await {
            Ok((token, expires_at)) => (token, expires_at),
            Err(e) => {
                tracing::warn!("Facebook long-lived token exchange failed: {}", e);
                (access_token, None)
            }
        };

        Ok(LinkedIdentity {
            access_token,
            refresh_token: None,
            token_expires_at,
            account_name: name,
            account_identifier: id,
            metadata: Some(json!({ "email": profile.email })),
        })
    }

    async fn exchange_long_lived(
        &self,
        access_token: &str,
    ) -> Result<(String, Option<chrono::DateTime<Utc>>), OAuthError> {
        let resp: TokenResponse = self
            .http
            .get(format!("{}/v17.0/oauth/access_token", GRAPH_BASE))
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", &self.app_id),
                ("client_secret", &self.app_secret),
                ("fb_exchange_token", access_token),
            ])
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = resp.error {
            return Err(OAuthError::Provider(error.message));
        }
        let token = resp.access_token.ok_or_else(|| {
            OAuthError::Provider("Facebook did not return a long-lived token".to_string())
        })?;
        let expires_at = resp.expires_in.map(|secs| Utc::now() + Duration::seconds(secs));
        Ok((token, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_url_carries_page_scopes_and_state() {
        let client = FacebookOAuth::new("app", "secret", "https://app.example.com");
        let url = client.connect_url();
        assert!(url.starts_with("https://www.facebook.com/v17.0/dialog/oauth?"));
        assert!(url.contains("pages_manage_posts"));
        assert!(url.contains("&state="));
        assert!(url.contains("facebook%2Dcallback"));
    }
}
