//! Row models shared across the domain layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External platforms a user can link accounts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Tiktok,
    Instagram,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Youtube,
        Platform::Tiktok,
        Platform::Instagram,
        Platform::Facebook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }

    pub fn from_id(id: &str) -> Option<Platform> {
        match id {
            "youtube" => Some(Platform::Youtube),
            "tiktok" => Some(Platform::Tiktok),
            "instagram" => Some(Platform::Instagram),
            "facebook" => Some(Platform::Facebook),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A linked external account. One row per (user, platform, external account id).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PlatformAccount {
    pub id: Uuid,
    pub user_id: i64,
    pub platform_id: String,
    pub account_name: String,
    pub account_identifier: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Media,
    Text,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Media => "media",
            PostType::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Option<PostType> {
        match s {
            "media" => Some(PostType::Media),
            "text" => Some(PostType::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
        }
    }
}

/// A composed post. `platforms` is the distinct set of platform ids across
/// the accounts in `account_ids`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub media_urls: Vec<String>,
    pub post_type: String,
    pub platforms: Vec<String>,
    pub account_ids: Vec<Uuid>,
    pub status: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
