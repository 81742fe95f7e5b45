//! Publishing capability per platform
//!
//! A [`Publisher`] turns stored media plus account credentials into a live
//! post on the external platform. Platforms without a publish integration get
//! the [`NullPublisher`], which declines up front so the fan-out can report a
//! clean "not supported" instead of a provider failure.

pub mod orchestrator;
pub mod reporter;
mod youtube;

pub use youtube::YouTubePublisher;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::models::Platform;

/// Everything a publisher needs for one destination
#[derive(Debug, Clone)]
pub struct PublishJob {
    pub media_url: String,
    pub title: String,
    pub description: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PublishSuccess {
    pub external_id: String,
    pub url: String,
}

/// A video already published on the platform, as found by title search
#[derive(Debug, Clone)]
pub struct RemoteVideo {
    pub external_id: String,
    pub title: String,
}

#[derive(Debug)]
pub enum PublishError {
    Http(reqwest::Error),
    Api(String),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Http(e) => write!(f, "HTTP error: {}", e),
            PublishError::Api(e) => write!(f, "{}", e),
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        PublishError::Http(e)
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Whether this platform can receive published media at all
    fn supports_publish(&self) -> bool {
        true
    }

    /// Push the media to the platform and return its external id and URL
    async fn publish(&self, job: &PublishJob) -> Result<PublishSuccess, PublishError>;

    /// Look up an already-published video by exact title
    async fn find_by_title(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        channel_id: Option<&str>,
        title: &str,
    ) -> Result<Option<RemoteVideo>, PublishError>;

    /// Update title and description of a published video
    async fn edit(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        external_id: &str,
        title: &str,
        description: &str,
    ) -> Result<(), PublishError>;
}

/// Placeholder for platforms without a publish integration
pub struct NullPublisher {
    platform: Platform,
}

impl NullPublisher {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Publisher for NullPublisher {
    fn supports_publish(&self) -> bool {
        false
    }

    async fn publish(&self, _job: &PublishJob) -> Result<PublishSuccess, PublishError> {
        Err(PublishError::Api(format!(
            "Publishing to {} is not supported yet",
            self.platform
        )))
    }

    async fn find_by_title(
        &self,
        _access_token: &str,
        _refresh_token: Option<&str>,
        _channel_id: Option<&str>,
        _title: &str,
    ) -> Result<Option<RemoteVideo>, PublishError> {
        Ok(None)
    }

    async fn edit(
        &self,
        _access_token: &str,
        _refresh_token: Option<&str>,
        _external_id: &str,
        _title: &str,
        _description: &str,
    ) -> Result<(), PublishError> {
        Err(PublishError::Api(format!(
            "Editing on {} is not supported yet",
            self.platform
        )))
    }
}

/// Maps platform ids to their publisher implementation
#[derive(Clone)]
pub struct PublisherRegistry {
    publishers: HashMap<String, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self {
            publishers: HashMap::new(),
        }
    }

    /// Registry with the production wiring: a real YouTube publisher, nulls
    /// for the rest
    pub fn from_env() -> Self {
        let mut registry = Self::new();
        registry.register(Platform::Youtube, Arc::new(YouTubePublisher::from_env()));
        for platform in [Platform::Tiktok, Platform::Instagram, Platform::Facebook] {
            registry.register(platform, Arc::new(NullPublisher::new(platform)));
        }
        registry
    }

    pub fn register(&mut self, platform: Platform, publisher: Arc<dyn Publisher>) {
        self.publishers
            .insert(platform.as_str().to_string(), publisher);
    }

    pub fn get(&self, platform_id: &str) -> Option<&Arc<dyn Publisher>> {
        self.publishers.get(platform_id)
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::new()
    }
}
