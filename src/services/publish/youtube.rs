//! YouTube publisher: resumable video upload plus metadata search and edit

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{PublishError, PublishJob, PublishSuccess, Publisher, RemoteVideo};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_INIT_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?part=snippet,status&uploadType=resumable";
const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

#[derive(Clone)]
pub struct YouTubePublisher {
    client_id: String,
    client_secret: String,
    http: Client,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct UploadedVideo {
    id: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Deserialize)]
struct SearchSnippet {
    title: String,
}

#[derive(Deserialize)]
struct VideoList {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    snippet: serde_json::Value,
}

impl YouTubePublisher {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            http: Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            &std::env::var("YOUTUBE_CLIENT_ID").unwrap_or_default(),
            &std::env::var("YOUTUBE_CLIENT_SECRET").unwrap_or_default(),
        )
    }

    /// Best-effort token refresh. Failures are logged and the stored access
    /// token is used as-is; the refreshed token is not persisted.
    async fn current_access_token(&self, access_token: &str, refresh_token: Option<&str>) -> String {
        let Some(refresh_token) = refresh_token else {
            return access_token.to_string();
        };

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", &self.client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let refreshed = async {
            let resp: RefreshResponse = self
                .http
                .post(TOKEN_URL)
                .form(&params)
                .send()
                .await?
                .json()
                .await?;
            Ok::<_, reqwest::Error>(resp.access_token)
        }
        .await;

        match refreshed {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::warn!("YouTube token refresh returned no access token");
                access_token.to_string()
            }
            Err(e) => {
                tracing::warn!("YouTube token refresh failed: {}", e);
                access_token.to_string()
            }
        }
    }
}

#[async_trait]
impl Publisher for YouTubePublisher {
    async fn publish(&self, job: &PublishJob) -> Result<PublishSuccess, PublishError> {
        let token = self
            .current_access_token(&job.access_token, job.refresh_token.as_deref())
            .await;

        // Fetch the stored media so we know its size for the resumable init
        let media_resp = self.http.get(&job.media_url).send().await?;
        if !media_resp.status().is_success() {
            return Err(PublishError::Api(format!(
                "Failed to download media: {}",
                media_resp.status()
            )));
        }
        let content_type = media_resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let media = media_resp.bytes().await?;

        let metadata = json!({
            "snippet": {
                "title": job.title,
                "description": job.description,
                "categoryId": "22",
            },
            "status": {
                "privacyStatus": "public",
            },
        });

        let init_resp = self
            .http
            .post(UPLOAD_INIT_URL)
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", &content_type)
            .header("X-Upload-Content-Length", media.len().to_string())
            .json(&metadata)
            .send()
            .await?;

        if !init_resp.status().is_success() {
            let text = init_resp.text().await?;
            return Err(PublishError::Api(format!(
                "YouTube upload initialization failed: {}",
                text
            )));
        }

        let location = init_resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| PublishError::Api("No upload URL provided by YouTube".to_string()))?
            .to_string();

        let upload_resp = self
            .http
            .put(&location)
            .header(reqwest::header::CONTENT_TYPE, &content_type)
            .body(media)
            .send()
            .await?;

        if !upload_resp.status().is_success() {
            let text = upload_resp.text().await?;
            return Err(PublishError::Api(format!("YouTube upload failed: {}", text)));
        }

        let video: UploadedVideo = upload_resp.json().await?;
        let url = format!("https://www.youtube.com/watch?v={}", video.id);
        Ok(PublishSuccess {
            external_id: video.id,
            url,
        })
    }

    async fn find_by_title(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        channel_id: Option<&str>,
        title: &str,
    ) -> Result<Option<RemoteVideo>, PublishError> {
        let token = self.current_access_token(access_token, refresh_token).await;

        let mut query = vec![
            ("part", "snippet".to_string()),
            ("maxResults", "5".to_string()),
            ("type", "video".to_string()),
            ("q", title.to_string()),
        ];
        if let Some(channel_id) = channel_id {
            query.push(("channelId", channel_id.to_string()));
        }

        let resp = self
            .http
            .get(SEARCH_URL)
            .query(&query)
            .bearer_auth(&token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(PublishError::Api(format!("YouTube search failed: {}", text)));
        }

        let results: SearchResponse = resp.json().await?;
        // Search is fuzzy; insist on an exact title match
        Ok(results
            .items
            .into_iter()
            .find(|item| item.snippet.title == title)
            .map(|item| RemoteVideo {
                external_id: item.id.video_id,
                title: item.snippet.title,
            }))
    }

    async fn edit(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        external_id: &str,
        title: &str,
        description: &str,
    ) -> Result<(), PublishError> {
        let token = self.current_access_token(access_token, refresh_token).await;

        // Fetch the current snippet so fields we don't touch are preserved
        let resp = self
            .http
            .get(VIDEOS_URL)
            .query(&[("part", "snippet"), ("id", external_id)])
            .bearer_auth(&token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(PublishError::Api(format!(
                "Failed to get video data: {}",
                text
            )));
        }

        let videos: VideoList = resp.json().await?;
        let mut snippet = videos
            .items
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::Api("Video not found".to_string()))?
            .snippet;

        if let Some(obj) = snippet.as_object_mut() {
            obj.insert("title".to_string(), json!(title));
            obj.insert("description".to_string(), json!(description));
        }

        let update_resp = self
            .http
            .put(VIDEOS_URL)
            .query(&[("part", "snippet")])
            .bearer_auth(&token)
            .json(&json!({ "id": external_id, "snippet": snippet }))
            .send()
            .await?;

        if !update_resp.status().is_success() {
            let text = update_resp.text().await?;
            return Err(PublishError::Api(format!(
                "YouTube video update failed: {}",
                text
            )));
        }

        Ok(())
    }
}
