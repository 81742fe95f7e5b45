//! Post submission pipeline
//!
//! Validate the draft, write the post row ahead of any external effect,
//! store the media, fan publish attempts out across the capable
//! destinations, then promote the row to its final status. One destination's
//! failure never cancels another's attempt; the caller gets the full
//! per-destination result list plus aggregate counts.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::reporter::UploadReporter;
use super::{PublishJob, PublisherRegistry};
use crate::constants::{MAX_IMAGE_SIZE, MAX_VIDEO_SIZE};
use crate::domain::models::{Platform, PlatformAccount, Post, PostStatus, PostType};
use crate::domain::posts;
use crate::storage::MediaStore;

#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub data: bytes::Bytes,
}

impl MediaFile {
    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }
}

/// A post as submitted, before any side effect
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub caption: String,
    pub post_type: PostType,
    pub media: Option<MediaFile>,
    pub account_ids: Vec<Uuid>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum SubmitError {
    /// Rejected before any side effect
    Validation(String),
    Storage(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Validation(msg) => write!(f, "{}", msg),
            SubmitError::Storage(msg) => write!(f, "Media upload failed: {}", msg),
            SubmitError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl From<sqlx::Error> for SubmitError {
    fn from(e: sqlx::Error) -> Self {
        SubmitError::Database(e)
    }
}

/// Outcome of one publish attempt against one destination account
#[derive(Debug, Clone, Serialize)]
pub struct DestinationResult {
    pub platform: String,
    pub account_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublishOutcome {
    pub post: Post,
    pub results: Vec<DestinationResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub warnings: Vec<String>,
}

/// Check the draft before any network call. Every rejection here leaves no
/// trace anywhere.
pub fn validate_draft(draft: &PostDraft) -> Result<(), SubmitError> {
    if draft.title.trim().is_empty() {
        return Err(SubmitError::Validation("Title is required".to_string()));
    }

    if draft.post_type == PostType::Media {
        let media = draft.media.as_ref().ok_or_else(|| {
            SubmitError::Validation("A media file is required for media posts".to_string())
        })?;
        validate_media_size(media)?;
    }

    if draft.account_ids.is_empty() {
        return Err(SubmitError::Validation(
            "Select at least one account to post to".to_string(),
        ));
    }

    Ok(())
}

fn validate_media_size(media: &MediaFile) -> Result<(), SubmitError> {
    if media.is_video() {
        if media.data.len() > MAX_VIDEO_SIZE {
            return Err(SubmitError::Validation(
                "Video files must be 100MB or smaller".to_string(),
            ));
        }
    } else if media.data.len() > MAX_IMAGE_SIZE {
        return Err(SubmitError::Validation(
            "Image files must be 10MB or smaller".to_string(),
        ));
    }
    Ok(())
}

/// Distinct account ids, first-seen order; duplicate selections collapse
fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut deduped: Vec<Uuid> = Vec::new();
    for id in ids {
        if !deduped.contains(id) {
            deduped.push(*id);
        }
    }
    deduped
}

/// Distinct platform ids across the selected accounts, first-seen order
fn distinct_platforms(accounts: &[PlatformAccount]) -> Vec<String> {
    let mut platforms: Vec<String> = Vec::new();
    for account in accounts {
        if !platforms.contains(&account.platform_id) {
            platforms.push(account.platform_id.clone());
        }
    }
    platforms
}

/// Run the publish stage: one concurrent attempt per capable destination.
///
/// Attempts are started only for accounts whose platform publisher supports
/// publishing and only when the media is a video; a video-capable platform
/// selected with non-video media yields a warning instead of an attempt.
/// The whole batch settles before this returns.
pub async fn fan_out(
    publishers: &PublisherRegistry,
    reporter: &UploadReporter,
    accounts: &[PlatformAccount],
    media: Option<(&str, bool)>,
    title: &str,
    description: &str,
) -> (Vec<DestinationResult>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut attempts = Vec::new();

    for account in accounts {
        let Some(publisher) = publishers.get(&account.platform_id) else {
            continue;
        };
        if !publisher.supports_publish() {
            continue;
        }

        let Some((media_url, is_video)) = media else {
            continue;
        };
        if !is_video {
            warnings.push(format!(
                "Skipped {} ({}): only video uploads are supported",
                account.account_name, account.platform_id
            ));
            continue;
        }

        let Some(access_token) = account.access_token.clone() else {
            warnings.push(format!(
                "Skipped {} ({}): no stored access token",
                account.account_name, account.platform_id
            ));
            continue;
        };

        let job = PublishJob {
            media_url: media_url.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            access_token,
            refresh_token: account.refresh_token.clone(),
            channel_id: Some(account.account_identifier.clone()),
        };
        let publisher = publisher.clone();
        let reporter = reporter.clone();
        let platform = account.platform_id.clone();
        let account_name = account.account_name.clone();

        attempts.push(async move {
            let upload_id = reporter.start(&platform);
            match publisher.publish(&job).await {
                Ok(success) => {
                    reporter.settle(upload_id, true, None);
                    DestinationResult {
                        platform,
                        account_name,
                        success: true,
                        url: Some(success.url),
                        error: None,
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!("publish to {} failed: {}", platform, message);
                    reporter.settle(upload_id, false, Some(message.clone()));
                    DestinationResult {
                        platform,
                        account_name,
                        success: false,
                        url: None,
                        error: Some(message),
                    }
                }
            }
        });
    }

    // All-settle join: every attempt resolves independently
    (join_all(attempts).await, warnings)
}

/// Full submission pipeline. The post row is written in `draft` status
/// before any external effect and promoted once the publish stage settles,
/// so a crash mid-flight leaves an inspectable draft rather than a published
/// video with no local record.
pub async fn submit_post(
    db: &PgPool,
    store: &MediaStore,
    publishers: &PublisherRegistry,
    reporter: &UploadReporter,
    user_id: i64,
    draft: PostDraft,
) -> Result<PublishOutcome, SubmitError> {
    validate_draft(&draft)?;

    let account_ids = dedup_ids(&draft.account_ids);
    let accounts =
        crate::domain::accounts::get_accounts_by_ids(db, user_id, &account_ids).await?;
    if accounts.len() != account_ids.len() {
        return Err(SubmitError::Validation(
            "One or more selected accounts were not found".to_string(),
        ));
    }

    let platforms = distinct_platforms(&accounts);
    let post = posts::insert_draft(
        db,
        user_id,
        draft.title.trim(),
        &draft.caption,
        draft.post_type.as_str(),
        &platforms,
        &account_ids,
    )
    .await?;

    let stored_media = match &draft.media {
        Some(media) if draft.post_type == PostType::Media => {
            match store.put_media(user_id, &media.file_name, media.data.clone()).await {
                Ok(url) => Some((url, media.is_video())),
                Err(e) => {
                    // Roll the write-ahead row back so no phantom draft lingers
                    if let Err(del) = posts::delete_post(db, post.id, user_id).await {
                        tracing::error!("failed to remove draft after storage error: {}", del);
                    }
                    return Err(SubmitError::Storage(e.to_string()));
                }
            }
        }
        _ => None,
    };

    let (results, warnings) = fan_out(
        publishers,
        reporter,
        &accounts,
        stored_media.as_ref().map(|(url, v)| (url.as_str(), *v)),
        draft.title.trim(),
        &draft.caption,
    )
    .await;

    let media_urls: Vec<String> = stored_media.into_iter().map(|(url, _)| url).collect();
    let (status, scheduled_for, published_at) = match draft.scheduled_for {
        Some(when) => (PostStatus::Scheduled, Some(when), None),
        None => (PostStatus::Published, None, Some(Utc::now())),
    };

    let post = posts::promote_post(
        db,
        post.id,
        user_id,
        status,
        &media_urls,
        scheduled_for,
        published_at,
    )
    .await?
    .ok_or(SubmitError::Database(sqlx::Error::RowNotFound))?;

    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - succeeded;

    Ok(PublishOutcome {
        post,
        results,
        succeeded,
        failed,
        warnings,
    })
}

/// Edit a post's title and caption, best-effort propagating the change to
/// destinations that support it. Lookup is by the post's previous title;
/// destinations with no match are silently skipped.
pub async fn edit_post(
    db: &PgPool,
    publishers: &PublisherRegistry,
    user_id: i64,
    post_id: Uuid,
    title: &str,
    caption: &str,
) -> Result<Option<Post>, SubmitError> {
    if title.trim().is_empty() {
        return Err(SubmitError::Validation("Title is required".to_string()));
    }

    let Some(existing) = posts::get_post(db, post_id, user_id).await? else {
        return Ok(None);
    };
    let previous_title = existing.title.clone();

    let updated = posts::update_post_content(db, post_id, user_id, title.trim(), caption).await?;
    let Some(updated) = updated else {
        return Ok(None);
    };

    let accounts =
        crate::domain::accounts::get_accounts_by_ids(db, user_id, &existing.account_ids).await?;
    sync_destinations(publishers, &accounts, &previous_title, title.trim(), caption).await;

    Ok(Some(updated))
}

/// Propagate an edit to each destination that supports it, looking the video
/// up by the post's previous title. The stored refresh token rides along so
/// the lookup can renew a stale access token the same way publishing does.
async fn sync_destinations(
    publishers: &PublisherRegistry,
    accounts: &[PlatformAccount],
    previous_title: &str,
    title: &str,
    caption: &str,
) {
    for account in accounts {
        if account.platform_id != Platform::Youtube.as_str() {
            continue;
        }
        let Some(publisher) = publishers.get(&account.platform_id) else {
            continue;
        };
        let Some(access_token) = account.access_token.as_deref() else {
            continue;
        };
        let refresh_token = account.refresh_token.as_deref();

        let found = publisher
            .find_by_title(
                access_token,
                refresh_token,
                Some(&account.account_identifier),
                previous_title,
            )
            .await;
        match found {
            Ok(Some(video)) => {
                if let Err(e) = publisher
                    .edit(access_token, refresh_token, &video.external_id, title, caption)
                    .await
                {
                    tracing::warn!(
                        "failed to update video {} on {}: {}",
                        video.external_id,
                        account.platform_id,
                        e
                    );
                }
            }
            Ok(None) => {} // nothing published under the old title
            Err(e) => {
                tracing::warn!("lookup on {} failed: {}", account.platform_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::publish::reporter::{self, UploadStatus};
    use crate::services::publish::{
        NullPublisher, PublishError, PublishSuccess, Publisher, RemoteVideo,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn draft(post_type: PostType, media: Option<MediaFile>) -> PostDraft {
        PostDraft {
            title: "Clip".to_string(),
            caption: "a caption".to_string(),
            post_type,
            media,
            account_ids: vec![Uuid::new_v4()],
            scheduled_for: None,
        }
    }

    fn video(size: usize) -> MediaFile {
        MediaFile {
            file_name: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            data: bytes::Bytes::from(vec![0u8; size]),
        }
    }

    fn image(size: usize) -> MediaFile {
        MediaFile {
            file_name: "pic.png".to_string(),
            content_type: "image/png".to_string(),
            data: bytes::Bytes::from(vec![0u8; size]),
        }
    }

    fn account(platform: &str, name: &str) -> PlatformAccount {
        let now = Utc::now();
        PlatformAccount {
            id: Uuid::new_v4(),
            user_id: 1,
            platform_id: platform.to_string(),
            account_name: name.to_string(),
            account_identifier: format!("{}-id", name),
            access_token: Some("token".to_string()),
            refresh_token: None,
            token_expires_at: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct StubPublisher {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for StubPublisher {
        async fn publish(&self, _job: &PublishJob) -> Result<PublishSuccess, PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PublishError::Api("quota exceeded".to_string()))
            } else {
                Ok(PublishSuccess {
                    external_id: "vid123".to_string(),
                    url: "https://www.youtube.com/watch?v=vid123".to_string(),
                })
            }
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
            Ok(())
        }
    }

    /// Records the credentials each lookup and edit call arrived with
    #[derive(Default)]
    struct RecordingPublisher {
        lookups: Mutex<Vec<(String, Option<String>, String)>>,
        edits: Mutex<Vec<(String, Option<String>, String)>>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, _job: &PublishJob) -> Result<PublishSuccess, PublishError> {
            Err(PublishError::Api("not under test".to_string()))
        }

        async fn find_by_title(
            &self,
            access_token: &str,
            refresh_token: Option<&str>,
            _channel_id: Option<&str>,
            title: &str,
        ) -> Result<Option<RemoteVideo>, PublishError> {
            self.lookups.lock().unwrap().push((
                access_token.to_string(),
                refresh_token.map(str::to_string),
                title.to_string(),
            ));
            Ok(Some(RemoteVideo {
                external_id: "vid123".to_string(),
                title: title.to_string(),
            }))
        }

        async fn edit(
            &self,
            access_token: &str,
            refresh_token: Option<&str>,
            external_id: &str,
            _title: &str,
            _description: &str,
        ) -> Result<(), PublishError> {
            self.edits.lock().unwrap().push((
                access_token.to_string(),
                refresh_token.map(str::to_string),
                external_id.to_string(),
            ));
            Ok(())
        }
    }

    fn registry_with_stub(calls: Arc<AtomicUsize>, fail: bool) -> PublisherRegistry {
        let mut registry = PublisherRegistry::new();
        registry.register(Platform::Youtube, Arc::new(StubPublisher { calls, fail }));
        for platform in [Platform::Tiktok, Platform::Instagram, Platform::Facebook] {
            registry.register(platform, Arc::new(NullPublisher::new(platform)));
        }
        registry
    }

    #[test]
    fn empty_title_is_rejected() {
        let mut d = draft(PostType::Text, None);
        d.title = "   ".to_string();
        assert!(matches!(
            validate_draft(&d),
            Err(SubmitError::Validation(msg)) if msg.contains("Title")
        ));
    }

    #[test]
    fn media_post_without_file_is_rejected() {
        let d = draft(PostType::Media, None);
        assert!(matches!(
            validate_draft(&d),
            Err(SubmitError::Validation(msg)) if msg.contains("media file")
        ));
    }

    #[test]
    fn no_accounts_is_rejected() {
        let mut d = draft(PostType::Text, None);
        d.account_ids.clear();
        assert!(matches!(
            validate_draft(&d),
            Err(SubmitError::Validation(msg)) if msg.contains("account")
        ));
    }

    #[test]
    fn video_at_limit_is_accepted() {
        let d = draft(PostType::Media, Some(video(MAX_VIDEO_SIZE)));
        assert!(validate_draft(&d).is_ok());
    }

    #[test]
    fn oversized_video_names_the_limit() {
        let d = draft(PostType::Media, Some(video(MAX_VIDEO_SIZE + 1)));
        match validate_draft(&d) {
            Err(SubmitError::Validation(msg)) => assert!(msg.contains("100MB")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn oversized_image_names_the_limit() {
        let d = draft(PostType::Media, Some(image(MAX_IMAGE_SIZE + 1)));
        match validate_draft(&d) {
            Err(SubmitError::Validation(msg)) => assert!(msg.contains("10MB")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn image_at_limit_is_accepted() {
        let d = draft(PostType::Media, Some(image(MAX_IMAGE_SIZE)));
        assert!(validate_draft(&d).is_ok());
    }

    #[test]
    fn duplicate_account_ids_collapse_preserving_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedup_ids(&[a, b, a, a, b]), vec![a, b]);
        assert_eq!(dedup_ids(&[]), Vec::<Uuid>::new());
    }

    #[test]
    fn platforms_are_distinct_and_ordered() {
        let accounts = vec![
            account("youtube", "a"),
            account("tiktok", "b"),
            account("youtube", "c"),
        ];
        assert_eq!(distinct_platforms(&accounts), vec!["youtube", "tiktok"]);
    }

    #[tokio::test]
    async fn fan_out_attempts_only_video_capable_destinations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with_stub(calls.clone(), false);
        let (reporter, mut log) = reporter::channel();
        let accounts = vec![
            account("youtube", "chan1"),
            account("youtube", "chan2"),
            account("tiktok", "tt"),
        ];

        let (results, warnings) = fan_out(
            &registry,
            &reporter,
            &accounts,
            Some(("https://media.example/clip.mp4", true)),
            "Clip",
            "desc",
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert!(warnings.is_empty());

        log.drain();
        let uploads = log.snapshot();
        assert_eq!(uploads.len(), 2);
        assert!(uploads.iter().all(|u| u.status == UploadStatus::Completed));
    }

    #[tokio::test]
    async fn fan_out_counts_failures_without_cancelling_others() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with_stub(calls.clone(), true);
        let (reporter, mut log) = reporter::channel();
        let accounts = vec![account("youtube", "chan1"), account("youtube", "chan2")];

        let (results, _) = fan_out(
            &registry,
            &reporter,
            &accounts,
            Some(("https://media.example/clip.mp4", true)),
            "Clip",
            "desc",
        )
        .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(results.iter().all(|r| r.error.as_deref() == Some("quota exceeded")));

        log.drain();
        assert!(log.snapshot().iter().all(|u| u.status == UploadStatus::Failed));
    }

    #[tokio::test]
    async fn fan_out_skips_non_video_media_with_warning() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with_stub(calls.clone(), false);
        let (reporter, mut log) = reporter::channel();
        let accounts = vec![account("youtube", "chan1")];

        let (results, warnings) = fan_out(
            &registry,
            &reporter,
            &accounts,
            Some(("https://media.example/pic.png", false)),
            "Pic",
            "desc",
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(results.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("chan1"));

        log.drain();
        assert!(log.snapshot().is_empty());
    }

    #[tokio::test]
    async fn fan_out_without_media_makes_no_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with_stub(calls.clone(), false);
        let (reporter, mut log) = reporter::channel();
        let accounts = vec![account("youtube", "chan1"), account("facebook", "fb")];

        let (results, warnings) =
            fan_out(&registry, &reporter, &accounts, None, "Hello", "").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(results.is_empty());
        assert!(warnings.is_empty());
        log.drain();
        assert!(log.snapshot().is_empty());
    }

    #[tokio::test]
    async fn edit_sync_threads_refresh_token_into_lookup_and_edit() {
        let recorder = Arc::new(RecordingPublisher::default());
        let mut registry = PublisherRegistry::new();
        registry.register(Platform::Youtube, recorder.clone());

        let mut acct = account("youtube", "chan1");
        acct.refresh_token = Some("refresh-abc".to_string());

        sync_destinations(&registry, &[acct], "Old title", "New title", "caption").await;

        let lookups = recorder.lookups.lock().unwrap();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].0, "token");
        assert_eq!(lookups[0].1.as_deref(), Some("refresh-abc"));
        assert_eq!(lookups[0].2, "Old title");

        let edits = recorder.edits.lock().unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].1.as_deref(), Some("refresh-abc"));
        assert_eq!(edits[0].2, "vid123");
    }

    #[tokio::test]
    async fn edit_sync_skips_accounts_without_tokens() {
        let recorder = Arc::new(RecordingPublisher::default());
        let mut registry = PublisherRegistry::new();
        registry.register(Platform::Youtube, recorder.clone());

        let mut acct = account("youtube", "chan1");
        acct.access_token = None;

        sync_destinations(&registry, &[acct], "Old title", "New title", "caption").await;

        assert!(recorder.lookups.lock().unwrap().is_empty());
        assert!(recorder.edits.lock().unwrap().is_empty());
    }
}
