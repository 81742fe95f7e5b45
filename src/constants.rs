//! Application constants

/// Maximum accepted video file size (100 MB)
pub const MAX_VIDEO_SIZE: usize = 100 * 1024 * 1024;

/// Maximum accepted image file size (10 MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Default GCS bucket for uploaded media when MEDIA_BUCKET is not set
pub const DEFAULT_BUCKET: &str = "multiblast-media";

/// Default page size for paginated list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size for paginated list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;
