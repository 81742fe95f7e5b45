//! Post queries

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use super::models::{Post, PostStatus};

const POST_COLUMNS: &str = "id, user_id, title, content, media_urls, post_type, platforms, \
     account_ids, status, scheduled_for, published_at, created_at, updated_at";

/// Insert the post row ahead of any external publish, in `draft` status.
/// Promoted by [`promote_post`] once the publish stage has settled.
pub async fn insert_draft<'e, E>(
    executor: E,
    user_id: i64,
    title: &str,
    content: &str,
    post_type: &str,
    platforms: &[String],
    account_ids: &[Uuid],
) -> Result<Post, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        INSERT INTO posts (user_id, title, content, post_type, platforms, account_ids, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'draft')
        RETURNING {POST_COLUMNS}
        "#,
    ))
    .bind(user_id)
    .bind(title)
    .bind(content)
    .bind(post_type)
    .bind(platforms)
    .bind(account_ids)
    .fetch_one(executor)
    .await
}

/// Promote a draft row to its final status after the publish stage.
/// `published` rows carry `published_at` and no `scheduled_for`; `scheduled`
/// rows the inverse.
pub async fn promote_post<'e, E>(
    executor: E,
    post_id: Uuid,
    user_id: i64,
    status: PostStatus,
    media_urls: &[String],
    scheduled_for: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        UPDATE posts SET
            status = $3,
            media_urls = $4,
            scheduled_for = $5,
            published_at = $6,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {POST_COLUMNS}
        "#,
    ))
    .bind(post_id)
    .bind(user_id)
    .bind(status.as_str())
    .bind(media_urls)
    .bind(scheduled_for)
    .bind(published_at)
    .fetch_optional(executor)
    .await
}

pub async fn get_post<'e, E>(
    executor: E,
    post_id: Uuid,
    user_id: i64,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE id = $1 AND user_id = $2
        "#,
    ))
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Count a user's posts for pagination
pub async fn count_posts<'e, E>(executor: E, user_id: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await?;

    Ok(count)
}

/// List a user's posts, newest first, with pagination
pub async fn list_posts_paginated<'e, E>(
    executor: E,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

/// Update title/content on an existing post (edit path)
pub async fn update_post_content<'e, E>(
    executor: E,
    post_id: Uuid,
    user_id: i64,
    title: &str,
    content: &str,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        UPDATE posts SET title = $3, content = $4, updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {POST_COLUMNS}
        "#,
    ))
    .bind(post_id)
    .bind(user_id)
    .bind(title)
    .bind(content)
    .fetch_optional(executor)
    .await
}

pub async fn delete_post<'e, E>(
    executor: E,
    post_id: Uuid,
    user_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
