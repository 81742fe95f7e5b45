//! Platform account queries
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use super::models::PlatformAccount;
use crate::services::oauth::LinkedIdentity;

/// Insert a linked account, or update its tokens when the
/// (user_id, platform_id, account_identifier) triple already exists.
/// Reconnecting the same identity must never create a duplicate row.
pub async fn upsert_account<'e, E>(
    executor: E,
    user_id: i64,
    platform_id: &str,
    identity: &LinkedIdentity,
) -> Result<PlatformAccount, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO platform_accounts
            (user_id, platform_id, account_name, account_identifier,
             access_token, refresh_token, token_expires_at, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, platform_id, account_identifier) DO UPDATE SET
            account_name = $3,
            access_token = $5,
            refresh_token = COALESCE($6, platform_accounts.refresh_token),
            token_expires_at = $7,
            metadata = COALESCE($8, platform_accounts.metadata),
            updated_at = NOW()
        RETURNING id, user_id, platform_id, account_name, account_identifier,
                  access_token, refresh_token, token_expires_at, metadata,
                  created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(platform_id)
    .bind(&identity.account_name)
    .bind(&identity.account_identifier)
    .bind(&identity.access_token)
    .bind(identity.refresh_token.as_deref())
    .bind(identity.token_expires_at)
    .bind(identity.metadata.as_ref())
    .fetch_one(executor)
    .await
}

/// List all linked accounts for a user
pub async fn list_accounts<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<PlatformAccount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, user_id, platform_id, account_name, account_identifier,
               access_token, refresh_token, token_expires_at, metadata,
               created_at, updated_at
        FROM platform_accounts
        WHERE user_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Fetch the subset of a user's accounts matching the given ids (single query)
pub async fn get_accounts_by_ids<'e, E>(
    executor: E,
    user_id: i64,
    ids: &[Uuid],
) -> Result<Vec<PlatformAccount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, user_id, platform_id, account_name, account_identifier,
               access_token, refresh_token, token_expires_at, metadata,
               created_at, updated_at
        FROM platform_accounts
        WHERE user_id = $1 AND id = ANY($2)
        ORDER BY created_at
        "#,
    )
    .bind(user_id)
    .bind(ids)
    .fetch_all(executor)
    .await
}

/// Disconnect an account. The only path that deletes a row.
pub async fn delete_account<'e, E>(
    executor: E,
    account_id: Uuid,
    user_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM platform_accounts
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(account_id)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::users;
    use sqlx::PgPool;

    fn identity(access: &str, refresh: Option<&str>) -> LinkedIdentity {
        LinkedIdentity {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            token_expires_at: None,
            account_name: "My Channel".to_string(),
            account_identifier: "UC123".to_string(),
            metadata: None,
        }
    }

    #[sqlx::test]
    async fn reconnect_updates_tokens_without_duplicating(pool: PgPool) -> sqlx::Result<()> {
        let user_id = users::create_user(&pool, "link@example.com", "hash").await?;

        let first = upsert_account(&pool, user_id, "youtube", &identity("at1", Some("rt1"))).await?;
        let second = upsert_account(&pool, user_id, "youtube", &identity("at2", None)).await?;

        assert_eq!(second.id, first.id);
        assert_eq!(second.access_token.as_deref(), Some("at2"));
        // a reconnect without a refresh token keeps the stored one
        assert_eq!(second.refresh_token.as_deref(), Some("rt1"));

        let all = list_accounts(&pool, user_id).await?;
        assert_eq!(all.len(), 1);
        Ok(())
    }

    #[sqlx::test]
    async fn different_identifier_links_a_second_account(pool: PgPool) -> sqlx::Result<()> {
        let user_id = users::create_user(&pool, "multi@example.com", "hash").await?;

        upsert_account(&pool, user_id, "youtube", &identity("at1", None)).await?;
        let mut other = identity("at2", None);
        other.account_identifier = "UC456".to_string();
        upsert_account(&pool, user_id, "youtube", &other).await?;

        let all = list_accounts(&pool, user_id).await?;
        assert_eq!(all.len(), 2);
        Ok(())
    }
}
