//! Subscriber (billing) queries. Decoupled from the posting pipeline; the
//! `subscribers` table mirrors what the billing provider last told us.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

/// Upsert the subscriber row keyed by email. `None` for the customer id
/// preserves any value already stored.
pub async fn upsert_subscriber<'e, E>(
    executor: E,
    email: &str,
    user_id: i64,
    stripe_customer_id: Option<&str>,
    subscribed: bool,
    subscription_tier: Option<&str>,
    subscription_end: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO subscribers
            (email, user_id, stripe_customer_id, subscribed, subscription_tier, subscription_end)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE SET
            user_id = $2,
            stripe_customer_id = COALESCE($3, subscribers.stripe_customer_id),
            subscribed = $4,
            subscription_tier = $5,
            subscription_end = $6,
            updated_at = NOW()
        "#,
    )
    .bind(email)
    .bind(user_id)
    .bind(stripe_customer_id)
    .bind(subscribed)
    .bind(subscription_tier)
    .bind(subscription_end)
    .execute(executor)
    .await?;

    Ok(())
}

/// Store a customer id without touching the subscription fields
pub async fn set_customer_id<'e, E>(
    executor: E,
    email: &str,
    user_id: i64,
    stripe_customer_id: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO subscribers (email, user_id, stripe_customer_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET
            user_id = $2,
            stripe_customer_id = $3,
            updated_at = NOW()
        "#,
    )
    .bind(email)
    .bind(user_id)
    .bind(stripe_customer_id)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_customer_id<'e, E>(
    executor: E,
    email: &str,
) -> Result<Option<String>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT stripe_customer_id FROM subscribers WHERE email = $1")
            .bind(email)
            .fetch_optional(executor)
            .await?;

    Ok(row.and_then(|r| r.0))
}
