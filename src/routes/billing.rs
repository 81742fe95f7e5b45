//! Billing endpoints: checkout, customer portal, subscription status
//!
//! Thin wrappers over the Stripe client. The subscriber row mirrors
//! whatever Stripe last reported so the frontend can gate features without
//! hitting Stripe on every page load.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::domain::{subscribers, users};
use crate::routes::auth::AuthUser;
use crate::services::billing::{StripeClient, SubscriptionStatus};
use crate::services::error::{ApiError, LogErr, error_response, unauthorized};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/billing/checkout", post(create_checkout))
        .route("/billing/portal", post(create_portal))
        .route("/billing/subscription", get(subscription_status))
}

fn billing_client(state: &AppState) -> Result<&StripeClient, ApiError> {
    state.billing.as_ref().ok_or_else(|| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Billing is not configured. Set STRIPE_SECRET_KEY in the environment.",
        )
    })
}

async fn user_email(state: &AppState, user_id: i64) -> Result<String, ApiError> {
    let user = users::get_user_by_id(&state.db, user_id)
        .await
        .log_500("Failed to load user")?
        .ok_or_else(unauthorized)?;
    Ok(user.email)
}

#[derive(Serialize)]
struct UrlResponse {
    url: String,
}

/// POST /billing/checkout - Start a subscription checkout session
async fn create_checkout(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UrlResponse>, ApiError> {
    let stripe = billing_client(&state)?;
    let email = user_email(&state, user_id).await?;

    let customer_id = match subscribers::get_customer_id(&state.db, &email)
        .await
        .log_500("Failed to load subscriber")?
    {
        Some(id) => id,
        None => {
            let id = stripe
                .find_or_create_customer(&email, user_id)
                .await
                .log_status("Stripe customer lookup failed", StatusCode::BAD_GATEWAY)?;
            subscribers::set_customer_id(&state.db, &email, user_id, &id)
                .await
                .log_500("Failed to store customer id")?;
            id
        }
    };

    let url = stripe
        .create_checkout_session(&customer_id, &state.public_url)
        .await
        .log_status("Stripe checkout failed", StatusCode::BAD_GATEWAY)?;

    Ok(Json(UrlResponse { url }))
}

/// POST /billing/portal - Customer portal for managing the subscription
async fn create_portal(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UrlResponse>, ApiError> {
    let stripe = billing_client(&state)?;
    let email = user_email(&state, user_id).await?;

    let customer_id = subscribers::get_customer_id(&state.db, &email)
        .await
        .log_500("Failed to load subscriber")?
        .ok_or_else(|| {
            error_response(
                StatusCode::NOT_FOUND,
                "No billing account found. Subscribe first.",
            )
        })?;

    let url = stripe
        .create_portal_session(&customer_id, &state.public_url)
        .await
        .log_status("Stripe portal failed", StatusCode::BAD_GATEWAY)?;

    Ok(Json(UrlResponse { url }))
}

/// GET /billing/subscription - Current subscription state, refreshed from
/// Stripe and mirrored into the subscribers table
async fn subscription_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SubscriptionStatus>, ApiError> {
    let stripe = billing_client(&state)?;
    let email = user_email(&state, user_id).await?;

    let customer_id = match subscribers::get_customer_id(&state.db, &email)
        .await
        .log_500("Failed to load subscriber")?
    {
        Some(id) => id,
        None => {
            // The customer may exist in Stripe from a previous signup
            let found = stripe
                .find_or_create_customer(&email, user_id)
                .await
                .log_status("Stripe customer lookup failed", StatusCode::BAD_GATEWAY)?;
            subscribers::set_customer_id(&state.db, &email, user_id, &found)
                .await
                .log_500("Failed to store customer id")?;
            found
        }
    };

    let status = stripe
        .subscription_status(&customer_id)
        .await
        .log_status("Stripe subscription check failed", StatusCode::BAD_GATEWAY)?;

    subscribers::upsert_subscriber(
        &state.db,
        &email,
        user_id,
        Some(&customer_id),
        status.subscribed,
        status.subscription_tier.as_deref(),
        status.subscription_end,
    )
    .await
    .log_500("Failed to update subscriber")?;

    Ok(Json(status))
}
