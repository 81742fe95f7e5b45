//! Stripe billing: checkout sessions, customer portal, subscription checks
//!
//! Talks to the Stripe REST API directly with form-encoded requests. Billing
//! is entirely decoupled from the posting pipeline; it only gates the UI.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const STRIPE_BASE: &str = "https://api.stripe.com/v1";
const MONTHLY_PRICE_CENTS: u32 = 900;
const TRIAL_PERIOD_DAYS: u32 = 7;

#[derive(Clone)]
pub struct StripeClient {
    secret_key: String,
    http: Client,
}

#[derive(Debug)]
pub enum StripeError {
    Http(reqwest::Error),
    Api(String),
}

impl std::fmt::Display for StripeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StripeError::Http(e) => write!(f, "HTTP error: {}", e),
            StripeError::Api(e) => write!(f, "{}", e),
        }
    }
}

impl From<reqwest::Error> for StripeError {
    fn from(e: reqwest::Error) -> Self {
        StripeError::Http(e)
    }
}

#[derive(Deserialize)]
struct List<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct Customer {
    id: String,
}

#[derive(Deserialize)]
struct CheckoutSession {
    url: Option<String>,
}

#[derive(Deserialize)]
struct PortalSession {
    url: String,
}

#[derive(Deserialize)]
struct Subscription {
    status: String,
    current_period_end: i64,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// What the subscription gate reports to the frontend
#[derive(Debug, Serialize)]
pub struct SubscriptionStatus {
    pub subscribed: bool,
    pub subscription_tier: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub in_trial: bool,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            secret_key: secret_key.to_string(),
            http: Client::new(),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .map(|key| Self::new(&key))
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, StripeError> {
        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let text = resp.text().await?;
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or(text);
        Err(StripeError::Api(message))
    }

    /// Look up the customer by email, creating one if none exists
    pub async fn find_or_create_customer(
        &self,
        email: &str,
        user_id: i64,
    ) -> Result<String, StripeError> {
        let resp = self
            .http
            .get(format!("{}/customers", STRIPE_BASE))
            .bearer_auth(&self.secret_key)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let customers: List<Customer> = Self::parse(resp).await?;

        if let Some(customer) = customers.data.into_iter().next() {
            return Ok(customer.id);
        }

        let user_id = user_id.to_string();
        let params = [("email", email), ("metadata[user_id]", &user_id)];
        let resp = self
            .http
            .post(format!("{}/customers", STRIPE_BASE))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;
        let customer: Customer = Self::parse(resp).await?;
        Ok(customer.id)
    }

    /// Checkout session for the monthly subscription with a free trial
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        origin: &str,
    ) -> Result<String, StripeError> {
        let unit_amount = MONTHLY_PRICE_CENTS.to_string();
        let trial_days = TRIAL_PERIOD_DAYS.to_string();
        let success_url = format!("{}/dashboard?subscription=success", origin);
        let cancel_url = format!("{}/dashboard?subscription=canceled", origin);

        let params = [
            ("customer", customer_id),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price_data][currency]", "usd"),
            (
                "line_items[0][price_data][product_data][name]",
                "MultiBlast Pro Subscription",
            ),
            (
                "line_items[0][price_data][product_data][description]",
                "Access to all premium features with a 7-day free trial",
            ),
            ("line_items[0][price_data][unit_amount]", &unit_amount),
            ("line_items[0][price_data][recurring][interval]", "month"),
            ("line_items[0][quantity]", "1"),
            ("mode", "subscription"),
            ("subscription_data[trial_period_days]", &trial_days),
            ("success_url", &success_url),
            ("cancel_url", &cancel_url),
        ];

        let resp = self
            .http
            .post(format!("{}/checkout/sessions", STRIPE_BASE))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;
        let session: CheckoutSession = Self::parse(resp).await?;
        session
            .url
            .ok_or_else(|| StripeError::Api("Checkout session has no URL".to_string()))
    }

    /// Customer portal session for managing an existing subscription
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        origin: &str,
    ) -> Result<String, StripeError> {
        let return_url = format!("{}/dashboard", origin);
        let params = [("customer", customer_id), ("return_url", &return_url)];

        let resp = self
            .http
            .post(format!("{}/billing_portal/sessions", STRIPE_BASE))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;
        let session: PortalSession = Self::parse(resp).await?;
        Ok(session.url)
    }

    /// Check for an active subscription on the customer
    pub async fn subscription_status(
        &self,
        customer_id: &str,
    ) -> Result<SubscriptionStatus, StripeError> {
        let resp = self
            .http
            .get(format!("{}/subscriptions", STRIPE_BASE))
            .bearer_auth(&self.secret_key)
            .query(&[
                ("customer", customer_id),
                ("status", "active"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let subscriptions: List<Subscription> = Self::parse(resp).await?;

        let Some(subscription) = subscriptions.data.into_iter().next() else {
            return Ok(SubscriptionStatus {
                subscribed: false,
                subscription_tier: None,
                subscription_end: None,
                in_trial: false,
            });
        };

        Ok(SubscriptionStatus {
            subscribed: true,
            // Single tier for now
            subscription_tier: Some("pro".to_string()),
            subscription_end: DateTime::from_timestamp(subscription.current_period_end, 0),
            in_trial: subscription.status == "trialing",
        })
    }
}
