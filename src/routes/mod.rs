pub mod accounts;
pub mod auth;
pub mod billing;
pub mod oauth;
pub mod posts;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(accounts::routes())
        .merge(oauth::routes())
        .merge(posts::routes())
        .merge(billing::routes())
}
