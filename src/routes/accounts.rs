//! Linked platform account endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::domain::accounts;
use crate::domain::models::PlatformAccount;
use crate::routes::auth::AuthUser;
use crate::services::error::{ApiError, LogErr, not_found};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/{id}", delete(disconnect_account))
}

/// GET /accounts - All of the user's linked accounts, tokens omitted
async fn list_accounts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<PlatformAccount>>, ApiError> {
    let accounts = accounts::list_accounts(&state.db, user_id)
        .await
        .log_500("Failed to list accounts")?;
    Ok(Json(accounts))
}

/// DELETE /accounts/{id} - Disconnect a linked account
async fn disconnect_account(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = accounts::delete_account(&state.db, account_id, user_id)
        .await
        .log_500("Failed to delete account")?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Account not found"))
    }
}
