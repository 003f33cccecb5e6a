use axum::{Json, extract::State, http::StatusCode};
use tracing::{error, warn};
use uuid::Uuid;

use parley_types::models::Identity;

use crate::auth::AppState;

/// Every registered user as `{userId, username}`, ordered by username.
pub async fn list_people(State(state): State<AppState>) -> Result<Json<Vec<Identity>>, StatusCode> {
    let db = state.db.clone();
    let users = tokio::task::spawn_blocking(move || db.list_users())
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("list_users failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let people = users
        .into_iter()
        .filter_map(|u| match u.id.parse::<Uuid>() {
            Ok(id) => Some(Identity::new(id, u.username)),
            Err(_) => {
                warn!("Skipping user with malformed id {}", u.id);
                None
            }
        })
        .collect();

    Ok(Json(people))
}
