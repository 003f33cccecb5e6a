use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{error, warn};
use uuid::Uuid;

use parley_db::models::{MessageRow, parse_timestamp};
use parley_types::api::Claims;
use parley_types::models::MessageRecord;

use crate::auth::AppState;

/// Conversation between the caller and `user_id`, both directions, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<MessageRecord>>, StatusCode> {
    let db = state.db.clone();
    let me = claims.sub.to_string();
    let other = user_id.to_string();

    let rows = tokio::task::spawn_blocking(move || db.get_conversation(&me, &other))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("get_conversation failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let records = rows.into_iter().filter_map(to_record).collect();
    Ok(Json(records))
}

fn to_record(row: MessageRow) -> Option<MessageRecord> {
    let parsed = (
        row.id.parse::<Uuid>(),
        row.sender.parse::<Uuid>(),
        row.recipient.parse::<Uuid>(),
        parse_timestamp(&row.created_at),
    );
    match parsed {
        (Ok(id), Ok(sender), Ok(recipient), Some(created_at)) => Some(MessageRecord {
            id,
            sender,
            recipient,
            text: row.text,
            file: row.file,
            created_at,
        }),
        _ => {
            warn!("Skipping corrupt message row {}", row.id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use crate::test_support::{SECRET, call, json, state};

    #[tokio::test]
    async fn conversation_in_both_directions_oldest_first() {
        let state = state();
        let (ana, bo, cy) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for (id, name) in [(ana, "ana"), (bo, "bo"), (cy, "cy")] {
            state.db.create_user(&id.to_string(), name, "hash").unwrap();
        }

        let (a, b, c) = (ana.to_string(), bo.to_string(), cy.to_string());
        let first = Uuid::new_v4().to_string();
        let second = Uuid::new_v4().to_string();
        state.db.insert_message(&first, &a, &b, Some("hi bo"), None).unwrap();
        state.db.insert_message(&Uuid::new_v4().to_string(), &a, &c, Some("hi cy"), None).unwrap();
        state.db.insert_message(&second, &b, &a, None, Some("1.png")).unwrap();

        let cookie = format!("token={}", create_token(SECRET, ana, "ana").unwrap());
        let res = call(&state, "GET", &format!("/messages/{}", bo), Some(&cookie), None).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = json(res).await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["id"], first);
        assert_eq!(list[0]["text"], "hi bo");
        assert_eq!(list[1]["id"], second);
        assert_eq!(list[1]["file"], "1.png");
        assert!(list[1]["text"].is_null());
        assert!(list[1]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn history_requires_auth_and_uuid() {
        let state = state();
        let anonymous = call(&state, "GET", &format!("/messages/{}", Uuid::new_v4()), None, None).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let cookie = format!("token={}", create_token(SECRET, Uuid::new_v4(), "ana").unwrap());
        let bad = call(&state, "GET", "/messages/not-a-uuid", Some(&cookie), None).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
