use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use tracing::{error, info};
use uuid::Uuid;

use parley_db::Database;
use parley_db::queries::is_unique_violation;
use parley_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use parley_types::models::Identity;

pub const TOKEN_COOKIE: &str = "token";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let user_id = Uuid::new_v4();
    let db = state.db.clone();
    let username = req.username.clone();
    // The UNIQUE index settles concurrent registrations of the same name.
    tokio::task::spawn_blocking(move || {
        db.create_user(&user_id.to_string(), &username, &password_hash)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        if is_unique_violation(&e) {
            return StatusCode::CONFLICT;
        }
        error!("create_user failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let token = create_token(&state.jwt_secret, user_id, &req.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!("Registered {} ({})", req.username, user_id);
    Ok((
        StatusCode::CREATED,
        jar.add(token_cookie(token)),
        Json(AuthResponse { id: user_id }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let username = req.username.clone();
    let user = tokio::task::spawn_blocking(move || db.get_user_by_username(&username))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id: Uuid = user.id.parse().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((jar.add(token_cookie(token)), Json(AuthResponse { id: user_id })))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (jar.remove(token_cookie(String::new())), Json("ok"))
}

pub async fn profile(Extension(claims): Extension<Claims>) -> Json<Identity> {
    Json(Identity::new(claims.sub, claims.username))
}

fn token_cookie(value: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{SECRET, call, json, state, token_cookie as cookie_of};
    use axum::body::Body;
    use axum::http::{Response, header};
    use serde_json::json as body;

    async fn post_credentials(
        state: &AppState,
        uri: &str,
        username: &str,
        password: &str,
    ) -> Response<Body> {
        let credentials = body!({ "username": username, "password": password });
        call(state, "POST", uri, None, Some(credentials)).await
    }

    #[tokio::test]
    async fn register_sets_token_cookie() {
        let state = state();
        let res = post_credentials(&state, "/register", "ana", "correct horse").await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let set_cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.contains("SameSite=None"));
        assert!(set_cookie.contains("Secure"));

        let cookie = cookie_of(&res);
        let id = json(res).await["id"].as_str().unwrap().to_string();
        let token = cookie.strip_prefix("token=").unwrap();
        let claims = decode_token(SECRET, token).unwrap();
        assert_eq!(claims.sub.to_string(), id);
        assert_eq!(claims.username, "ana");
    }

    #[tokio::test]
    async fn register_validates_and_rejects_duplicates() {
        let state = state();
        let short = post_credentials(&state, "/register", "an", "correct horse").await;
        assert_eq!(short.status(), StatusCode::BAD_REQUEST);

        let weak = post_credentials(&state, "/register", "ana", "short").await;
        assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

        let first = post_credentials(&state, "/register", "ana", "correct horse").await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let again = post_credentials(&state, "/register", "ana", "another one").await;
        assert_eq!(again.status(), StatusCode::CONFLICT);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_of_one_name_conflict() {
        let state = state();
        let attempts: Vec<_> = (0..4)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move {
                    post_credentials(&state, "/register", "ana", "correct horse")
                        .await
                        .status()
                })
            })
            .collect();

        let mut statuses = Vec::new();
        for attempt in attempts {
            statuses.push(attempt.await.unwrap());
        }
        let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
        let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
        assert_eq!((created, conflicts), (1, 3), "{:?}", statuses);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let state = state();
        post_credentials(&state, "/register", "ana", "correct horse").await;

        let bad = post_credentials(&state, "/login", "ana", "wrong horse").await;
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);

        let unknown = post_credentials(&state, "/login", "bo", "correct horse").await;
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        let ok = post_credentials(&state, "/login", "ana", "correct horse").await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert!(cookie_of(&ok).starts_with("token="));
    }

    #[tokio::test]
    async fn profile_needs_cookie_and_logout_clears_it() {
        let state = state();
        let res = post_credentials(&state, "/register", "ana", "correct horse").await;
        let cookie = cookie_of(&res);

        let anonymous = call(&state, "GET", "/profile", None, None).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let me = call(&state, "GET", "/profile", Some(&cookie), None).await;
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(json(me).await["username"], "ana");

        let out = call(&state, "POST", "/logout", Some(&cookie), None).await;
        assert_eq!(cookie_of(&out), "token=");
    }
}
