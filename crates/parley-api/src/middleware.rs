use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::{AppState, TOKEN_COOKIE, decode_token};

/// Extract and validate the JWT from the `token` cookie.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = jar
        .get(TOKEN_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode_token(&state.jwt_secret, token).map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use crate::test_support::{SECRET, call, state};
    use uuid::Uuid;

    #[tokio::test]
    async fn rejects_foreign_and_garbage_tokens() {
        let state = state();
        let foreign = create_token("other-secret", Uuid::new_v4(), "ana").unwrap();

        for cookie in [format!("token={}", foreign), "token=garbage".into(), "token=".into()] {
            let res = call(&state, "GET", "/profile", Some(&cookie), None).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{}", cookie);
        }
    }

    #[tokio::test]
    async fn accepts_token_without_registered_user() {
        // Claims are trusted once the signature checks out.
        let state = state();
        let token = create_token(SECRET, Uuid::new_v4(), "ghost").unwrap();
        let res = call(&state, "GET", "/profile", Some(&format!("token={}", token)), None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
