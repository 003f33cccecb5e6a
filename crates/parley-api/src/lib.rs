//! Request/response endpoints around the gateway: accounts, the peer
//! directory and message history. Authentication rides on the `token`
//! cookie that the gateway handshake also reads.

pub mod auth;
pub mod messages;
pub mod middleware;
pub mod people;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::auth::AppState;

/// All API routes, with the cookie guard applied to the protected ones.
pub fn routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/people", get(people::list_people));

    let protected_routes = Router::new()
        .route("/profile", get(auth::profile))
        .route("/messages/{user_id}", get(messages::get_messages))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    public_routes.merge(protected_routes).with_state(state)
}
