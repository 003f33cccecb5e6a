use std::path::Path;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use parley_api::auth::{AppState, TOKEN_COOKIE};
use parley_gateway::{Gateway, connection};

/// The full HTTP surface: account API, gateway socket and uploaded files.
pub fn build_router(
    api: AppState,
    gateway: Gateway,
    uploads_dir: &Path,
    client_origin: HeaderValue,
) -> Router {
    let ws_routes = Router::new()
        .route("/", get(ws_upgrade))
        .route("/ws", get(ws_upgrade))
        .with_state(gateway);

    // Credentialed CORS needs an explicit origin, methods and headers.
    let cors = CorsLayer::new()
        .allow_origin(client_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .merge(parley_api::routes(api))
        .merge(ws_routes)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(gateway): State<Gateway>,
    jar: CookieJar,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = jar.get(TOKEN_COOKIE).map(|c| c.value().to_string());
    ws.on_upgrade(move |socket| connection::handle_connection(socket, gateway, token))
}
