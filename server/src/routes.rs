use axum::{middleware, routing::get, Router};

use crate::auth::middleware::JwtSecret;
use crate::presence;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Hub endpoints (auth via access_token query param, not the Authorization header)
    let hub_routes = Router::new()
        .route("/hubs/presence", get(ws_handler::presence_hub))
        .route("/hubs/message", get(ws_handler::message_hub));

    // Authenticated routes (JWT required; Claims extractor validates token)
    let presence_routes = Router::new().route("/api/presence", get(presence::get_online_users));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(hub_routes)
        .merge(presence_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
