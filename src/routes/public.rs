use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints accessible without an identity. Everything here either reports liveness
/// or exchanges credentials with the identity service.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers; never touches the store.
        .route("/health", get(|| async { "ok" }))
        // POST /users/register
        // Forwards the new account to the identity service.
        .route("/users/register", post(handlers::register))
        // POST /users/login
        // Returns an access/refresh token pair.
        .route("/users/login", post(handlers::login))
        // POST /users/refresh-token
        // Trades a refresh token for a fresh pair. Access tokens are rejected here.
        .route("/users/refresh-token", post(handlers::refresh_token))
}
