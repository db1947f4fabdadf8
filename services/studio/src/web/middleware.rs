//! services/studio/src/web/middleware.rs
//!
//! The sign-in guard for protected routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::state::AppState;

/// Middleware that admits a request only while an identity is published.
///
/// No decision is made while the bootstrap is still resolving the session;
/// the request waits for it. On success the `Identity` is inserted into the
/// request extensions for handlers to use. Otherwise returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let mut context = state.context.clone();
    let snapshot = context.wait_until_loaded().await.ok_or_else(|| {
        warn!("Session bootstrap is gone; refusing {}", req.uri().path());
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let identity = snapshot.identity.ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
