pub mod auth;
pub mod middleware;
pub mod projects;
pub mod rest;
pub mod state;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the full application router, Swagger UI included.
///
/// Cross-origin policy is left to the binary so tests can drive the router
/// directly.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/session", get(rest::session_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/dashboard", get(projects::dashboard_handler))
        .route("/dashboard/projects/{id}", delete(projects::delete_project_handler))
        .route(
            "/editor",
            get(projects::new_editor_handler).post(projects::create_project_handler),
        )
        .route(
            "/editor/{id}",
            get(projects::get_editor_handler).put(projects::update_project_handler),
        )
        .route("/editor/{id}/download", get(projects::download_handler))
        .route("/editor/{id}/audio", post(projects::generate_audio_handler))
        .route("/audio-jobs/{id}", get(projects::audio_job_handler))
        .route(
            "/profile",
            get(rest::get_profile_handler).put(rest::update_profile_handler),
        )
        .route("/settings", get(rest::settings_handler))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
