//! services/studio/src/web/auth.rs
//!
//! Authentication endpoints for sign-up, login, logout, and password reset.
//! Each one drives the matching view model; the session bootstrap publishes
//! the outcome.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sonicwave_core::views::login::{LoginForm, LoginMode, LoginOutcome};
use sonicwave_core::views::password_reset::PasswordReset;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    /// Seeds the profile's display name.
    pub full_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub notice: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct ResetPasswordResponse {
    pub sent_to: String,
}

/// Submits the form; local validation failures are 400s.
async fn submit_form(
    state: &AppState,
    mut form: LoginForm,
    failure_status: StatusCode,
) -> Result<AuthResponse, (StatusCode, String)> {
    if let Err(e) = form.validate() {
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }

    let outcome = form.submit(&state.session).await;
    let notice = form.state().notice.clone();
    match outcome {
        Some(LoginOutcome::SignedIn(identity)) | Some(LoginOutcome::SignedUp(Some(identity))) => {
            Ok(AuthResponse {
                user_id: Some(identity.id),
                email: identity.email,
                notice,
            })
        }
        Some(LoginOutcome::SignedUp(None)) => Ok(AuthResponse {
            user_id: None,
            email: None,
            notice,
        }),
        None => {
            let message = form
                .into_state()
                .error
                .unwrap_or_else(|| "Authentication failed".to_string());
            error!("Authentication failed: {}", message);
            Err((failure_status, message))
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or rejected by the provider")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut form = LoginForm::new(LoginMode::SignUp);
    form.set_email(req.email);
    form.set_password(req.password);
    form.set_full_name(req.full_name.unwrap_or_default());

    let response = submit_form(&state, form, StatusCode::BAD_REQUEST).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login - Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut form = LoginForm::new(LoginMode::SignIn);
    form.set_email(req.email);
    form.set_password(req.password);

    let response = submit_form(&state, form, StatusCode::UNAUTHORIZED).await?;
    Ok((StatusCode::OK, Json(response)))
}

/// POST /auth/logout - Sign out
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Signed out"),
        (status = 502, description = "Signed out locally, but the provider call failed")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.session.sign_out().await.map_err(|e| {
        error!("Failed to sign out: {}", e);
        (StatusCode::BAD_GATEWAY, e.message().to_string())
    })?;
    info!("Session ended via /auth/logout");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/reset-password - Email a password reset link
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent", body = ResetPasswordResponse),
        (status = 400, description = "Invalid email or provider failure")
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut view = PasswordReset::new();
    view.set_email(req.email);
    view.submit(&state.session).await;

    let result = view.into_state();
    match (result.sent_to, result.error) {
        (Some(sent_to), _) => Ok(Json(ResetPasswordResponse { sent_to })),
        (None, error) => Err((
            StatusCode::BAD_REQUEST,
            error.unwrap_or_else(|| "Failed to send reset email".to_string()),
        )),
    }
}
