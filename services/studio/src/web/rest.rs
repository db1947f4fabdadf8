//! services/studio/src/web/rest.rs
//!
//! Contains the Axum handlers for the session, profile, and settings
//! endpoints, and the master definition for the OpenAPI specification.

use crate::web::{auth, projects, state::AppState};
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonicwave_core::domain::Identity;
use sonicwave_core::session::SessionSnapshot;
use sonicwave_core::views::profile::ProfileEditor;
use sonicwave_core::views::settings::{settings, PlanCard};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        session_handler,
        get_profile_handler,
        update_profile_handler,
        settings_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::reset_password_handler,
        projects::dashboard_handler,
        projects::delete_project_handler,
        projects::new_editor_handler,
        projects::create_project_handler,
        projects::get_editor_handler,
        projects::update_project_handler,
        projects::download_handler,
        projects::generate_audio_handler,
        projects::audio_job_handler,
    ),
    components(schemas(
        SessionResponse,
        ProfileResponse,
        UpdateProfileRequest,
        SettingsResponse,
        PlanResponse,
        auth::SignupRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        auth::ResetPasswordRequest,
        auth::ResetPasswordResponse,
        projects::DashboardResponse,
        projects::ProjectSummary,
        projects::EditorResponse,
        projects::VoiceOption,
        projects::SaveProjectRequest,
        projects::SaveProjectResponse,
        projects::DownloadResponse,
        projects::GenerateAudioRequest,
        projects::GenerateAudioResponse,
        projects::AudioJobResponse,
    )),
    tags(
        (name = "SonicWave Studio API", description = "Text-to-speech projects, profiles, and plans.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The published session as the shell sees it.
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub loading: bool,
    pub authenticated: bool,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub display_name: String,
    pub tier: String,
    pub error: Option<String>,
}

impl From<&SessionSnapshot> for SessionResponse {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            loading: snapshot.loading,
            authenticated: snapshot.is_authenticated(),
            user_id: snapshot.identity.as_ref().map(|i| i.id),
            email: snapshot.identity.as_ref().and_then(|i| i.email.clone()),
            display_name: snapshot.display_name().to_string(),
            tier: snapshot.tier().to_string(),
            error: snapshot.error.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub full_name: String,
    pub email: Option<String>,
    pub member_since: Option<DateTime<Utc>>,
    pub tier: String,
    pub saved: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: String,
}

#[derive(Serialize, ToSchema)]
pub struct PlanResponse {
    pub tier: String,
    pub name: String,
    pub price: String,
    pub monthly: bool,
    pub features: Vec<String>,
    pub highlighted: bool,
    pub current: bool,
}

impl From<PlanCard> for PlanResponse {
    fn from(card: PlanCard) -> Self {
        Self {
            tier: card.plan.tier.to_string(),
            name: card.plan.name.to_string(),
            price: card.plan.price.to_string(),
            monthly: card.plan.monthly,
            features: card.plan.features.iter().map(|f| f.to_string()).collect(),
            highlighted: card.plan.highlighted,
            current: card.current,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SettingsResponse {
    pub current_tier: String,
    pub plans: Vec<PlanResponse>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// The current session snapshot. Never waits for the bootstrap.
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "Current session", body = SessionResponse))
)]
pub async fn session_handler(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    Json(SessionResponse::from(&state.context.snapshot()))
}

/// The signed-in user's profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
) -> Json<ProfileResponse> {
    let snapshot = state.context.snapshot();
    let view = ProfileEditor::new(state.db.clone(), &snapshot);
    let profile = view.into_state();
    Json(ProfileResponse {
        full_name: profile.full_name,
        email: profile.email,
        member_since: profile.member_since,
        tier: snapshot.tier().to_string(),
        saved: profile.saved,
    })
}

/// Update the display name, then republish the profile.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Failed to update profile")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let snapshot = state.context.snapshot();
    let mut view = ProfileEditor::new(state.db.clone(), &snapshot);
    view.set_full_name(req.full_name);

    if !view.save().await {
        let message = view
            .into_state()
            .error
            .unwrap_or_else(|| "Failed to update profile".to_string());
        error!("Profile update for {} failed: {}", identity.id, message);
        return Err((StatusCode::INTERNAL_SERVER_ERROR, message));
    }
    state.session.reload_profile().await;

    let profile = view.into_state();
    Ok(Json(ProfileResponse {
        full_name: profile.full_name.trim().to_string(),
        email: profile.email,
        member_since: profile.member_since,
        tier: state.context.snapshot().tier().to_string(),
        saved: profile.saved,
    }))
}

/// The plan catalog with the current plan marked.
#[utoipa::path(
    get,
    path = "/settings",
    responses(
        (status = 200, description = "Plans", body = SettingsResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn settings_handler(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
) -> Json<SettingsResponse> {
    let view = settings(&state.context.snapshot());
    Json(SettingsResponse {
        current_tier: view.current_tier.to_string(),
        plans: view.plans.into_iter().map(PlanResponse::from).collect(),
    })
}
