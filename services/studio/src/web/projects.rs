//! services/studio/src/web/projects.rs
//!
//! Dashboard and editor endpoints. Every handler here sits behind
//! `require_auth` and reads the caller from the request extensions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonicwave_core::domain::{Identity, Project, VOICES};
use sonicwave_core::routes::Route;
use sonicwave_core::synthesis::JobStatus;
use sonicwave_core::validation::validate_content;
use sonicwave_core::views::dashboard::Dashboard;
use sonicwave_core::views::editor::{Editor, EditorMode, EditorState, SaveOutcome};
use sonicwave_core::views::Phase;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectSummary {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            title: project.title,
            description: project.description,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub greeting_name: String,
    pub plan: String,
    pub plan_name: String,
    /// "10,000" or "Unlimited".
    pub characters_allowance: String,
    pub project_count: usize,
    pub projects: Vec<ProjectSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct VoiceOption {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct EditorResponse {
    /// `None` until the first save.
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub content: String,
    pub character_count: usize,
    pub voice_id: String,
    pub audio_url: Option<String>,
    pub voices: Vec<VoiceOption>,
}

impl From<EditorState> for EditorResponse {
    fn from(state: EditorState) -> Self {
        let character_count = state.character_count();
        let project_id = match state.mode {
            EditorMode::New => None,
            EditorMode::Existing(id) => Some(id),
        };
        Self {
            project_id,
            title: state.title,
            description: state.description,
            content: state.content,
            character_count,
            voice_id: state.voice_id,
            audio_url: state.audio_url,
            voices: VOICES
                .iter()
                .map(|v| VoiceOption {
                    id: v.id.to_string(),
                    name: v.name.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EditorQuery {
    /// Forces a blank project even when a project id is in the path.
    #[serde(default)]
    pub new: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveProjectRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct SaveProjectResponse {
    pub project_id: Uuid,
    /// Where the editor lives after the save.
    pub route: String,
}

#[derive(Serialize, ToSchema)]
pub struct DownloadResponse {
    pub url: String,
    pub filename: String,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateAudioRequest {
    /// Replaces the stored text before generating, when present.
    pub content: Option<String>,
    pub voice_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateAudioResponse {
    pub job_id: Uuid,
    pub project_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct AudioJobResponse {
    pub job_id: Uuid,
    /// One of `queued`, `running`, `completed`, `failed`.
    pub state: String,
    pub audio_url: Option<String>,
    pub voice_id: Option<String>,
    pub error: Option<String>,
}

impl AudioJobResponse {
    fn new(job_id: Uuid, status: JobStatus) -> Self {
        let (state, audio, error) = match status {
            JobStatus::Queued => ("queued", None, None),
            JobStatus::Running => ("running", None, None),
            JobStatus::Completed { audio } => ("completed", Some(audio), None),
            JobStatus::Failed { message } => ("failed", None, Some(message)),
        };
        Self {
            job_id,
            state: state.to_string(),
            audio_url: audio.as_ref().map(|a| a.audio_url.clone()),
            voice_id: audio.map(|a| a.voice_id),
            error,
        }
    }
}

/// Opens the editor on an existing project; a failed load is a 404.
async fn open_existing(state: &AppState, project_id: Uuid) -> Result<Editor, (StatusCode, String)> {
    let editor = Editor::open(state.db.clone(), EditorMode::Existing(project_id)).await;
    match (editor.state().phase(), editor.state().error.clone()) {
        (Phase::Error, Some(message)) => Err((StatusCode::NOT_FOUND, message)),
        _ => Ok(editor),
    }
}

//=========================================================================================
// Dashboard
//=========================================================================================

/// GET /dashboard - Plan summary and the project list
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Failed to load projects")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut view = Dashboard::new(state.db.clone(), &state.context.snapshot());
    view.load().await;

    let dashboard = view.into_state();
    if let Some(message) = dashboard.error.clone() {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, message));
    }
    Ok(Json(DashboardResponse {
        project_count: dashboard.project_count(),
        greeting_name: dashboard.greeting_name,
        plan: dashboard.plan.to_string(),
        plan_name: dashboard.plan_name.to_string(),
        characters_allowance: dashboard.characters_allowance,
        projects: dashboard.projects.into_iter().map(ProjectSummary::from).collect(),
    }))
}

/// DELETE /dashboard/projects/{id} - Delete a project
#[utoipa::path(
    delete,
    path = "/dashboard/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Failed to delete project")
    )
)]
pub async fn delete_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut view = Dashboard::new(state.db.clone(), &state.context.snapshot());
    if view.delete_project(id).await {
        info!("User {} deleted project {}", identity.id, id);
        return Ok(StatusCode::NO_CONTENT);
    }
    let message = view
        .into_state()
        .error
        .unwrap_or_else(|| "Failed to delete project".to_string());
    Err((StatusCode::INTERNAL_SERVER_ERROR, message))
}

//=========================================================================================
// Editor
//=========================================================================================

/// GET /editor - A blank, unsaved project
#[utoipa::path(
    get,
    path = "/editor",
    params(EditorQuery),
    responses(
        (status = 200, description = "Blank editor", body = EditorResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn new_editor_handler(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
    Query(query): Query<EditorQuery>,
) -> Json<EditorResponse> {
    let route = Route::Editor {
        project_id: None,
        new: query.new,
    };
    let mode = route.editor_mode().unwrap_or(EditorMode::New);
    let editor = Editor::open(state.db.clone(), mode).await;
    Json(EditorResponse::from(editor.into_state()))
}

/// POST /editor - First save of a new project
#[utoipa::path(
    post,
    path = "/editor",
    request_body = SaveProjectRequest,
    responses(
        (status = 201, description = "Project created", body = SaveProjectResponse),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Failed to save project")
    )
)]
pub async fn create_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SaveProjectRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut editor = Editor::new_project(state.db.clone());
    editor.set_title(req.title);
    editor.set_description(req.description);
    editor.set_content(req.content);

    match editor.save(identity.id).await {
        Some(SaveOutcome::Created { id, route }) => Ok((
            StatusCode::CREATED,
            Json(SaveProjectResponse {
                project_id: id,
                route: route.to_string(),
            }),
        )),
        Some(SaveOutcome::Updated) => {
            error!("A new editor reported an update instead of a create");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save project".to_string(),
            ))
        }
        None => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            editor
                .into_state()
                .error
                .unwrap_or_else(|| "Failed to save project".to_string()),
        )),
    }
}

/// GET /editor/{id} - Open a saved project
#[utoipa::path(
    get,
    path = "/editor/{id}",
    params(("id" = Uuid, Path, description = "Project id"), EditorQuery),
    responses(
        (status = 200, description = "Project loaded", body = EditorResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Failed to load project")
    )
)]
pub async fn get_editor_handler(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Query(query): Query<EditorQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let route = Route::Editor {
        project_id: Some(id),
        new: query.new,
    };
    let editor = match route.editor_mode() {
        Some(EditorMode::Existing(id)) => open_existing(&state, id).await?,
        _ => Editor::new_project(state.db.clone()),
    };
    Ok(Json(EditorResponse::from(editor.into_state())))
}

/// PUT /editor/{id} - Save changes to a project
#[utoipa::path(
    put,
    path = "/editor/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = SaveProjectRequest,
    responses(
        (status = 200, description = "Project saved", body = SaveProjectResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Failed to load project"),
        (status = 500, description = "Failed to save project")
    )
)]
pub async fn update_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<SaveProjectRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut editor = open_existing(&state, id).await?;
    editor.set_title(req.title);
    editor.set_description(req.description);
    editor.set_content(req.content);

    if editor.save(identity.id).await.is_none() {
        let message = editor
            .into_state()
            .error
            .unwrap_or_else(|| "Failed to save project".to_string());
        return Err((StatusCode::INTERNAL_SERVER_ERROR, message));
    }
    Ok(Json(SaveProjectResponse {
        project_id: id,
        route: Route::editor_for(id).to_string(),
    }))
}

/// GET /editor/{id}/download - Link and file name for the latest audio
#[utoipa::path(
    get,
    path = "/editor/{id}/download",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Audio available", body = DownloadResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No project, or no audio to download")
    )
)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut editor = open_existing(&state, id).await?;
    match editor.download() {
        Some(download) => Ok(Json(DownloadResponse {
            url: download.url,
            filename: download.filename,
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            editor
                .into_state()
                .error
                .unwrap_or_else(|| "No audio to download".to_string()),
        )),
    }
}

/// POST /editor/{id}/audio - Save the project and start generating its audio
#[utoipa::path(
    post,
    path = "/editor/{id}/audio",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = GenerateAudioRequest,
    responses(
        (status = 202, description = "Synthesis job submitted", body = GenerateAudioResponse),
        (status = 400, description = "No text, or an unknown voice"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Failed to load project"),
        (status = 500, description = "Failed to save project")
    )
)]
pub async fn generate_audio_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<GenerateAudioRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut editor = open_existing(&state, id).await?;
    if let Some(content) = req.content {
        editor.set_content(content);
    }
    if let Some(voice_id) = req.voice_id.as_deref() {
        editor
            .set_voice(voice_id)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    }

    validate_content(&editor.state().content).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let Some(handle) = editor.submit_audio(identity.id, &state.synthesis).await else {
        let message = editor
            .into_state()
            .error
            .unwrap_or_else(|| "Failed to save project".to_string());
        return Err((StatusCode::INTERNAL_SERVER_ERROR, message));
    };

    info!("User {} started audio job {} for project {}", identity.id, handle.id, id);
    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateAudioResponse {
            job_id: handle.id,
            project_id: id,
        }),
    ))
}

/// GET /audio-jobs/{id} - Poll a synthesis job
#[utoipa::path(
    get,
    path = "/audio-jobs/{id}",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job status", body = AudioJobResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Unknown job")
    )
)]
pub async fn audio_job_handler(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = state
        .synthesis
        .status(id)
        .ok_or((StatusCode::NOT_FOUND, format!("Audio job {} not found", id)))?;
    Ok(Json(AudioJobResponse::new(id, status)))
}
