//! crates/sonicwave_core/src/views/editor.rs
//!
//! The project editor. A new project lives only in memory until its first
//! save; from then on the editor works against the stored row.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::Phase;
use crate::domain::{NewProject, ProjectAudio, ProjectChanges, DEFAULT_VOICE_ID};
use crate::ports::{DatabaseService, PortResult};
use crate::routes::Route;
use crate::synthesis::{JobHandle, SynthesisQueue, SynthesisRequest};
use crate::validation::{validate_content, validate_voice, ValidationError};

pub const DEFAULT_TITLE: &str = "Untitled Project";
pub const DEFAULT_CONTENT: &str = "Welcome to SonicWave";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "project_id", rename_all = "snake_case")]
pub enum EditorMode {
    New,
    Existing(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorState {
    pub mode: EditorMode,
    pub title: String,
    pub description: String,
    pub content: String,
    pub voice_id: String,
    pub audio_url: Option<String>,
    pub loading: bool,
    pub saving: bool,
    pub generating: bool,
    pub error: Option<String>,
}

impl EditorState {
    fn blank(mode: EditorMode) -> Self {
        Self {
            mode,
            title: DEFAULT_TITLE.to_string(),
            description: String::new(),
            content: DEFAULT_CONTENT.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            audio_url: None,
            loading: false,
            saving: false,
            generating: false,
            error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::of(self.loading, self.error.as_deref())
    }

    pub fn character_count(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The first save of a new project; the editor now lives at `route`.
    Created { id: Uuid, route: Route },
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioDownload {
    pub url: String,
    pub filename: String,
}

pub struct Editor {
    db: Arc<dyn DatabaseService>,
    state: EditorState,
}

impl Editor {
    pub fn new_project(db: Arc<dyn DatabaseService>) -> Self {
        Self {
            db,
            state: EditorState::blank(EditorMode::New),
        }
    }

    /// Opens the editor in `mode`, loading the project and its latest audio
    /// for an existing one.
    pub async fn open(db: Arc<dyn DatabaseService>, mode: EditorMode) -> Self {
        let mut editor = Self {
            db,
            state: EditorState::blank(mode),
        };
        if let EditorMode::Existing(id) = mode {
            editor.state.loading = true;
            editor.load(id).await;
        }
        editor
    }

    async fn load(&mut self, id: Uuid) {
        match self.db.get_project(id).await {
            Ok(project) => {
                self.state.title = project.title;
                self.state.description = project.description.unwrap_or_default();
                self.state.content = project.content;
            }
            Err(e) => {
                error!("Failed to load project {}: {}", id, e);
                self.state.error = Some("Failed to load project".to_string());
                self.state.loading = false;
                return;
            }
        }

        match self.db.latest_project_audio(id).await {
            Ok(Some(audio)) => self.apply_audio(audio),
            Ok(None) => {}
            Err(e) => {
                error!("Failed to load audio for project {}: {}", id, e);
                self.state.error = Some("Failed to load project".to_string());
            }
        }
        self.state.loading = false;
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn into_state(self) -> EditorState {
        self.state
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.state.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.state.description = description.into();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.state.content = content.into();
    }

    pub fn set_voice(&mut self, voice_id: &str) -> Result<(), ValidationError> {
        validate_voice(voice_id)?;
        self.state.voice_id = voice_id.to_string();
        Ok(())
    }

    pub fn character_count(&self) -> usize {
        self.state.character_count()
    }

    /// Inserts a new project or updates the current one. Returns `None` and
    /// sets the error slot when the backend rejects the write.
    pub async fn save(&mut self, owner: Uuid) -> Option<SaveOutcome> {
        self.state.saving = true;
        self.state.error = None;
        let result = self.persist(owner).await;
        self.state.saving = false;

        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Failed to save project: {}", e);
                self.state.error = Some("Failed to save project".to_string());
                None
            }
        }
    }

    async fn persist(&mut self, owner: Uuid) -> PortResult<SaveOutcome> {
        let description = match self.state.description.trim() {
            "" => None,
            text => Some(text.to_string()),
        };

        match self.state.mode {
            EditorMode::New => {
                let title = match self.state.title.trim() {
                    "" => DEFAULT_TITLE.to_string(),
                    _ => self.state.title.clone(),
                };
                let project = self
                    .db
                    .create_project(NewProject {
                        user_id: owner,
                        title,
                        description,
                        content: self.state.content.clone(),
                    })
                    .await?;
                info!("Created project {} for {}", project.id, owner);
                self.state.mode = EditorMode::Existing(project.id);
                self.state.title = project.title;
                Ok(SaveOutcome::Created {
                    id: project.id,
                    route: Route::editor_for(project.id),
                })
            }
            EditorMode::Existing(id) => {
                self.db
                    .update_project(
                        id,
                        ProjectChanges {
                            title: self.state.title.clone(),
                            description,
                            content: self.state.content.clone(),
                            updated_at: Utc::now(),
                        },
                    )
                    .await?;
                Ok(SaveOutcome::Updated)
            }
        }
    }

    /// Validates the text, persists the project, and submits a synthesis
    /// job for it. The returned handle resolves once the audio is recorded.
    pub async fn submit_audio(&mut self, owner: Uuid, queue: &SynthesisQueue) -> Option<JobHandle> {
        if let Err(e) = validate_content(&self.state.content) {
            self.state.error = Some(e.to_string());
            return None;
        }

        self.save(owner).await?;
        let EditorMode::Existing(project_id) = self.state.mode else {
            return None;
        };

        self.state.generating = true;
        Some(queue.submit(SynthesisRequest {
            project_id,
            text: self.state.content.clone(),
            voice_id: self.state.voice_id.clone(),
        }))
    }

    /// Applies the outcome of a job started by [`Editor::submit_audio`].
    pub async fn finish_audio(&mut self, handle: &mut JobHandle) -> Option<ProjectAudio> {
        let result = handle.wait().await;
        self.state.generating = false;

        match result {
            Ok(audio) => {
                self.apply_audio(audio.clone());
                Some(audio)
            }
            Err(e) => {
                error!("Failed to generate audio: {}", e);
                self.state.error = Some("Failed to generate audio".to_string());
                None
            }
        }
    }

    pub async fn generate_audio(&mut self, owner: Uuid, queue: &SynthesisQueue) -> Option<ProjectAudio> {
        let mut handle = self.submit_audio(owner, queue).await?;
        self.finish_audio(&mut handle).await
    }

    fn apply_audio(&mut self, audio: ProjectAudio) {
        self.state.audio_url = Some(audio.audio_url);
        self.state.voice_id = audio.voice_id;
    }

    pub fn download(&mut self) -> Option<AudioDownload> {
        let Some(url) = self.state.audio_url.clone() else {
            self.state.error = Some("No audio to download".to_string());
            return None;
        };
        let stem = match self.state.title.trim() {
            "" => "audio",
            title => title,
        };
        Some(AudioDownload {
            url,
            filename: format!("{}.mp3", stem),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortError;
    use crate::testing::{FakeSpeech, InMemoryBackend, Op};
    use chrono::Duration;

    fn queue(backend: &InMemoryBackend, speech: &FakeSpeech) -> SynthesisQueue {
        SynthesisQueue::new(
            Arc::new(speech.clone()),
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
        )
    }

    #[test]
    fn new_project_defaults() {
        let editor = Editor::new_project(Arc::new(InMemoryBackend::new()));
        let state = editor.state();
        assert_eq!(state.mode, EditorMode::New);
        assert_eq!(state.title, "Untitled Project");
        assert_eq!(state.content, "Welcome to SonicWave");
        assert_eq!(state.voice_id, "en-US-1");
        assert_eq!(editor.character_count(), 20);
        assert_eq!(state.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn first_save_switches_to_existing_and_later_saves_update_it() {
        let backend = InMemoryBackend::new();
        let owner = Uuid::new_v4();
        let mut editor = Editor::new_project(Arc::new(backend.clone()));
        editor.set_title("   ");
        editor.set_content("Chapter one");

        let (id, route) = match editor.save(owner).await {
            Some(SaveOutcome::Created { id, route }) => (id, route),
            other => panic!("expected a created project, got {:?}", other),
        };
        assert_eq!(route.to_string(), format!("/editor/{}", id));
        assert_eq!(editor.state().mode, EditorMode::Existing(id));
        assert_eq!(editor.state().title, "Untitled Project");

        editor.set_title("Chapter 1");
        editor.set_description("draft");
        assert_eq!(editor.save(owner).await, Some(SaveOutcome::Updated));
        editor.set_content("Chapter one, revised");
        assert_eq!(editor.save(owner).await, Some(SaveOutcome::Updated));

        let projects = backend.projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, id);
        assert_eq!(projects[0].user_id, owner);
        assert_eq!(projects[0].title, "Chapter 1");
        assert_eq!(projects[0].description.as_deref(), Some("draft"));
        assert_eq!(projects[0].content, "Chapter one, revised");
        assert_eq!(backend.project_updates(), vec![id, id]);
        assert_eq!(backend.calls(Op::CreateProject), 1);
    }

    #[tokio::test]
    async fn failed_save_keeps_new_mode() {
        let backend = InMemoryBackend::new();
        backend.fail_next(Op::CreateProject, PortError::Unauthorized("rls".into()));
        let mut editor = Editor::new_project(Arc::new(backend.clone()));

        assert!(editor.save(Uuid::new_v4()).await.is_none());
        assert_eq!(editor.state().mode, EditorMode::New);
        assert_eq!(editor.state().error.as_deref(), Some("Failed to save project"));
        assert!(!editor.state().saving);
    }

    #[tokio::test]
    async fn opening_a_project_loads_its_latest_audio() {
        let backend = InMemoryBackend::new();
        let owner = Uuid::new_v4();
        let project = backend.seed_project(owner, "Podcast", Utc::now());
        let now = Utc::now();
        backend.seed_audio(project.id, "en-US-2", "https://cdn/old.mp3", now - Duration::minutes(5));
        backend.seed_audio(project.id, "en-GB-1", "https://cdn/new.mp3", now);

        let editor = Editor::open(Arc::new(backend), EditorMode::Existing(project.id)).await;
        let state = editor.state();
        assert_eq!(state.title, "Podcast");
        assert_eq!(state.content, "Podcast content");
        assert_eq!(state.audio_url.as_deref(), Some("https://cdn/new.mp3"));
        assert_eq!(state.voice_id, "en-GB-1");
        assert_eq!(state.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn opening_a_missing_project_sets_the_error() {
        let backend = InMemoryBackend::new();
        let editor = Editor::open(Arc::new(backend.clone()), EditorMode::Existing(Uuid::new_v4())).await;
        assert_eq!(editor.state().error.as_deref(), Some("Failed to load project"));
        assert_eq!(editor.state().phase(), Phase::Error);
        assert_eq!(backend.calls(Op::LatestAudio), 0);
    }

    #[tokio::test]
    async fn generating_audio_persists_a_new_project_first() {
        let backend = InMemoryBackend::new();
        let speech = FakeSpeech::new();
        let queue = queue(&backend, &speech);
        let owner = Uuid::new_v4();
        let mut editor = Editor::new_project(Arc::new(backend.clone()));
        editor.set_content("Read me aloud");
        editor.set_voice("en-GB-2").unwrap();

        let audio = editor.generate_audio(owner, &queue).await.unwrap();

        let projects = backend.projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(audio.project_id, projects[0].id);
        assert_eq!(editor.state().mode, EditorMode::Existing(projects[0].id));
        assert_eq!(editor.state().audio_url.as_deref(), Some(audio.audio_url.as_str()));
        assert!(!editor.state().generating);
        assert_eq!(
            speech.requests(),
            vec![("Read me aloud".to_string(), "en-GB-2".to_string())]
        );
    }

    #[tokio::test]
    async fn blank_content_is_rejected_before_any_call() {
        let backend = InMemoryBackend::new();
        let speech = FakeSpeech::new();
        let queue = queue(&backend, &speech);
        let mut editor = Editor::new_project(Arc::new(backend.clone()));
        editor.set_content("   ");

        assert!(editor.generate_audio(Uuid::new_v4(), &queue).await.is_none());
        assert_eq!(editor.state().error.as_deref(), Some("Enter some text to convert"));
        assert_eq!(backend.calls(Op::CreateProject), 0);
        assert!(speech.requests().is_empty());
    }

    #[tokio::test]
    async fn failed_synthesis_sets_the_error() {
        let backend = InMemoryBackend::new();
        let speech = FakeSpeech::new();
        speech.fail_next(PortError::Unexpected("provider down".into()));
        let queue = queue(&backend, &speech);
        let mut editor = Editor::new_project(Arc::new(backend.clone()));

        assert!(editor.generate_audio(Uuid::new_v4(), &queue).await.is_none());
        assert_eq!(editor.state().error.as_deref(), Some("Failed to generate audio"));
        assert!(editor.state().audio_url.is_none());
        assert!(!editor.state().generating);
    }

    #[tokio::test]
    async fn download_needs_audio() {
        let backend = InMemoryBackend::new();
        let project = backend.seed_project(Uuid::new_v4(), "Episode 4", Utc::now());
        let mut editor = Editor::open(Arc::new(backend.clone()), EditorMode::Existing(project.id)).await;
        assert!(editor.download().is_none());
        assert_eq!(editor.state().error.as_deref(), Some("No audio to download"));

        backend.seed_audio(project.id, "en-US-1", "https://cdn/ep4.mp3", Utc::now());
        let mut editor = Editor::open(Arc::new(backend), EditorMode::Existing(project.id)).await;
        assert_eq!(
            editor.download(),
            Some(AudioDownload {
                url: "https://cdn/ep4.mp3".into(),
                filename: "Episode 4.mp3".into(),
            })
        );
        editor.set_title("");
        assert_eq!(editor.download().map(|d| d.filename), Some("audio.mp3".into()));
    }

    #[test]
    fn unknown_voice_is_refused() {
        let mut editor = Editor::new_project(Arc::new(InMemoryBackend::new()));
        assert!(editor.set_voice("alloy").is_err());
        assert_eq!(editor.state().voice_id, "en-US-1");
    }
}
