//! crates/sonicwave_core/src/testing.rs
//!
//! An in-memory stand-in for the hosted backend and the speech provider.
//! It records every call, can be told to fail the next call of a given
//! operation, and lets tests drive the session-change feed by hand.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use crate::domain::{
    AuthEvent, AuthEventKind, AuthSession, Identity, NewProfile, NewProject, NewProjectAudio,
    Profile, Project, ProjectAudio, ProjectChanges, SubscriptionTier,
};
use crate::ports::{
    AudioStorageService, AuthEventStream, AuthService, DatabaseService, PortError, PortResult,
    TextToSpeechService,
};

/// Every operation the fake can count or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetSession,
    SignUp,
    SignIn,
    SignOut,
    ResetPassword,
    GetProfile,
    CreateProfile,
    UpdateProfile,
    ListProjects,
    GetProject,
    CreateProject,
    UpdateProject,
    DeleteProject,
    LatestAudio,
    CreateAudio,
    StoreAudio,
    Synthesize,
}

#[derive(Default)]
struct Tables {
    session: Option<AuthSession>,
    accounts: HashMap<String, (String, Identity)>,
    profiles: HashMap<Uuid, Profile>,
    projects: Vec<Project>,
    audio: Vec<ProjectAudio>,
    objects: HashMap<String, Vec<u8>>,
    calls: HashMap<Op, usize>,
    failures: HashMap<Op, PortError>,
    profile_inserts: Vec<NewProfile>,
    project_updates: Vec<Uuid>,
    reset_requests: Vec<String>,
    last_stamp: Option<DateTime<Utc>>,
    auto_events: bool,
}

/// The hosted backend, in memory.
#[derive(Clone)]
pub struct InMemoryBackend {
    tables: Arc<Mutex<Tables>>,
    events: broadcast::Sender<AuthEvent>,
    session_gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        let tables = Tables {
            auto_events: true,
            ..Tables::default()
        };
        Self {
            tables: Arc::new(Mutex::new(tables)),
            events,
            session_gate: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts the call and returns the injected failure, if one is pending.
    fn enter(&self, op: Op) -> PortResult<MutexGuard<'_, Tables>> {
        let mut tables = self.lock();
        *tables.calls.entry(op).or_default() += 1;
        match tables.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(tables),
        }
    }

    // --- Fixtures ---

    pub fn identity(id: Uuid, email: &str) -> Identity {
        Identity {
            id,
            email: Some(email.to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn session_for(identity: Identity) -> AuthSession {
        AuthSession {
            access_token: format!("access-{}", identity.id),
            refresh_token: format!("refresh-{}", identity.id),
            expires_at: Utc::now() + Duration::hours(1),
            identity,
        }
    }

    /// Starts the backend with `identity` already signed in.
    pub fn with_signed_in(self, identity: Identity) -> Self {
        self.lock().session = Some(Self::session_for(identity));
        self
    }

    pub fn add_account(&self, email: &str, password: &str) -> Identity {
        let identity = Self::identity(Uuid::new_v4(), email);
        self.lock()
            .accounts
            .insert(email.to_string(), (password.to_string(), identity.clone()));
        identity
    }

    pub fn seed_profile(&self, id: Uuid, full_name: Option<&str>, tier: SubscriptionTier) -> Profile {
        let now = Utc::now();
        let profile = Profile {
            id,
            full_name: full_name.map(str::to_string),
            subscription_tier: tier,
            created_at: now,
            updated_at: now,
        };
        self.lock().profiles.insert(id, profile.clone());
        profile
    }

    pub fn seed_project(&self, user_id: Uuid, title: &str, created_at: DateTime<Utc>) -> Project {
        let project = Project {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            description: None,
            content: format!("{title} content"),
            created_at,
            updated_at: created_at,
        };
        self.lock().projects.push(project.clone());
        project
    }

    pub fn seed_audio(&self, project_id: Uuid, voice_id: &str, url: &str, created_at: DateTime<Utc>) {
        self.lock().audio.push(ProjectAudio {
            id: Uuid::new_v4(),
            project_id,
            voice_id: voice_id.to_string(),
            audio_url: url.to_string(),
            created_at,
        });
    }

    // --- Failure injection and feed control ---

    /// Makes the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: Op, err: PortError) {
        self.lock().failures.insert(op, err);
    }

    /// When disabled, sign-in and sign-out no longer publish to the feed.
    pub fn set_auto_events(&self, enabled: bool) {
        self.lock().auto_events = enabled;
    }

    pub fn emit(&self, kind: AuthEventKind, session: Option<AuthSession>) {
        let _ = self.events.send(AuthEvent { kind, session });
    }

    /// Replaces the current session without notifying subscribers.
    pub fn set_session(&self, session: Option<AuthSession>) {
        self.lock().session = session;
    }

    /// Holds every `get_session` call until `release_get_session`.
    pub fn hold_get_session(&self) {
        *self
            .session_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(Notify::new()));
    }

    pub fn release_get_session(&self) {
        let gate = self
            .session_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(gate) = gate {
            gate.notify_one();
        }
    }

    // --- Inspection ---

    pub fn calls(&self, op: Op) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn profile_inserts(&self) -> Vec<NewProfile> {
        self.lock().profile_inserts.clone()
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        self.lock().profiles.get(&id).cloned()
    }

    pub fn profile_count(&self) -> usize {
        self.lock().profiles.len()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    pub fn project_updates(&self) -> Vec<Uuid> {
        self.lock().project_updates.clone()
    }

    pub fn audio_rows(&self) -> Vec<ProjectAudio> {
        self.lock().audio.clone()
    }

    pub fn stored_object(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(path).cloned()
    }

    pub fn reset_requests(&self) -> Vec<String> {
        self.lock().reset_requests.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

/// Strictly increasing timestamps so inserts order deterministically.
fn next_stamp(tables: &mut Tables) -> DateTime<Utc> {
    let now = Utc::now();
    let stamp = match tables.last_stamp {
        Some(last) if last >= now => last + Duration::milliseconds(1),
        _ => now,
    };
    tables.last_stamp = Some(stamp);
    stamp
}

#[async_trait]
impl AuthService for InMemoryBackend {
    async fn get_session(&self) -> PortResult<Option<AuthSession>> {
        let gate = self
            .session_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let tables = self.enter(Op::GetSession)?;
        Ok(tables.session.clone())
    }

    fn subscribe(&self) -> AuthEventStream {
        let mut rx = self.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<Identity>> {
        let mut tables = self.enter(Op::SignUp)?;
        if tables.accounts.contains_key(email) {
            return Err(PortError::Conflict("User already registered".to_string()));
        }
        let identity = Self::identity(Uuid::new_v4(), email);
        tables
            .accounts
            .insert(email.to_string(), (password.to_string(), identity.clone()));
        Ok(Some(identity))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let (session, notify) = {
            let mut tables = self.enter(Op::SignIn)?;
            let identity = match tables.accounts.get(email) {
                Some((stored, identity)) if stored == password => identity.clone(),
                _ => {
                    return Err(PortError::Unauthorized(
                        "Invalid login credentials".to_string(),
                    ))
                }
            };
            let session = Self::session_for(identity);
            tables.session = Some(session.clone());
            (session, tables.auto_events)
        };
        if notify {
            self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        }
        Ok(session)
    }

    async fn sign_out(&self) -> PortResult<()> {
        let notify = {
            let mut tables = self.enter(Op::SignOut)?;
            tables.session = None;
            tables.auto_events
        };
        if notify {
            self.emit(AuthEventKind::SignedOut, None);
        }
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str) -> PortResult<()> {
        let mut tables = self.enter(Op::ResetPassword)?;
        tables.reset_requests.push(email.to_string());
        Ok(())
    }
}

#[async_trait]
impl DatabaseService for InMemoryBackend {
    async fn get_profile(&self, id: Uuid) -> PortResult<Profile> {
        let tables = self.enter(Op::GetProfile)?;
        tables
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", id)))
    }

    async fn create_profile(&self, profile: NewProfile) -> PortResult<Profile> {
        let mut tables = self.enter(Op::CreateProfile)?;
        tables.profile_inserts.push(profile.clone());
        if tables.profiles.contains_key(&profile.id) {
            return Err(PortError::Conflict(format!(
                "duplicate key value violates unique constraint \"user_profiles_pkey\" ({})",
                profile.id
            )));
        }
        let now = next_stamp(&mut tables);
        let row = Profile {
            id: profile.id,
            full_name: profile.full_name,
            subscription_tier: SubscriptionTier::Free,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_profile_name(&self, id: Uuid, full_name: Option<&str>) -> PortResult<()> {
        let mut tables = self.enter(Op::UpdateProfile)?;
        let now = next_stamp(&mut tables);
        if let Some(row) = tables.profiles.get_mut(&id) {
            row.full_name = full_name.map(str::to_string);
            row.updated_at = now;
        }
        Ok(())
    }

    async fn list_projects(&self) -> PortResult<Vec<Project>> {
        let tables = self.enter(Op::ListProjects)?;
        let mut projects = tables.projects.clone();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_project(&self, id: Uuid) -> PortResult<Project> {
        let tables = self.enter(Op::GetProject)?;
        tables
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Project {} not found", id)))
    }

    async fn create_project(&self, project: NewProject) -> PortResult<Project> {
        let mut tables = self.enter(Op::CreateProject)?;
        let now = next_stamp(&mut tables);
        let row = Project {
            id: Uuid::new_v4(),
            user_id: project.user_id,
            title: project.title,
            description: project.description,
            content: project.content,
            created_at: now,
            updated_at: now,
        };
        tables.projects.push(row.clone());
        Ok(row)
    }

    async fn update_project(&self, id: Uuid, changes: ProjectChanges) -> PortResult<()> {
        let mut tables = self.enter(Op::UpdateProject)?;
        tables.project_updates.push(id);
        if let Some(row) = tables.projects.iter_mut().find(|p| p.id == id) {
            row.title = changes.title;
            row.description = changes.description;
            row.content = changes.content;
            row.updated_at = changes.updated_at;
        }
        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> PortResult<()> {
        let mut tables = self.enter(Op::DeleteProject)?;
        tables.projects.retain(|p| p.id != id);
        Ok(())
    }

    async fn latest_project_audio(&self, project_id: Uuid) -> PortResult<Option<ProjectAudio>> {
        let tables = self.enter(Op::LatestAudio)?;
        Ok(tables
            .audio
            .iter()
            .filter(|a| a.project_id == project_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn create_project_audio(&self, audio: NewProjectAudio) -> PortResult<ProjectAudio> {
        let mut tables = self.enter(Op::CreateAudio)?;
        let now = next_stamp(&mut tables);
        let row = ProjectAudio {
            id: audio.id,
            project_id: audio.project_id,
            voice_id: audio.voice_id,
            audio_url: audio.audio_url,
            created_at: now,
        };
        tables.audio.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl AudioStorageService for InMemoryBackend {
    async fn store_audio(&self, path: &str, audio: Vec<u8>) -> PortResult<String> {
        let mut tables = self.enter(Op::StoreAudio)?;
        tables.objects.insert(path.to_string(), audio);
        Ok(format!("memory://project-audio/{}", path))
    }
}

/// A speech provider that "speaks" by echoing the voice and text as bytes.
#[derive(Clone, Default)]
pub struct FakeSpeech {
    calls: Arc<Mutex<Vec<(String, String)>>>,
    failure: Arc<Mutex<Option<PortError>>>,
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, err: PortError) {
        *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(err);
    }

    /// `(text, voice_id)` of every request, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl TextToSpeechService for FakeSpeech {
    async fn generate_audio(&self, text: &str, voice_id: &str) -> PortResult<Vec<u8>> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((text.to_string(), voice_id.to_string()));
        if let Some(err) = self.failure.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(err);
        }
        Ok(format!("{}:{}", voice_id, text).into_bytes())
    }
}
