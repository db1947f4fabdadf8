//! crates/sonicwave_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the hosted
//! backend (auth, tables, storage) and the speech synthesis provider are only
//! reached through them.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AuthEvent, AuthSession, Identity, NewProfile, NewProject, NewProjectAudio, Profile, Project,
    ProjectAudio, ProjectChanges,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, provider codes).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// A lookup matched zero rows.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected an insert.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound(_))
    }

    /// The message shown to the user, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            PortError::NotFound(m)
            | PortError::Conflict(m)
            | PortError::Unauthorized(m)
            | PortError::Unexpected(m) => m,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The session-change feed. Ends when the provider is dropped.
pub type AuthEventStream = Pin<Box<dyn Stream<Item = AuthEvent> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Returns the current session, refreshing it first if it has expired.
    async fn get_session(&self) -> PortResult<Option<AuthSession>>;

    /// Subscribes to session changes for as long as the stream is held.
    fn subscribe(&self) -> AuthEventStream;

    /// Registers a new account. Providers that require e-mail confirmation
    /// still return the created identity, but no session is started.
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<Identity>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_out(&self) -> PortResult<()>;

    async fn reset_password_for_email(&self, email: &str) -> PortResult<()>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Profiles ---
    /// Fails with `PortError::NotFound` when no row exists for `id`.
    async fn get_profile(&self, id: Uuid) -> PortResult<Profile>;

    /// Fails with `PortError::Conflict` when a row already exists for the id.
    async fn create_profile(&self, profile: NewProfile) -> PortResult<Profile>;

    async fn update_profile_name(&self, id: Uuid, full_name: Option<&str>) -> PortResult<()>;

    // --- Projects ---
    /// All projects visible to the caller, newest first.
    async fn list_projects(&self) -> PortResult<Vec<Project>>;

    async fn get_project(&self, id: Uuid) -> PortResult<Project>;

    async fn create_project(&self, project: NewProject) -> PortResult<Project>;

    async fn update_project(&self, id: Uuid, changes: ProjectChanges) -> PortResult<()>;

    async fn delete_project(&self, id: Uuid) -> PortResult<()>;

    // --- Generated audio ---
    async fn latest_project_audio(&self, project_id: Uuid) -> PortResult<Option<ProjectAudio>>;

    async fn create_project_audio(&self, audio: NewProjectAudio) -> PortResult<ProjectAudio>;
}

#[async_trait]
pub trait AudioStorageService: Send + Sync {
    /// Uploads an artifact and returns the URL it can be played back from.
    async fn store_audio(&self, path: &str, audio: Vec<u8>) -> PortResult<String>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text with one of the catalog voices.
    async fn generate_audio(&self, text: &str, voice_id: &str) -> PortResult<Vec<u8>>;
}
