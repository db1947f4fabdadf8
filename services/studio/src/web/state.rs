//! services/studio/src/web/state.rs
//!
//! Defines the application's shared state.

use sonicwave_core::ports::{
    AudioStorageService, AuthService, DatabaseService, TextToSpeechService,
};
use sonicwave_core::session::{SessionBootstrap, SessionContext};
use sonicwave_core::synthesis::SynthesisQueue;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    /// The single writer of the published session.
    pub session: Arc<SessionBootstrap>,
    /// Read side of the published session, cloned into each request.
    pub context: SessionContext,
    pub synthesis: SynthesisQueue,
}

impl AppState {
    /// Starts the session bootstrap; must run inside the Tokio runtime.
    pub fn new(
        auth: Arc<dyn AuthService>,
        db: Arc<dyn DatabaseService>,
        storage: Arc<dyn AudioStorageService>,
        tts: Arc<dyn TextToSpeechService>,
    ) -> Self {
        let session = Arc::new(SessionBootstrap::start(auth, db.clone()));
        let context = session.context();
        let synthesis = SynthesisQueue::new(tts, storage, db.clone());
        Self {
            db,
            session,
            context,
            synthesis,
        }
    }
}
