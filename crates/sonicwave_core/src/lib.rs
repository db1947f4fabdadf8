pub mod domain;
pub mod ports;
pub mod routes;
pub mod session;
pub mod synthesis;
pub mod validation;
pub mod views;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use domain::{
    AuthEvent, AuthEventKind, AuthSession, Identity, Profile, Project, ProjectAudio,
    SubscriptionTier,
};
pub use ports::{
    AudioStorageService, AuthService, DatabaseService, PortError, PortResult, TextToSpeechService,
};
pub use session::{SessionBootstrap, SessionContext, SessionSnapshot};
pub use synthesis::{JobHandle, JobStatus, SynthesisQueue};
