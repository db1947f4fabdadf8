//! crates/sonicwave_core/src/session.rs
//!
//! The session/profile bootstrap: resolves the current identity, makes sure a
//! profile row exists for it, and keeps the published value current while the
//! auth provider reports session changes.
//!
//! The bootstrap is the only writer of the published [`SessionSnapshot`].
//! Everything else reads it through a [`SessionContext`], which is handed to
//! views and handlers explicitly.

use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{AuthEvent, AuthEventKind, Identity, NewProfile, Profile, SubscriptionTier};
use crate::ports::{AuthEventStream, AuthService, DatabaseService, PortError, PortResult};

//=========================================================================================
// Published value
//=========================================================================================

/// Identity and profile as currently known, plus the bootstrap's own status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    /// True until the first session lookup has finished.
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            identity: None,
            profile: None,
            loading: true,
            error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Falls back to the free tier while the profile is absent.
    pub fn tier(&self) -> SubscriptionTier {
        self.profile
            .as_ref()
            .map(|p| p.subscription_tier)
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.full_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or("User")
    }
}

//=========================================================================================
// Read side
//=========================================================================================

/// Read-only handle on the published session.
#[derive(Clone)]
pub struct SessionContext {
    rx: watch::Receiver<SessionSnapshot>,
}

impl SessionContext {
    pub fn snapshot(&self) -> SessionSnapshot {
        self.rx.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.rx.borrow().identity.clone()
    }

    /// Waits for the next publish. Returns `false` once the bootstrap is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until the published value satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        self.rx.wait_for(predicate).await.ok().map(|s| s.clone())
    }

    pub async fn wait_until_loaded(&mut self) -> Option<SessionSnapshot> {
        self.wait_for(|s| !s.loading).await
    }
}

//=========================================================================================
// Write side
//=========================================================================================

/// Publishes into the watch channel only while the owning scope is alive.
struct Publisher {
    tx: watch::Sender<SessionSnapshot>,
    token: CancellationToken,
    /// Held across a sign-in; names the identity whose `SignedIn` echo from
    /// the feed is already handled.
    sign_in_echo: Mutex<Option<Uuid>>,
}

impl Publisher {
    fn publish(&self, update: impl FnOnce(&mut SessionSnapshot)) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.tx.send_modify(update);
        true
    }

    fn set_error(&self, err: &PortError) {
        let message = err.message().to_string();
        self.publish(|s| s.error = Some(message));
    }

    fn clear(&self) {
        self.publish(|s| {
            s.identity = None;
            s.profile = None;
        });
    }

    /// Publishes `identity`, then read-or-creates its profile.
    async fn adopt(&self, db: &dyn DatabaseService, identity: Identity) {
        let id = identity.id;
        let live = self.publish(|s| {
            if s.identity.as_ref().map(|i| i.id) != Some(id) {
                s.profile = None;
            }
            s.identity = Some(identity);
        });
        if !live {
            return;
        }

        match resolve_profile(db, id).await {
            Ok(profile) => self.publish_profile(profile),
            Err(e) => {
                error!("Failed to resolve profile for {}: {}", id, e);
                let message = e.message().to_string();
                self.publish(|s| {
                    if s.identity.as_ref().map(|i| i.id) == Some(id) {
                        s.profile = None;
                    }
                    s.error = Some(message);
                });
            }
        }
    }

    /// A profile is only published next to the identity it belongs to.
    fn publish_profile(&self, profile: Profile) {
        self.publish(|s| {
            if s.identity.as_ref().map(|i| i.id) == Some(profile.id) {
                s.profile = Some(profile);
            }
        });
    }
}

/// Reads the profile for `id`, creating it when the read reports not-found.
///
/// An insert that loses a race against a concurrent session comes back as
/// `PortError::Conflict`; the row that session created is then read back.
pub async fn resolve_profile(db: &dyn DatabaseService, id: Uuid) -> PortResult<Profile> {
    match db.get_profile(id).await {
        Ok(profile) => Ok(profile),
        Err(PortError::NotFound(_)) => {
            info!("No profile for {}, creating one.", id);
            let new_profile = NewProfile {
                id,
                full_name: None,
            };
            match db.create_profile(new_profile).await {
                Ok(profile) => Ok(profile),
                Err(PortError::Conflict(reason)) => {
                    warn!("Profile for {} was created concurrently ({}), reading it back.", id, reason);
                    db.get_profile(id).await
                }
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

/// Owns the published session for the lifetime of the application shell.
pub struct SessionBootstrap {
    auth: Arc<dyn AuthService>,
    db: Arc<dyn DatabaseService>,
    publisher: Arc<Publisher>,
    task: JoinHandle<()>,
}

impl SessionBootstrap {
    /// Subscribes to the session feed, then resolves the current session in
    /// the background. Must be called from within a Tokio runtime.
    pub fn start(auth: Arc<dyn AuthService>, db: Arc<dyn DatabaseService>) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::initial());
        let publisher = Arc::new(Publisher {
            tx,
            token: CancellationToken::new(),
            sign_in_echo: Mutex::new(None),
        });

        let events = auth.subscribe();
        let task = tokio::spawn(run(auth.clone(), db.clone(), publisher.clone(), events));

        Self {
            auth,
            db,
            publisher,
            task,
        }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            rx: self.publisher.tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.publisher.tx.borrow().clone()
    }

    /// Stops publishing. Late session lookups and events become no-ops.
    pub fn shutdown(&self) {
        self.publisher.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.publisher.token.is_cancelled() && !self.task.is_finished()
    }

    fn clear_error(&self) {
        self.publisher.publish(|s| s.error = None);
    }

    fn capture(&self, err: PortError) -> PortError {
        warn!("Auth request failed: {}", err);
        self.publisher.set_error(&err);
        err
    }

    /// Registers an account and seeds its profile with `display_name`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> PortResult<Option<Identity>> {
        self.clear_error();
        let identity = self
            .auth
            .sign_up(email, password)
            .await
            .map_err(|e| self.capture(e))?;

        if let Some(identity) = &identity {
            self.seed_profile(identity.id, display_name).await;
        }
        Ok(identity)
    }

    async fn seed_profile(&self, id: Uuid, display_name: Option<&str>) {
        let new_profile = NewProfile {
            id,
            full_name: display_name.map(str::to_string),
        };
        match self.db.create_profile(new_profile).await {
            Ok(profile) => self.publisher.publish_profile(profile),
            Err(PortError::Conflict(_)) => {
                // The bootstrap got there first with an unnamed row.
                if let Err(e) = self.db.update_profile_name(id, display_name).await {
                    warn!("Failed to name profile {}: {}", id, e);
                    return;
                }
                match self.db.get_profile(id).await {
                    Ok(profile) => self.publisher.publish_profile(profile),
                    Err(e) => warn!("Failed to re-read profile {}: {}", id, e),
                }
            }
            Err(e) => warn!("Failed to seed profile {}: {}", id, e),
        }
    }

    /// Signs in and publishes the identity without waiting for the feed.
    ///
    /// The provider's `SignedIn` event for the same identity is absorbed, so
    /// read-or-create runs once per sign-in.
    pub async fn sign_in(&self, email: &str, password: &str) -> PortResult<Identity> {
        self.clear_error();
        let mut echo = self.publisher.sign_in_echo.lock().await;
        let session = self
            .auth
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| self.capture(e))?;

        let identity = session.identity;
        info!("Signed in as {}", identity.id);
        *echo = Some(identity.id);
        self.publisher.adopt(self.db.as_ref(), identity.clone()).await;
        Ok(identity)
    }

    /// Clears identity and profile right away, then tells the provider.
    pub async fn sign_out(&self) -> PortResult<()> {
        self.clear_error();
        self.publisher.clear();
        self.auth.sign_out().await.map_err(|e| self.capture(e))?;
        info!("Signed out.");
        Ok(())
    }

    /// Re-reads the profile of the published identity, e.g. after the profile
    /// screen saved a new display name.
    pub async fn reload_profile(&self) {
        let Some(identity) = self.snapshot().identity else {
            return;
        };
        self.publisher.adopt(self.db.as_ref(), identity).await;
    }

    pub async fn reset_password(&self, email: &str) -> PortResult<()> {
        self.clear_error();
        self.auth
            .reset_password_for_email(email)
            .await
            .map_err(|e| self.capture(e))
    }
}

impl Drop for SessionBootstrap {
    fn drop(&mut self) {
        self.publisher.token.cancel();
    }
}

async fn run(
    auth: Arc<dyn AuthService>,
    db: Arc<dyn DatabaseService>,
    publisher: Arc<Publisher>,
    mut events: AuthEventStream,
) {
    let token = publisher.token.clone();

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            info!("Session bootstrap torn down before the initial lookup finished.");
            return;
        }
        _ = initial_lookup(auth.as_ref(), db.as_ref(), &publisher) => {}
    }

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = events.next() => event,
        };
        let Some(event) = event else {
            warn!("Session feed ended.");
            break;
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = handle_event(db.as_ref(), &publisher, event) => {}
        }
    }
    info!("Session bootstrap stopped.");
}

async fn initial_lookup(auth: &dyn AuthService, db: &dyn DatabaseService, publisher: &Publisher) {
    match auth.get_session().await {
        Ok(Some(session)) => publisher.adopt(db, session.identity).await,
        Ok(None) => publisher.clear(),
        Err(e) => {
            error!("Failed to get the current session: {}", e);
            publisher.set_error(&e);
        }
    }
    publisher.publish(|s| s.loading = false);
}

async fn handle_event(db: &dyn DatabaseService, publisher: &Publisher, event: AuthEvent) {
    info!("Session change: {:?}", event.kind);
    match event.session {
        Some(session) => {
            if event.kind == AuthEventKind::SignedIn {
                // Waits out a sign-in in progress.
                let mut echo = publisher.sign_in_echo.lock().await;
                if *echo == Some(session.identity.id) {
                    *echo = None;
                    return;
                }
            }
            publisher.adopt(db, session.identity).await;
        }
        None => {
            *publisher.sign_in_echo.lock().await = None;
            publisher.clear();
        }
    }
}

//=========================================================================================
// Tests
//=========================================================================================
