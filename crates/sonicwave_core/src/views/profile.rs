//! The profile screen: an editable display name next to read-only account
//! details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::domain::Identity;
use crate::ports::DatabaseService;
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileState {
    pub full_name: String,
    pub email: Option<String>,
    pub member_since: Option<DateTime<Utc>>,
    pub saving: bool,
    /// Set by a successful save; stays set until the next save starts.
    pub saved: bool,
    pub error: Option<String>,
}

pub struct ProfileEditor {
    db: Arc<dyn DatabaseService>,
    identity: Option<Identity>,
    state: ProfileState,
}

impl ProfileEditor {
    pub fn new(db: Arc<dyn DatabaseService>, session: &SessionSnapshot) -> Self {
        let identity = session.identity.clone();
        let full_name = session
            .profile
            .as_ref()
            .and_then(|p| p.full_name.clone())
            .unwrap_or_default();
        Self {
            db,
            state: ProfileState {
                full_name,
                email: identity.as_ref().and_then(|i| i.email.clone()),
                member_since: identity.as_ref().map(|i| i.created_at),
                saving: false,
                saved: false,
                error: None,
            },
            identity,
        }
    }

    pub fn state(&self) -> &ProfileState {
        &self.state
    }

    pub fn into_state(self) -> ProfileState {
        self.state
    }

    pub fn set_full_name(&mut self, full_name: impl Into<String>) {
        self.state.full_name = full_name.into();
    }

    /// Writes the display name for the signed-in identity. A blank name is
    /// stored as no name.
    pub async fn save(&mut self) -> bool {
        self.state.saving = true;
        self.state.saved = false;
        self.state.error = None;

        let Some(id) = self.identity.as_ref().map(|i| i.id) else {
            self.state.saving = false;
            self.state.error = Some("Failed to update profile".to_string());
            return false;
        };

        let name = self.state.full_name.trim();
        let name = (!name.is_empty()).then_some(name);
        let result = self.db.update_profile_name(id, name).await;
        self.state.saving = false;

        match result {
            Ok(()) => {
                self.state.saved = true;
                true
            }
            Err(e) => {
                error!("Failed to update profile {}: {}", id, e);
                self.state.error = Some("Failed to update profile".to_string());
                false
            }
        }
    }
}
