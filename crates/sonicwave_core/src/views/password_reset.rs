//! The forgot-password screen.

use serde::Serialize;
use tracing::warn;

use crate::session::SessionBootstrap;
use crate::validation::validate_email;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PasswordResetState {
    pub email: String,
    pub sending: bool,
    /// The address the last link went to; the input is cleared once sent.
    pub sent_to: Option<String>,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct PasswordReset {
    state: PasswordResetState,
}

impl PasswordReset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PasswordResetState {
        &self.state
    }

    pub fn into_state(self) -> PasswordResetState {
        self.state
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.state.email = email.into();
    }

    pub async fn submit(&mut self, session: &SessionBootstrap) -> bool {
        self.state.error = None;
        self.state.sent_to = None;

        let email = self.state.email.trim().to_string();
        if let Err(e) = validate_email(&email) {
            self.state.error = Some(e.to_string());
            return false;
        }

        self.state.sending = true;
        let result = session.reset_password(&email).await;
        self.state.sending = false;

        match result {
            Ok(()) => {
                self.state.sent_to = Some(email);
                self.state.email.clear();
                true
            }
            Err(e) => {
                warn!("Failed to send reset email: {}", e);
                let message = match e.message() {
                    "" => "Failed to send reset email",
                    message => message,
                };
                self.state.error = Some(message.to_string());
                false
            }
        }
    }
}
