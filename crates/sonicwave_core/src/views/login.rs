//! The login screen, in sign-in or sign-up mode. Input is validated locally;
//! the actual calls go through the session bootstrap so the published
//! session follows.

use serde::{Deserialize, Serialize};

use crate::domain::Identity;
use crate::session::SessionBootstrap;
use crate::validation::{validate_email, validate_password, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMode {
    #[default]
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoginState {
    pub mode: LoginMode,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub full_name: String,
    pub submitting: bool,
    pub error: Option<String>,
    /// Set after a sign-up that still needs the emailed confirmation.
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    SignedIn(Identity),
    /// The account exists; a session may only follow email confirmation.
    SignedUp(Option<Identity>),
}

#[derive(Default)]
pub struct LoginForm {
    state: LoginState,
}

impl LoginForm {
    pub fn new(mode: LoginMode) -> Self {
        Self {
            state: LoginState {
                mode,
                ..LoginState::default()
            },
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    pub fn into_state(self) -> LoginState {
        self.state
    }

    pub fn set_mode(&mut self, mode: LoginMode) {
        self.state.mode = mode;
        self.state.error = None;
        self.state.notice = None;
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.state.email = email.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.state.password = password.into();
    }

    pub fn set_full_name(&mut self, full_name: impl Into<String>) {
        self.state.full_name = full_name.into();
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.state.email)?;
        validate_password(&self.state.password)
    }

    pub async fn submit(&mut self, session: &SessionBootstrap) -> Option<LoginOutcome> {
        self.state.error = None;
        self.state.notice = None;
        if let Err(e) = self.validate() {
            self.state.error = Some(e.to_string());
            return None;
        }

        let email = self.state.email.trim().to_string();
        self.state.submitting = true;
        let result = match self.state.mode {
            LoginMode::SignIn => session
                .sign_in(&email, &self.state.password)
                .await
                .map(LoginOutcome::SignedIn),
            LoginMode::SignUp => {
                let name = self.state.full_name.trim();
                let name = (!name.is_empty()).then_some(name);
                session
                    .sign_up(&email, &self.state.password, name)
                    .await
                    .map(LoginOutcome::SignedUp)
            }
        };
        self.state.submitting = false;
        self.state.password.clear();

        match result {
            Ok(outcome) => {
                if matches!(outcome, LoginOutcome::SignedUp(_)) {
                    self.state.notice = Some("Check your email to confirm your account".to_string());
                }
                Some(outcome)
            }
            Err(e) => {
                self.state.error = Some(e.message().to_string());
                None
            }
        }
    }
}
