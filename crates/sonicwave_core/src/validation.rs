//! Client-side checks run before any call reaches the hosted backend.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::find_voice;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("Enter some text to convert")]
    EmptyContent,
    #[error("Unknown voice '{0}'")]
    UnknownVoice(String),
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
    })
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required("Email"));
    }
    if !email_pattern().is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required("Password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Synthesis needs something other than whitespace.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(())
}

pub fn validate_voice(voice_id: &str) -> Result<(), ValidationError> {
    match find_voice(voice_id) {
        Some(_) => Ok(()),
        None => Err(ValidationError::UnknownVoice(voice_id.to_string())),
    }
}
