//! crates/sonicwave_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs are independent of the hosted backend's wire format; the
//! adapters translate their own records into these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Authentication
//=========================================================================================

/// An authenticated principal as known to the hosted auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The tokens issued for an identity. Only the auth adapter looks at the tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Kinds of session-change notifications delivered by the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// A single entry of the session-change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<AuthSession>,
}

//=========================================================================================
// Profiles and subscription tiers
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Team,
}

/// Usage allowance for a tier. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    pub characters_per_month: Option<u64>,
    pub audio_seconds: Option<u64>,
    pub projects: Option<u32>,
}

impl SubscriptionTier {
    pub const ALL: [SubscriptionTier; 3] = [Self::Free, Self::Pro, Self::Team];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Team => "team",
        }
    }

    /// Human-facing plan name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Pro => "Pro",
            Self::Team => "Team",
        }
    }

    pub fn limits(&self) -> TierLimits {
        match self {
            Self::Free => TierLimits {
                characters_per_month: Some(10_000),
                audio_seconds: Some(120),
                projects: Some(5),
            },
            Self::Pro => TierLimits {
                characters_per_month: Some(500_000),
                audio_seconds: Some(3_600),
                projects: None,
            },
            Self::Team => TierLimits {
                characters_per_month: None,
                audio_seconds: None,
                projects: None,
            },
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown subscription tier '{0}'")]
pub struct UnknownTier(pub String);

impl FromStr for SubscriptionTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "team" => Ok(Self::Team),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

/// Application-owned metadata for an identity. `id` equals the identity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The row inserted by read-or-create and by sign-up seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
}

//=========================================================================================
// Projects and generated audio
//=========================================================================================

/// A saved unit of text content owned by an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
}

/// Fields written by an editor save on an existing project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectChanges {
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// A generated audio artifact for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAudio {
    pub id: Uuid,
    pub project_id: Uuid,
    pub voice_id: String,
    pub audio_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectAudio {
    pub id: Uuid,
    pub project_id: Uuid,
    pub voice_id: String,
    pub audio_url: String,
}

//=========================================================================================
// Catalogs
//=========================================================================================

/// A selectable synthesis voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub id: &'static str,
    pub name: &'static str,
}

pub const DEFAULT_VOICE_ID: &str = "en-US-1";

pub const VOICES: [Voice; 4] = [
    Voice { id: "en-US-1", name: "US English - Female" },
    Voice { id: "en-US-2", name: "US English - Male" },
    Voice { id: "en-GB-1", name: "British English - Female" },
    Voice { id: "en-GB-2", name: "British English - Male" },
];

pub fn find_voice(id: &str) -> Option<&'static Voice> {
    VOICES.iter().find(|v| v.id == id)
}

/// A subscription plan as shown on the settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub tier: SubscriptionTier,
    pub name: &'static str,
    pub price: &'static str,
    pub monthly: bool,
    pub features: Vec<&'static str>,
    pub highlighted: bool,
}

pub fn plan_catalog() -> Vec<Plan> {
    vec![
        Plan {
            tier: SubscriptionTier::Free,
            name: "Free",
            price: "$0",
            monthly: true,
            features: vec![
                "10,000 characters/month",
                "2 minutes of audio",
                "5 projects",
                "Basic voices",
            ],
            highlighted: false,
        },
        Plan {
            tier: SubscriptionTier::Pro,
            name: "Pro",
            price: "$29",
            monthly: true,
            features: vec![
                "500,000 characters/month",
                "60 minutes of audio",
                "Unlimited projects",
                "Premium voices",
                "Advanced features",
                "Priority support",
            ],
            highlighted: true,
        },
        Plan {
            tier: SubscriptionTier::Team,
            name: "Team",
            price: "Custom",
            monthly: false,
            features: vec![
                "Unlimited characters",
                "Unlimited audio",
                "Unlimited projects",
                "All voices & features",
                "Team management",
                "Dedicated support",
            ],
            highlighted: false,
        },
    ]
}
