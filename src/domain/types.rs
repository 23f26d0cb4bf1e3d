//! Strongly typed domain primitives for the foundry engine.
//!
//! These newtypes provide type safety and semantic clarity for session
//! identifiers, role enumerations, and timestamps. They are used throughout
//! the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque thread key identifying a session.
/// Supplied by the transport collaborator; the engine never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine-generated identifier for a session, used for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Artifact authorship. Closed set: drafts, critiques, scratchpad notes,
/// and messages are always attributed to one of these.
///
/// `Human` is never dispatched through a role adapter; it only appears as
/// the author of externally edited draft versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Chat,
    Drafter,
    SafetyGuardian,
    ClinicalCritic,
    Human,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Chat => "chat",
            Role::Drafter => "drafter",
            Role::SafetyGuardian => "safety_guardian",
            Role::ClinicalCritic => "clinical_critic",
            Role::Human => "human",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dispatchable roles: what the orchestrator can invoke through a role
/// adapter. The intent router is dispatchable but never authors artifacts;
/// `Role::Human` authors artifacts but is never dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleId {
    IntentRouter,
    Chat,
    Drafter,
    SafetyGuardian,
    ClinicalCritic,
}

impl RoleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleId::IntentRouter => "intent_router",
            RoleId::Chat => "chat",
            RoleId::Drafter => "drafter",
            RoleId::SafetyGuardian => "safety_guardian",
            RoleId::ClinicalCritic => "clinical_critic",
        }
    }

    /// The authorship role for artifacts this dispatch produces, if any.
    pub fn author(&self) -> Option<Role> {
        match self {
            RoleId::IntentRouter => None,
            RoleId::Chat => Some(Role::Chat),
            RoleId::Drafter => Some(Role::Drafter),
            RoleId::SafetyGuardian => Some(Role::SafetyGuardian),
            RoleId::ClinicalCritic => Some(Role::ClinicalCritic),
        }
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified intent of a user turn, produced by the intent router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Casual,
    ExerciseRequest,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Casual => "casual",
            Intent::ExerciseRequest => "exercise_request",
        }
    }
}

/// UTC timestamp attached to engine artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampUtc(pub DateTime<Utc>);

impl TimestampUtc {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the timestamp as an RFC3339 string.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for TimestampUtc {
    fn default() -> Self {
        Self::now()
    }
}
