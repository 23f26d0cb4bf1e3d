//! Artifact types: draft versions, critiques, review metadata, scratchpad
//! notes, and the session message log.

use crate::domain::types::{Role, TimestampUtc};
use serde::{Deserialize, Serialize};

/// One immutable snapshot of the produced exercise document.
///
/// Version numbers are monotonic per session, starting at 1 and gapless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftVersion {
    pub version: u32,
    pub title: String,
    pub content: String,
    pub instructions: String,
    pub created_by: Role,
    pub created_at: TimestampUtc,
}

/// The score dimensions a reviewer can grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    Safety,
    Empathy,
    Clarity,
}

impl ScoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreKind::Safety => "safety",
            ScoreKind::Empathy => "empathy",
            ScoreKind::Clarity => "clarity",
        }
    }
}

/// Optional numeric sub-scores carried by a critique, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CritiqueScores {
    pub safety: Option<f64>,
    pub empathy: Option<f64>,
    pub clarity: Option<f64>,
}

impl CritiqueScores {
    pub fn get(&self, kind: ScoreKind) -> Option<f64> {
        match kind {
            ScoreKind::Safety => self.safety,
            ScoreKind::Empathy => self.empathy,
            ScoreKind::Clarity => self.clarity,
        }
    }

    pub fn set(&mut self, kind: ScoreKind, value: f64) {
        match kind {
            ScoreKind::Safety => self.safety = Some(value),
            ScoreKind::Empathy => self.empathy = Some(value),
            ScoreKind::Clarity => self.clarity = Some(value),
        }
    }

    /// Returns true if no score dimension is present.
    pub fn is_empty(&self) -> bool {
        self.safety.is_none() && self.empathy.is_none() && self.clarity.is_none()
    }
}

/// A reviewer's verdict on a specific draft version.
///
/// Append-only: once attached to a version it is never mutated.
/// `approved` may be absent, in which case the review gate derives the
/// verdict from the present sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub author: Role,
    pub version: u32,
    pub approved: Option<bool>,
    pub rationale: String,
    #[serde(default)]
    pub scores: CritiqueScores,
    pub created_at: TimestampUtc,
}

/// Per-session review aggregate.
///
/// Scores are nullable until the corresponding reviewer has run on the
/// current draft version; they are recomputed, never accumulated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewMetadata {
    pub safety_score: Option<f64>,
    pub empathy_score: Option<f64>,
    pub clarity_score: Option<f64>,
    pub total_revisions: u32,
}

impl ReviewMetadata {
    /// Clears reviewer scores when a new draft version supersedes the one
    /// the critiques were written against.
    pub fn clear_scores(&mut self) {
        self.safety_score = None;
        self.empathy_score = None;
        self.clarity_score = None;
    }
}

/// Severity tag on a scratchpad note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotePriority {
    Info,
    Warning,
    Critical,
}

/// Ordered, append-only note visible to all subsequent roles.
/// The shared audit trail between producer and reviewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchpadEntry {
    pub author: Role,
    pub text: String,
    pub priority: NotePriority,
    pub created_at: TimestampUtc,
}

/// Who wrote a message in the session log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "role")]
pub enum MessageAuthor {
    User,
    Engine(Role),
}

/// One entry in the session's ordered message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub author: MessageAuthor,
    pub text: String,
    pub created_at: TimestampUtc,
}

impl Message {
    /// Creates a user-authored message stamped now.
    pub fn from_user(text: impl Into<String>) -> Self {
        Self {
            author: MessageAuthor::User,
            text: text.into(),
            created_at: TimestampUtc::now(),
        }
    }

    /// Creates an engine-authored message stamped now.
    pub fn from_role(role: Role, text: impl Into<String>) -> Self {
        Self {
            author: MessageAuthor::Engine(role),
            text: text.into(),
            created_at: TimestampUtc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_roundtrip_and_accessors() {
        let mut scores = CritiqueScores::default();
        assert!(scores.is_empty());

        scores.set(ScoreKind::Safety, 0.9);
        scores.set(ScoreKind::Clarity, 0.4);
        assert!(!scores.is_empty());
        assert_eq!(scores.get(ScoreKind::Safety), Some(0.9));
        assert_eq!(scores.get(ScoreKind::Empathy), None);
        assert_eq!(scores.get(ScoreKind::Clarity), Some(0.4));

        let json = serde_json::to_string(&scores).unwrap();
        let parsed: CritiqueScores = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, scores);
    }

    #[test]
    fn test_message_author_serialization() {
        let user = Message::from_user("hey");
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"kind\":\"user\""));

        let engine = Message::from_role(Role::Drafter, "Drafted: Box Breathing (v1)");
        let json = serde_json::to_string(&engine).unwrap();
        assert!(json.contains("\"kind\":\"engine\""));
        assert!(json.contains("\"role\":\"drafter\""));

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.author, MessageAuthor::Engine(Role::Drafter));
    }

    #[test]
    fn test_metadata_clear_scores_keeps_revisions() {
        let mut metadata = ReviewMetadata {
            safety_score: Some(1.0),
            empathy_score: Some(0.8),
            clarity_score: None,
            total_revisions: 2,
        };
        metadata.clear_scores();
        assert_eq!(metadata.safety_score, None);
        assert_eq!(metadata.empathy_score, None);
        assert_eq!(metadata.clarity_score, None);
        assert_eq!(metadata.total_revisions, 2);
    }
}
