//! Review gate: turns a raw critique into a pass/fail verdict.
//!
//! The threshold and score-derivation policy lives here so that the
//! supervisor's transition logic is purely a function of already-computed
//! verdicts, never of raw critique content.

use crate::domain::{Critique, CritiqueScores, Role, ScoreKind};
use serde::{Deserialize, Serialize};

/// Score assigned to a dimension when a boolean-only critique approves.
const APPROVED_SCORE: f64 = 1.0;
/// Score assigned to the safety dimension when the safety guardian rejects
/// without explicit scores.
const SAFETY_REJECTED_SCORE: f64 = 0.5;
/// Score assigned to empathy and clarity when the clinical critic rejects
/// without explicit scores.
const CLINICAL_REJECTED_SCORE: f64 = 0.6;

/// Outcome of evaluating one critique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub approved: bool,
    /// Effective scores: the critique's explicit scores where present,
    /// otherwise values derived from the boolean verdict.
    pub scores: CritiqueScores,
}

/// Evaluates critiques against the configured approval threshold.
#[derive(Debug, Clone)]
pub struct ReviewGate {
    threshold: f64,
}

impl ReviewGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// The score dimensions a reviewer must cover for its approval to count.
    pub fn required_scores(author: Role) -> &'static [ScoreKind] {
        match author {
            Role::SafetyGuardian => &[ScoreKind::Safety],
            Role::ClinicalCritic => &[ScoreKind::Empathy, ScoreKind::Clarity],
            _ => &[],
        }
    }

    /// Evaluates a critique into a verdict.
    ///
    /// An explicit `approved` flag wins. Without one, every required score
    /// must be present and meet the threshold; a missing score never
    /// passes.
    pub fn evaluate(&self, critique: &Critique) -> Verdict {
        let approved = match critique.approved {
            Some(flag) => flag,
            None => {
                let required = Self::required_scores(critique.author);
                !required.is_empty()
                    && required.iter().all(|kind| {
                        critique
                            .scores
                            .get(*kind)
                            .is_some_and(|score| score >= self.threshold)
                    })
            }
        };

        Verdict {
            approved,
            scores: self.effective_scores(critique, approved),
        }
    }

    /// Explicit scores where the critique carries them; derived values for
    /// the reviewer's required dimensions where it does not.
    fn effective_scores(&self, critique: &Critique, approved: bool) -> CritiqueScores {
        let mut scores = critique.scores;
        for kind in Self::required_scores(critique.author) {
            if scores.get(*kind).is_none() {
                let derived = if approved {
                    APPROVED_SCORE
                } else {
                    match critique.author {
                        Role::SafetyGuardian => SAFETY_REJECTED_SCORE,
                        _ => CLINICAL_REJECTED_SCORE,
                    }
                };
                scores.set(*kind, derived);
            }
        }
        scores
    }
}

impl Default for ReviewGate {
    fn default() -> Self {
        Self::new(crate::config::default_approval_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimestampUtc;

    fn critique(author: Role, approved: Option<bool>, scores: CritiqueScores) -> Critique {
        Critique {
            author,
            version: 1,
            approved,
            rationale: "test".to_string(),
            scores,
            created_at: TimestampUtc::now(),
        }
    }

    #[test]
    fn test_explicit_flag_wins() {
        let gate = ReviewGate::new(0.7);

        let approved = gate.evaluate(&critique(
            Role::SafetyGuardian,
            Some(true),
            CritiqueScores::default(),
        ));
        assert!(approved.approved);
        assert_eq!(approved.scores.safety, Some(1.0));

        // Explicit rejection even though the score alone would pass.
        let rejected = gate.evaluate(&critique(
            Role::SafetyGuardian,
            Some(false),
            CritiqueScores {
                safety: Some(0.9),
                ..Default::default()
            },
        ));
        assert!(!rejected.approved);
        assert_eq!(rejected.scores.safety, Some(0.9));
    }

    #[test]
    fn test_derived_from_scores_when_flag_absent() {
        let gate = ReviewGate::new(0.7);

        let passing = gate.evaluate(&critique(
            Role::ClinicalCritic,
            None,
            CritiqueScores {
                empathy: Some(0.8),
                clarity: Some(0.7),
                ..Default::default()
            },
        ));
        assert!(passing.approved);

        let failing = gate.evaluate(&critique(
            Role::ClinicalCritic,
            None,
            CritiqueScores {
                empathy: Some(0.8),
                clarity: Some(0.5),
                ..Default::default()
            },
        ));
        assert!(!failing.approved);
    }

    #[test]
    fn test_missing_score_never_passes() {
        let gate = ReviewGate::new(0.7);

        // Clinical critic needs empathy AND clarity; clarity is absent.
        let partial = gate.evaluate(&critique(
            Role::ClinicalCritic,
            None,
            CritiqueScores {
                empathy: Some(0.95),
                ..Default::default()
            },
        ));
        assert!(!partial.approved);

        // Neither flag nor scores: never approved.
        let empty = gate.evaluate(&critique(
            Role::SafetyGuardian,
            None,
            CritiqueScores::default(),
        ));
        assert!(!empty.approved);
    }

    #[test]
    fn test_derived_rejection_scores() {
        let gate = ReviewGate::new(0.7);

        let safety = gate.evaluate(&critique(
            Role::SafetyGuardian,
            Some(false),
            CritiqueScores::default(),
        ));
        assert_eq!(safety.scores.safety, Some(0.5));

        let clinical = gate.evaluate(&critique(
            Role::ClinicalCritic,
            Some(false),
            CritiqueScores::default(),
        ));
        assert_eq!(clinical.scores.empathy, Some(0.6));
        assert_eq!(clinical.scores.clarity, Some(0.6));
    }
}
