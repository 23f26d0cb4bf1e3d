//! Versioned draft history plus the critiques attached to each version.
//!
//! The ledger is the ONLY place draft versions are created and critiques
//! are attached, and it owns the review-metadata recomputation that must
//! follow both operations.

use crate::domain::{Critique, DraftVersion, EngineError, ReviewMetadata, Role, TimestampUtc};
use crate::gate::Verdict;
use serde::{Deserialize, Serialize};

/// Versioned history of produced drafts and their critiques.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DraftLedger {
    versions: Vec<DraftVersion>,
    critiques: Vec<Critique>,
    metadata: ReviewMetadata,
}

impl DraftLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new immutable draft version and returns its number.
    ///
    /// Version numbers are gapless and strictly increasing from 1. The new
    /// version supersedes all prior critiques, so reviewer scores are
    /// cleared; `total_revisions` is recounted from drafter authorship.
    pub fn append(
        &mut self,
        created_by: Role,
        title: impl Into<String>,
        content: impl Into<String>,
        instructions: impl Into<String>,
    ) -> u32 {
        let version = self.versions.len() as u32 + 1;
        self.versions.push(DraftVersion {
            version,
            title: title.into(),
            content: content.into(),
            instructions: instructions.into(),
            created_by,
            created_at: TimestampUtc::now(),
        });

        self.metadata.clear_scores();
        self.metadata.total_revisions = self
            .versions
            .iter()
            .filter(|v| v.created_by == Role::Drafter)
            .count() as u32;

        version
    }

    /// Attaches a critique to the version it targets and folds the
    /// verdict's effective scores into the review metadata.
    ///
    /// Fails with `VersionNotFound` if the target version does not exist.
    /// Scores only land in the metadata when the critique targets the
    /// current version; a critique of an older version is retained in the
    /// history but contributes nothing.
    pub fn attach_critique(
        &mut self,
        critique: Critique,
        verdict: &Verdict,
    ) -> Result<(), EngineError> {
        if critique.version == 0 || critique.version > self.versions.len() as u32 {
            return Err(EngineError::VersionNotFound {
                version: critique.version,
            });
        }

        let is_current = Some(critique.version) == self.latest().map(|v| v.version);
        if is_current {
            match critique.author {
                Role::SafetyGuardian => {
                    self.metadata.safety_score = verdict.scores.safety;
                }
                Role::ClinicalCritic => {
                    self.metadata.empathy_score = verdict.scores.empathy;
                    self.metadata.clarity_score = verdict.scores.clarity;
                }
                _ => {}
            }
        }

        self.critiques.push(critique);
        Ok(())
    }

    /// The current draft version, if any.
    pub fn latest(&self) -> Option<&DraftVersion> {
        self.versions.last()
    }

    /// All versions in insertion order.
    pub fn history(&self) -> &[DraftVersion] {
        &self.versions
    }

    /// All critiques in attachment order.
    pub fn critiques(&self) -> &[Critique] {
        &self.critiques
    }

    /// Critiques attached to a specific version, in attachment order.
    pub fn critiques_for(&self, version: u32) -> Vec<&Critique> {
        self.critiques
            .iter()
            .filter(|c| c.version == version)
            .collect()
    }

    pub fn metadata(&self) -> &ReviewMetadata {
        &self.metadata
    }

    /// Returns true if no draft has been produced yet.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CritiqueScores;
    use crate::gate::ReviewGate;
    use proptest::prelude::*;

    fn critique(author: Role, version: u32, approved: bool) -> Critique {
        Critique {
            author,
            version,
            approved: Some(approved),
            rationale: "because".to_string(),
            scores: CritiqueScores::default(),
            created_at: TimestampUtc::now(),
        }
    }

    fn attach(ledger: &mut DraftLedger, c: Critique) -> Result<(), EngineError> {
        let gate = ReviewGate::new(0.7);
        let verdict = gate.evaluate(&c);
        ledger.attach_critique(c, &verdict)
    }

    #[test]
    fn test_versions_are_gapless_from_one() {
        let mut ledger = DraftLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.append(Role::Drafter, "a", "b", "c"), 1);
        assert_eq!(ledger.append(Role::Drafter, "a2", "b2", "c2"), 2);
        assert_eq!(ledger.append(Role::Human, "a3", "b3", "c3"), 3);

        let numbers: Vec<u32> = ledger.history().iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(ledger.latest().unwrap().version, 3);
    }

    #[test]
    fn test_total_revisions_counts_drafter_versions_only() {
        let mut ledger = DraftLedger::new();
        ledger.append(Role::Drafter, "a", "b", "c");
        ledger.append(Role::Drafter, "a", "b", "c");
        ledger.append(Role::Human, "edited", "b", "c");
        assert_eq!(ledger.metadata().total_revisions, 2);
    }

    #[test]
    fn test_attach_to_missing_version_fails() {
        let mut ledger = DraftLedger::new();
        let err = attach(&mut ledger, critique(Role::SafetyGuardian, 1, true)).unwrap_err();
        assert!(matches!(err, EngineError::VersionNotFound { version: 1 }));

        ledger.append(Role::Drafter, "a", "b", "c");
        let err = attach(&mut ledger, critique(Role::SafetyGuardian, 2, true)).unwrap_err();
        assert!(matches!(err, EngineError::VersionNotFound { version: 2 }));
        let err = attach(&mut ledger, critique(Role::SafetyGuardian, 0, true)).unwrap_err();
        assert!(matches!(err, EngineError::VersionNotFound { version: 0 }));
    }

    #[test]
    fn test_metadata_recomputed_from_current_version_critique() {
        let mut ledger = DraftLedger::new();
        ledger.append(Role::Drafter, "a", "b", "c");

        attach(&mut ledger, critique(Role::SafetyGuardian, 1, false)).unwrap();
        assert_eq!(ledger.metadata().safety_score, Some(0.5));
        assert_eq!(ledger.metadata().empathy_score, None);

        attach(&mut ledger, critique(Role::ClinicalCritic, 1, true)).unwrap();
        assert_eq!(ledger.metadata().empathy_score, Some(1.0));
        assert_eq!(ledger.metadata().clarity_score, Some(1.0));
    }

    #[test]
    fn test_new_version_clears_stale_scores() {
        let mut ledger = DraftLedger::new();
        ledger.append(Role::Drafter, "a", "b", "c");
        attach(&mut ledger, critique(Role::SafetyGuardian, 1, true)).unwrap();
        assert_eq!(ledger.metadata().safety_score, Some(1.0));

        ledger.append(Role::Drafter, "a2", "b2", "c2");
        assert_eq!(ledger.metadata().safety_score, None);
        assert_eq!(ledger.metadata().total_revisions, 2);
    }

    #[test]
    fn test_stale_critique_does_not_touch_metadata() {
        let mut ledger = DraftLedger::new();
        ledger.append(Role::Drafter, "a", "b", "c");
        ledger.append(Role::Drafter, "a2", "b2", "c2");

        // Critique of the superseded v1: kept in history, ignored in metadata.
        attach(&mut ledger, critique(Role::SafetyGuardian, 1, true)).unwrap();
        assert_eq!(ledger.metadata().safety_score, None);
        assert_eq!(ledger.critiques_for(1).len(), 1);
        assert_eq!(ledger.critiques_for(2).len(), 0);
    }

    proptest! {
        /// Any interleaving of drafter/human appends keeps versions gapless
        /// and total_revisions equal to the drafter-authored count.
        #[test]
        fn prop_version_and_revision_invariants(authors in proptest::collection::vec(any::<bool>(), 0..40)) {
            let mut ledger = DraftLedger::new();
            for by_drafter in &authors {
                let role = if *by_drafter { Role::Drafter } else { Role::Human };
                ledger.append(role, "t", "c", "i");
            }

            let versions: Vec<u32> = ledger.history().iter().map(|v| v.version).collect();
            let expected: Vec<u32> = (1..=authors.len() as u32).collect();
            prop_assert_eq!(versions, expected);

            let drafter_count = authors.iter().filter(|b| **b).count() as u32;
            prop_assert_eq!(ledger.metadata().total_revisions, drafter_count);
        }
    }
}
