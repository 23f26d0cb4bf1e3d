//! Routing state machine for one session turn.
//!
//! The supervisor is a pure function over `(current state, last role
//! output)`: no I/O, no clocks. The orchestrator owns execution; this
//! module only decides who runs next and when a turn is over, and it is
//! the single place the revision budget is enforced.

use crate::domain::{Intent, Role, RoleId};
use crate::gate::Verdict;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// State of the routing machine within one turn.
///
/// Persisted with the session snapshot so a crashed turn resumes from the
/// supervisor's current state instead of replaying completed role calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    #[default]
    Init,
    RouteIntent,
    Chat,
    Drafting,
    SafetyReview,
    ClinicalReview,
    HumanReview,
    ChatDone,
    Aborted,
}

impl TurnState {
    /// Terminal states end the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::HumanReview | TurnState::ChatDone | TurnState::Aborted
        )
    }
}

/// Transient routing decision produced each step.
/// Not persisted; its effect is implicit in the artifact the role produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub next_role: RoleId,
    pub reason: String,
}

/// The folded outcome of the last role invocation, as transition input.
#[derive(Debug, Clone, Copy)]
pub enum TurnInput<'a> {
    /// A new user message opened the turn.
    TurnStarted,
    /// The intent router classified the message.
    IntentClassified {
        intent: Intent,
        wants_new_draft: bool,
        has_draft: bool,
    },
    /// The chat role produced its reply.
    ChatReplied,
    /// The drafter produced a version (first or revised).
    DraftProduced,
    /// A reviewer's critique was gated into a verdict.
    Reviewed { reviewer: Role, verdict: &'a Verdict },
}

/// The routing state machine, parameterized by the revision budget
/// (maximum drafter invocations per turn).
#[derive(Debug, Clone)]
pub struct Supervisor {
    max_revisions: u32,
}

impl Supervisor {
    pub fn new(max_revisions: u32) -> Self {
        Self { max_revisions }
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    /// The role to invoke in the given state, with the routing reason.
    /// Returns `None` for terminal states.
    pub fn route(&self, state: &TurnState, revisions_used: u32) -> Option<RoutingDecision> {
        let decision = match state {
            TurnState::Init | TurnState::RouteIntent => RoutingDecision {
                next_role: RoleId::IntentRouter,
                reason: "new turn requires intent classification".to_string(),
            },
            TurnState::Chat => RoutingDecision {
                next_role: RoleId::Chat,
                reason: "casual turn handled conversationally".to_string(),
            },
            TurnState::Drafting => RoutingDecision {
                next_role: RoleId::Drafter,
                reason: format!(
                    "drafting version {} of at most {}",
                    revisions_used + 1,
                    self.max_revisions
                ),
            },
            TurnState::SafetyReview => RoutingDecision {
                next_role: RoleId::SafetyGuardian,
                reason: "new draft version requires safety review".to_string(),
            },
            TurnState::ClinicalReview => RoutingDecision {
                next_role: RoleId::ClinicalCritic,
                reason: "safety-approved draft requires clinical review".to_string(),
            },
            TurnState::HumanReview | TurnState::ChatDone | TurnState::Aborted => return None,
        };
        Some(decision)
    }

    /// Pure transition over `(current state, last role output)`.
    ///
    /// `revisions_used` counts drafter invocations already folded this
    /// turn; a transition that would require one more is only taken while
    /// budget remains, otherwise the turn aborts with the last draft and
    /// its critiques retained.
    ///
    /// An input that is not valid in the current state is a programming
    /// error and fails loudly.
    pub fn transition(
        &self,
        current: &TurnState,
        input: TurnInput<'_>,
        revisions_used: u32,
    ) -> Result<TurnState> {
        use TurnInput::*;

        let next = match (current, input) {
            (TurnState::Init, TurnStarted) => TurnState::RouteIntent,

            (
                TurnState::RouteIntent,
                IntentClassified {
                    intent,
                    wants_new_draft,
                    has_draft,
                },
            ) => match intent {
                Intent::Casual => TurnState::Chat,
                Intent::ExerciseRequest if has_draft && !wants_new_draft => TurnState::Chat,
                Intent::ExerciseRequest => self.enter_drafting(revisions_used),
            },

            (TurnState::Chat, ChatReplied) => TurnState::ChatDone,

            (TurnState::Drafting, DraftProduced) => TurnState::SafetyReview,

            (
                TurnState::SafetyReview,
                Reviewed {
                    reviewer: Role::SafetyGuardian,
                    verdict,
                },
            ) => {
                if verdict.approved {
                    TurnState::ClinicalReview
                } else {
                    self.enter_drafting(revisions_used)
                }
            }

            (
                TurnState::ClinicalReview,
                Reviewed {
                    reviewer: Role::ClinicalCritic,
                    verdict,
                },
            ) => {
                if verdict.approved {
                    TurnState::HumanReview
                } else {
                    self.enter_drafting(revisions_used)
                }
            }

            (state, _) => bail!("invalid turn input in state {state:?}"),
        };

        Ok(next)
    }

    /// Another drafter invocation, budget permitting.
    fn enter_drafting(&self, revisions_used: u32) -> TurnState {
        if revisions_used < self.max_revisions {
            TurnState::Drafting
        } else {
            TurnState::Aborted
        }
    }
}
