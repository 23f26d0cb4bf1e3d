//! Uniform interface over the external producer/reviewer calls.
//!
//! Each role's underlying implementation is an opaque generative call; the
//! adapter is the only component aware of that. The engine treats repeated
//! calls with the same context as independent, never cached.

use crate::domain::{
    Critique, CritiqueScores, DraftVersion, EngineError, Intent, Message, RoleId, ScratchpadEntry,
};
use async_trait::async_trait;

/// The minimal view of session state a role invocation receives.
#[derive(Debug, Clone, Default)]
pub struct RoleContext {
    /// Tail of the message log, oldest first.
    pub messages: Vec<Message>,
    /// The current draft version, if any.
    pub current_draft: Option<DraftVersion>,
    /// The most recent critiques, oldest first.
    pub recent_critiques: Vec<Critique>,
    /// Tail of the scratchpad, oldest first.
    pub scratchpad: Vec<ScratchpadEntry>,
    /// Drafter invocations already spent this turn.
    pub revisions_used: u32,
}

/// Structured result of one role invocation.
#[derive(Debug, Clone)]
pub enum RoleResult {
    /// A conversational reply from the chat role.
    ChatMessage { text: String },
    /// A produced or revised draft. `summary` describes what changed.
    Draft {
        title: String,
        content: String,
        instructions: String,
        summary: String,
    },
    /// A reviewer's verdict on the current draft.
    Critique {
        approved: Option<bool>,
        rationale: String,
        scores: CritiqueScores,
    },
    /// The intent router's routing decision input.
    RoutingHint {
        intent: Intent,
        /// True when the user explicitly asked for a fresh exercise.
        wants_new_draft: bool,
        reasoning: String,
    },
}

impl RoleResult {
    /// Returns true if this is the result variant the given role is
    /// contracted to produce.
    pub fn matches(&self, role: RoleId) -> bool {
        matches!(
            (role, self),
            (RoleId::IntentRouter, RoleResult::RoutingHint { .. })
                | (RoleId::Chat, RoleResult::ChatMessage { .. })
                | (RoleId::Drafter, RoleResult::Draft { .. })
                | (RoleId::SafetyGuardian, RoleResult::Critique { .. })
                | (RoleId::ClinicalCritic, RoleResult::Critique { .. })
        )
    }

    fn variant_name(&self) -> &'static str {
        match self {
            RoleResult::ChatMessage { .. } => "chat_message",
            RoleResult::Draft { .. } => "draft",
            RoleResult::Critique { .. } => "critique",
            RoleResult::RoutingHint { .. } => "routing_hint",
        }
    }
}

/// Uniform contract for invoking a role.
///
/// Implementations wrap whatever produces the text (an LLM call, a fixture,
/// a human); failures surface as plain errors and the engine applies its
/// own retry policy on top.
#[async_trait]
pub trait RoleAdapter: Send + Sync {
    async fn invoke(&self, role: RoleId, context: RoleContext) -> anyhow::Result<RoleResult>;
}

/// Invokes a role with the engine's retry policy: one retry with the same
/// inputs, after which the failure is fatal for the turn.
///
/// A result of the wrong variant for the invoked role is a contract
/// violation and counts as a failure.
pub async fn invoke_with_retry(
    adapter: &dyn RoleAdapter,
    role: RoleId,
    context: &RoleContext,
) -> Result<RoleResult, EngineError> {
    let mut last_error = String::new();
    for _ in 0..2 {
        match adapter.invoke(role, context.clone()).await {
            Ok(result) if result.matches(role) => return Ok(result),
            Ok(result) => {
                last_error = format!("adapter returned {} for role {role}", result.variant_name());
            }
            Err(e) => {
                last_error = format!("{e:#}");
            }
        }
    }
    Err(EngineError::RoleInvocation {
        role,
        message: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyAdapter {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl RoleAdapter for FlakyAdapter {
        async fn invoke(&self, _role: RoleId, _context: RoleContext) -> anyhow::Result<RoleResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                anyhow::bail!("transient failure #{}", call + 1);
            }
            Ok(RoleResult::ChatMessage {
                text: "hello".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_retry_once_recovers() {
        let adapter = FlakyAdapter {
            failures_before_success: 1,
            calls: AtomicU32::new(0),
        };
        let result = invoke_with_retry(&adapter, RoleId::Chat, &RoleContext::default()).await;
        assert!(matches!(result, Ok(RoleResult::ChatMessage { .. })));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_failure_is_fatal() {
        let adapter = FlakyAdapter {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        };
        let result = invoke_with_retry(&adapter, RoleId::Chat, &RoleContext::default()).await;
        match result {
            Err(EngineError::RoleInvocation { role, message }) => {
                assert_eq!(role, RoleId::Chat);
                assert!(message.contains("transient failure #2"));
            }
            other => panic!("expected RoleInvocation error, got {:?}", other.is_ok()),
        }
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mismatched_variant_is_a_failure() {
        struct WrongVariant;

        #[async_trait]
        impl RoleAdapter for WrongVariant {
            async fn invoke(
                &self,
                _role: RoleId,
                _context: RoleContext,
            ) -> anyhow::Result<RoleResult> {
                Ok(RoleResult::ChatMessage {
                    text: "not a draft".to_string(),
                })
            }
        }

        let result = invoke_with_retry(&WrongVariant, RoleId::Drafter, &RoleContext::default())
            .await;
        match result {
            Err(EngineError::RoleInvocation { message, .. }) => {
                assert!(message.contains("chat_message"));
            }
            other => panic!("expected RoleInvocation error, got {:?}", other.is_ok()),
        }
    }
}
