use crate::config::ContextLimits;
use crate::domain::{
    DraftVersion, Message, NotePriority, ReviewMetadata, Role, ScratchpadEntry, SessionId,
    SessionKey, TimestampUtc,
};
use crate::ledger::DraftLedger;
use crate::roles::RoleContext;
use crate::supervisor::TurnState;
use serde::{Deserialize, Serialize};

/// Full state of one conversation thread.
///
/// Created on the first message for a new key; mutated exclusively by the
/// orchestrator applying one role's output per step; never deleted by the
/// engine. The whole struct is the unit of checkpointing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub session_id: SessionId,
    pub messages: Vec<Message>,
    pub ledger: DraftLedger,
    pub scratchpad: Vec<ScratchpadEntry>,
    pub last_active_role: Option<Role>,
    /// Number of role invocations executed over the session's lifetime.
    pub step_counter: u64,
    /// Routing state of the in-flight turn; a terminal value means no turn
    /// is in flight.
    #[serde(default)]
    pub turn: TurnState,
    /// Drafter invocations spent in the in-flight turn.
    #[serde(default)]
    pub revisions_used: u32,
    pub created_at: TimestampUtc,
    pub updated_at: TimestampUtc,
}

impl Session {
    /// Creates an empty session for a new thread key.
    pub fn new(key: SessionKey) -> Self {
        let now = TimestampUtc::now();
        Self {
            key,
            session_id: SessionId::new(),
            messages: Vec::new(),
            ledger: DraftLedger::new(),
            scratchpad: Vec::new(),
            last_active_role: None,
            step_counter: 0,
            turn: TurnState::Init,
            revisions_used: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Opens a new turn: resets the routing state and the per-turn
    /// revision counter, then appends the user's message.
    pub fn begin_turn(&mut self, user_input: impl Into<String>) {
        self.turn = TurnState::Init;
        self.revisions_used = 0;
        self.messages.push(Message::from_user(user_input));
        self.touch();
    }

    /// True if a previous turn was interrupted before reaching a terminal
    /// state (crash or cancellation mid-turn).
    pub fn has_inflight_turn(&self) -> bool {
        self.turn != TurnState::Init && !self.turn.is_terminal()
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends a scratchpad note stamped now.
    pub fn push_note(&mut self, author: Role, text: impl Into<String>, priority: NotePriority) {
        self.scratchpad.push(ScratchpadEntry {
            author,
            text: text.into(),
            priority,
            created_at: TimestampUtc::now(),
        });
    }

    pub fn current_draft(&self) -> Option<&DraftVersion> {
        self.ledger.latest()
    }

    pub fn metadata(&self) -> &ReviewMetadata {
        self.ledger.metadata()
    }

    pub fn touch(&mut self) {
        self.updated_at = TimestampUtc::now();
    }

    /// Builds the minimal view of this session a role invocation receives:
    /// message tail, current draft, most recent critiques, scratchpad tail.
    pub fn role_context(&self, limits: &ContextLimits) -> RoleContext {
        RoleContext {
            messages: tail(&self.messages, limits.message_tail),
            current_draft: self.ledger.latest().cloned(),
            recent_critiques: tail(self.ledger.critiques(), limits.recent_critiques),
            scratchpad: tail(&self.scratchpad, limits.scratchpad_notes),
            revisions_used: self.revisions_used,
        }
    }
}

fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    let start = items.len().saturating_sub(n);
    items.get(start..).unwrap_or_default().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageAuthor, Role};

    #[test]
    fn test_begin_turn_resets_routing_state() {
        let mut session = Session::new(SessionKey::from("thread-1"));
        session.turn = TurnState::SafetyReview;
        session.revisions_used = 2;

        session.begin_turn("make it shorter");
        assert_eq!(session.turn, TurnState::Init);
        assert_eq!(session.revisions_used, 0);
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].author, MessageAuthor::User);
    }

    #[test]
    fn test_inflight_turn_detection() {
        let mut session = Session::new(SessionKey::from("thread-1"));
        assert!(!session.has_inflight_turn());

        session.turn = TurnState::ClinicalReview;
        assert!(session.has_inflight_turn());

        session.turn = TurnState::ChatDone;
        assert!(!session.has_inflight_turn());
    }

    #[test]
    fn test_role_context_windows_the_tails() {
        let mut session = Session::new(SessionKey::from("thread-1"));
        for i in 0..30 {
            session.push_message(Message::from_user(format!("msg {i}")));
        }
        for i in 0..5 {
            session.push_note(Role::SafetyGuardian, format!("note {i}"), NotePriority::Info);
        }

        let limits = ContextLimits {
            message_tail: 20,
            recent_critiques: 2,
            scratchpad_notes: 3,
        };
        let ctx = session.role_context(&limits);
        assert_eq!(ctx.messages.len(), 20);
        assert_eq!(ctx.messages[0].text, "msg 10");
        assert_eq!(ctx.scratchpad.len(), 3);
        assert_eq!(ctx.scratchpad[0].text, "note 2");
        assert!(ctx.current_draft.is_none());
        assert!(ctx.recent_critiques.is_empty());
    }

    #[test]
    fn test_snapshot_serialization_roundtrip() {
        let mut session = Session::new(SessionKey::from("thread-1"));
        session.begin_turn("I'm anxious about public speaking");
        session.ledger.append(Role::Drafter, "Grounding", "body", "steps");
        session.push_note(Role::Drafter, "Created v1: Grounding", NotePriority::Info);
        session.last_active_role = Some(Role::Drafter);
        session.step_counter = 2;
        session.turn = TurnState::SafetyReview;
        session.revisions_used = 1;

        let json = serde_json::to_string(&session).unwrap();
        let loaded: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, session);
    }
}
