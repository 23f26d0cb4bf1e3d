//! The session orchestrator: drives one turn's step loop.
//!
//! Invoke supervisor -> invoke chosen role adapter -> fold the result into
//! session state -> checkpoint -> repeat until terminal. This module is
//! the ONLY place session state is mutated, and the boundary where every
//! engine failure resolves into a terminal result.

use crate::config::EngineConfig;
use crate::domain::{
    Critique, DraftVersion, EngineError, Message, MessageAuthor, NotePriority, ReviewMetadata,
    Role, RoleId, SessionKey, TimestampUtc,
};
use crate::engine_log::EngineLogger;
use crate::gate::ReviewGate;
use crate::roles::{invoke_with_retry, RoleAdapter, RoleResult};
use crate::session::Session;
use crate::store::SessionStore;
use crate::supervisor::{Supervisor, TurnInput, TurnState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Emitted once per completed role invocation, in execution order,
/// before the terminal result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub role: RoleId,
    pub summary: String,
}

/// How a turn ended. Fatal outcomes carry the best-known partial state so
/// the caller is never left with silently lost work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalResult {
    /// The turn was conversational; no drafting happened.
    ChatReply { text: String },
    /// Both reviewers approved the current draft version.
    DraftReady {
        draft: DraftVersion,
        metadata: ReviewMetadata,
    },
    /// The revision budget ran out. The last draft and its critiques are
    /// retained, surfaced as unresolved.
    Aborted {
        reason: String,
        draft: Option<DraftVersion>,
        critiques: Vec<Critique>,
        metadata: ReviewMetadata,
    },
    /// A fatal failure (adapter or persistence) ended the turn.
    Errored {
        reason: String,
        draft: Option<DraftVersion>,
        metadata: ReviewMetadata,
    },
    /// The turn was cancelled between role invocations; the session is
    /// checkpointed at its last fully-applied state.
    Cancelled,
}

impl TerminalResult {
    pub fn kind(&self) -> &'static str {
        match self {
            TerminalResult::ChatReply { .. } => "chat_reply",
            TerminalResult::DraftReady { .. } => "draft_ready",
            TerminalResult::Aborted { .. } => "aborted",
            TerminalResult::Errored { .. } => "errored",
            TerminalResult::Cancelled => "cancelled",
        }
    }
}

/// The session orchestrator. Cheap to share behind an `Arc`; steps for
/// different session keys run fully concurrently, steps within one key
/// are serialized by a per-key lease.
pub struct Orchestrator {
    adapter: Arc<dyn RoleAdapter>,
    store: Arc<dyn SessionStore>,
    supervisor: Supervisor,
    gate: ReviewGate,
    config: EngineConfig,
    logger: Arc<EngineLogger>,
    leases: StdMutex<HashMap<SessionKey, Arc<AsyncMutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        adapter: Arc<dyn RoleAdapter>,
        store: Arc<dyn SessionStore>,
        config: EngineConfig,
        logger: Arc<EngineLogger>,
    ) -> Self {
        Self {
            adapter,
            store,
            supervisor: Supervisor::new(config.max_revisions),
            gate: ReviewGate::new(config.approval_threshold),
            config,
            logger,
            leases: StdMutex::new(HashMap::new()),
        }
    }

    /// Runs one turn and collects the progress events.
    ///
    /// Convenience form of [`Orchestrator::step_streaming`] for callers
    /// that do not stream.
    pub async fn step(
        &self,
        key: impl Into<SessionKey>,
        user_input: &str,
    ) -> Result<(Vec<ProgressEvent>, TerminalResult), EngineError> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let result = self
            .step_streaming(key, user_input, events_tx, None)
            .await?;

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }
        Ok((events, result))
    }

    /// Runs one turn: load or create the session, append the user input,
    /// then loop role invocations until a terminal state.
    ///
    /// One [`ProgressEvent`] is sent per completed role invocation, in the
    /// exact order the roles ran. Cancellation is polled between role
    /// invocations, never mid-invocation.
    ///
    /// # Errors
    ///
    /// `SessionBusy` when a step is already in flight for this key;
    /// `Persistence` when the session cannot be loaded. Everything that
    /// fails after the turn started resolves into a `TerminalResult`.
    pub async fn step_streaming(
        &self,
        key: impl Into<SessionKey>,
        user_input: &str,
        events: mpsc::UnboundedSender<ProgressEvent>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<TerminalResult, EngineError> {
        let key = key.into();
        let _lease = self.acquire_lease(&key)?;

        let mut session = self.load_or_create(&key)?;
        session.begin_turn(user_input);

        let result = self
            .run_turn(&mut session, Uuid::new_v4(), &events, cancel.as_ref())
            .await;
        Ok(result)
    }

    /// Resumes a turn that was interrupted mid-flight (crash or
    /// cancellation). Routing continues from the supervisor's persisted
    /// state; completed role calls are not replayed. Returns `None` when
    /// the session does not exist or has no in-flight turn.
    pub async fn resume(
        &self,
        key: impl Into<SessionKey>,
        events: mpsc::UnboundedSender<ProgressEvent>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Option<TerminalResult>, EngineError> {
        let key = key.into();
        let _lease = self.acquire_lease(&key)?;

        let Some(mut session) = self.load(&key)? else {
            return Ok(None);
        };
        if !session.has_inflight_turn() {
            return Ok(None);
        }

        let result = self
            .run_turn(&mut session, Uuid::new_v4(), &events, cancel.as_ref())
            .await;
        Ok(Some(result))
    }

    /// Returns a read-only snapshot of the session's authoritative state.
    pub fn get_state(&self, key: impl Into<SessionKey>) -> Result<Option<Session>, EngineError> {
        self.load(&key.into())
    }

    /// Appends a new immutable draft version authored by a human editor,
    /// without re-triggering review. Reviewer scores are cleared because
    /// they belong to the superseded version; `total_revisions` is
    /// untouched (it counts drafter authorship only).
    pub async fn overwrite_draft(
        &self,
        key: impl Into<SessionKey>,
        title: &str,
        body: &str,
        instructions: &str,
        original_user_input: Option<&str>,
    ) -> Result<DraftVersion, EngineError> {
        let key = key.into();
        let _lease = self.acquire_lease(&key)?;
        let turn_id = Uuid::new_v4();

        let mut session = self.load_or_create(&key)?;
        if let Some(input) = original_user_input {
            // Retained so a session seeded by an external editor still
            // carries the request that produced the draft.
            if session.messages.is_empty() {
                session.push_message(Message::from_user(input));
            }
        }

        let version = session.ledger.append(Role::Human, title, body, instructions);
        session.push_note(
            Role::Human,
            format!("Edited draft saved as v{version}: {title}"),
            NotePriority::Info,
        );
        session.last_active_role = Some(Role::Human);
        session.touch();
        self.checkpoint(&session, &turn_id)?;

        session
            .current_draft()
            .cloned()
            .ok_or(EngineError::VersionNotFound { version })
    }

    /// Per-key mutual-exclusion lease, held for the duration of one step.
    fn acquire_lease(&self, key: &SessionKey) -> Result<OwnedMutexGuard<()>, EngineError> {
        let lease = {
            let mut leases = self.leases.lock().map_err(|_| EngineError::Persistence {
                message: "lease table poisoned".to_string(),
            })?;
            leases
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lease
            .try_lock_owned()
            .map_err(|_| EngineError::SessionBusy { key: key.clone() })
    }

    fn load(&self, key: &SessionKey) -> Result<Option<Session>, EngineError> {
        self.store.load(key).map_err(|e| EngineError::Persistence {
            message: format!("{e:#}"),
        })
    }

    fn load_or_create(&self, key: &SessionKey) -> Result<Session, EngineError> {
        Ok(self.load(key)?.unwrap_or_else(|| Session::new(key.clone())))
    }

    fn checkpoint(&self, session: &Session, turn_id: &Uuid) -> Result<(), EngineError> {
        self.store
            .checkpoint(session)
            .map_err(|e| EngineError::Persistence {
                message: format!("{e:#}"),
            })?;
        self.logger
            .log_checkpoint(&session.key, turn_id, session.step_counter);
        Ok(())
    }

    /// The step loop. Every failure past this point resolves into a
    /// terminal result carrying the best-known partial state.
    async fn run_turn(
        &self,
        session: &mut Session,
        turn_id: Uuid,
        events: &mpsc::UnboundedSender<ProgressEvent>,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> TerminalResult {
        if session.turn == TurnState::Init {
            match self
                .supervisor
                .transition(&TurnState::Init, TurnInput::TurnStarted, 0)
            {
                Ok(next) => session.turn = next,
                Err(e) => return self.errored(session, &turn_id, format!("{e:#}")),
            }
        }

        loop {
            if cancel.is_some_and(|rx| *rx.borrow()) {
                if let Err(e) = self.checkpoint(session, &turn_id) {
                    return self.errored(session, &turn_id, e.to_string());
                }
                self.logger
                    .log_turn_complete(&session.key, &turn_id, "cancelled");
                return TerminalResult::Cancelled;
            }

            let Some(decision) = self.supervisor.route(&session.turn, session.revisions_used)
            else {
                break;
            };
            self.logger.log_routing(&session.key, &turn_id, &decision);
            self.logger
                .log_role_invocation(&session.key, &turn_id, decision.next_role);

            let context = session.role_context(&self.config.context);
            let role_result =
                match invoke_with_retry(self.adapter.as_ref(), decision.next_role, &context).await
                {
                    Ok(result) => result,
                    Err(e) => {
                        self.logger.log_role_complete(
                            &session.key,
                            &turn_id,
                            decision.next_role,
                            false,
                        );
                        let reason = e.to_string();
                        if let Some(author) = decision.next_role.author() {
                            session.push_note(
                                author,
                                format!("Invocation failed: {reason}"),
                                NotePriority::Critical,
                            );
                            session.touch();
                        }
                        return self.errored(session, &turn_id, reason);
                    }
                };

            let summary = match self.fold(session, role_result) {
                Ok(summary) => summary,
                Err(e) => {
                    self.logger
                        .log_role_complete(&session.key, &turn_id, decision.next_role, false);
                    return self.errored(session, &turn_id, format!("{e:#}"));
                }
            };

            if let Err(e) = self.checkpoint(session, &turn_id) {
                return self.errored(session, &turn_id, e.to_string());
            }

            self.logger
                .log_role_complete(&session.key, &turn_id, decision.next_role, true);
            let _ = events.send(ProgressEvent {
                role: decision.next_role,
                summary,
            });
        }

        let result = self.terminal_result(session);
        self.logger
            .log_turn_complete(&session.key, &turn_id, result.kind());
        result
    }

    /// Folds one role's structured output into the session and advances
    /// the routing state. Returns the progress-event summary.
    fn fold(&self, session: &mut Session, result: RoleResult) -> anyhow::Result<String> {
        let current = session.turn;
        let summary = match (current, result) {
            (
                TurnState::RouteIntent,
                RoleResult::RoutingHint {
                    intent,
                    wants_new_draft,
                    reasoning: _,
                },
            ) => {
                let has_draft = !session.ledger.is_empty();
                session.turn = self.supervisor.transition(
                    &current,
                    TurnInput::IntentClassified {
                        intent,
                        wants_new_draft,
                        has_draft,
                    },
                    session.revisions_used,
                )?;
                format!("intent classified as {}", intent.as_str())
            }

            (TurnState::Chat, RoleResult::ChatMessage { text }) => {
                session.push_message(Message::from_role(Role::Chat, text));
                session.last_active_role = Some(Role::Chat);
                session.turn =
                    self.supervisor
                        .transition(&current, TurnInput::ChatReplied, session.revisions_used)?;
                "replied conversationally".to_string()
            }

            (
                TurnState::Drafting,
                RoleResult::Draft {
                    title,
                    content,
                    instructions,
                    summary,
                },
            ) => {
                let version =
                    session
                        .ledger
                        .append(Role::Drafter, title.clone(), content, instructions);
                session.revisions_used += 1;
                session.push_note(
                    Role::Drafter,
                    format!("Created v{version}: {title}. {summary}"),
                    NotePriority::Info,
                );
                session.push_message(Message::from_role(
                    Role::Drafter,
                    format!("Drafted: {title} (v{version})"),
                ));
                session.last_active_role = Some(Role::Drafter);
                session.turn = self.supervisor.transition(
                    &current,
                    TurnInput::DraftProduced,
                    session.revisions_used,
                )?;
                format!("produced draft v{version}: {title}")
            }

            (
                state @ (TurnState::SafetyReview | TurnState::ClinicalReview),
                RoleResult::Critique {
                    approved,
                    rationale,
                    scores,
                },
            ) => {
                let author = if state == TurnState::SafetyReview {
                    Role::SafetyGuardian
                } else {
                    Role::ClinicalCritic
                };
                // A missing draft here is an integrity error; version 0
                // never exists, so attach_critique reports it.
                let version = session.current_draft().map(|d| d.version).unwrap_or(0);
                let critique = Critique {
                    author,
                    version,
                    approved,
                    rationale: rationale.clone(),
                    scores,
                    created_at: TimestampUtc::now(),
                };
                let verdict = self.gate.evaluate(&critique);
                session.ledger.attach_critique(critique, &verdict)?;

                let label = if author == Role::SafetyGuardian {
                    "Safety"
                } else {
                    "Clinical"
                };
                let (outcome, priority) = if verdict.approved {
                    ("passed", NotePriority::Info)
                } else if author == Role::SafetyGuardian {
                    ("failed", NotePriority::Critical)
                } else {
                    ("needs improvement", NotePriority::Warning)
                };
                session.push_note(
                    author,
                    format!("{label} review {outcome}: {}", preview(&rationale, 200)),
                    priority,
                );
                session.push_message(Message::from_role(
                    author,
                    format!(
                        "{} Review: {} (v{})",
                        label,
                        if verdict.approved { "Approved" } else { "Rejected" },
                        version
                    ),
                ));
                session.last_active_role = Some(author);
                session.turn = self.supervisor.transition(
                    &current,
                    TurnInput::Reviewed {
                        reviewer: author,
                        verdict: &verdict,
                    },
                    session.revisions_used,
                )?;
                format!(
                    "{} review {} v{}",
                    label.to_lowercase(),
                    if verdict.approved { "approved" } else { "rejected" },
                    version
                )
            }

            (state, _) => anyhow::bail!("unexpected role result in state {state:?}"),
        };

        session.step_counter += 1;
        session.touch();
        Ok(summary)
    }

    /// Resolves the terminal routing state into the turn's result.
    fn terminal_result(&self, session: &Session) -> TerminalResult {
        match session.turn {
            TurnState::ChatDone => {
                let text = session
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.author == MessageAuthor::Engine(Role::Chat))
                    .map(|m| m.text.clone())
                    .unwrap_or_default();
                TerminalResult::ChatReply { text }
            }
            TurnState::HumanReview => match session.current_draft() {
                Some(draft) => TerminalResult::DraftReady {
                    draft: draft.clone(),
                    metadata: session.metadata().clone(),
                },
                None => TerminalResult::Errored {
                    reason: "review approved with no draft present".to_string(),
                    draft: None,
                    metadata: session.metadata().clone(),
                },
            },
            TurnState::Aborted => {
                let draft = session.current_draft().cloned();
                let critiques = draft
                    .as_ref()
                    .map(|d| {
                        session
                            .ledger
                            .critiques_for(d.version)
                            .into_iter()
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                TerminalResult::Aborted {
                    reason: "budget_exhausted".to_string(),
                    draft,
                    critiques,
                    metadata: session.metadata().clone(),
                }
            }
            state => TerminalResult::Errored {
                reason: format!("turn ended in non-terminal state {state:?}"),
                draft: session.current_draft().cloned(),
                metadata: session.metadata().clone(),
            },
        }
    }

    /// Fatal-condition exit: checkpoint best-effort and surface the
    /// best-known partial state alongside the reason.
    fn errored(&self, session: &Session, turn_id: &Uuid, reason: String) -> TerminalResult {
        let _ = self.store.checkpoint(session);
        self.logger
            .log_turn_complete(&session.key, turn_id, "errored");
        TerminalResult::Errored {
            reason,
            draft: session.current_draft().cloned(),
            metadata: session.metadata().clone(),
        }
    }
}

/// Adapts a progress receiver into a `Stream` for SSE-style transports.
/// The stream ends when the turn completes and the sender is dropped.
pub fn progress_stream(
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
) -> impl futures::Stream<Item = ProgressEvent> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
}

/// Truncates a string to a character budget for notes and summaries.
fn preview(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}
