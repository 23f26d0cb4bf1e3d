//! Orchestration engine for a small society of drafting and reviewing
//! roles that converges on a CBT exercise document.
//!
//! The engine routes each user turn through an intent router, a drafter,
//! and two independent reviewers (safety and clinical) until the draft
//! passes both gates, the revision budget runs out, or the turn turns out
//! to be conversational. Session state is checkpointed after every role
//! invocation so a turn survives crashes and cancellation.
//!
//! Transports (HTTP/SSE, stdio servers, CLIs) and the generative calls
//! themselves live outside this crate: callers provide a [`RoleAdapter`]
//! and drive [`Orchestrator::step`].

pub mod config;
pub mod domain;
pub mod engine_log;
pub mod foundry_paths;
pub mod gate;
pub mod ledger;
pub mod orchestrator;
pub mod roles;
pub mod session;
pub mod store;
pub mod supervisor;

pub use config::EngineConfig;
pub use domain::{
    Critique, CritiqueScores, DraftVersion, EngineError, Intent, Message, MessageAuthor,
    NotePriority, ReviewMetadata, Role, RoleId, ScoreKind, ScratchpadEntry, SessionKey,
    TimestampUtc,
};
pub use engine_log::EngineLogger;
pub use gate::{ReviewGate, Verdict};
pub use ledger::DraftLedger;
pub use orchestrator::{progress_stream, Orchestrator, ProgressEvent, TerminalResult};
pub use roles::{RoleAdapter, RoleContext, RoleResult};
pub use session::Session;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use supervisor::{RoutingDecision, Supervisor, TurnState};
